//! RGBA raster canvas in a BMP-32 container, with clip-path gating,
//! path fill/stroke drawing, and source-over blending.

use std::io::{self, Write};
use std::path::Path;

use log::{info, trace};

use crate::bmp::{write_bmp_header, write_bmp_info_header, PIXEL_DATA_OFFSET};
use crate::dcel::{path_contains_point, rasterize_path_mask, FillRule};
use crate::geom::Vec2;
use crate::path::{PathBuilder, PathOptions, Segment};

// ── Colors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    /// Source-over with straight alpha.
    pub fn blend_src_over(dst: Rgba, src: Rgba) -> Rgba {
        let sa = src.a as f64 / 255.0;
        let da = dst.a as f64 / 255.0;
        let oa = sa + da * (1.0 - sa);
        if oa <= 0.0 {
            return Rgba::new(0, 0, 0, 0);
        }
        let channel = |s: u8, d: u8| -> u8 {
            let v = (s as f64 * sa + d as f64 * da * (1.0 - sa)) / oa;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgba {
            r: channel(src.r, dst.r),
            g: channel(src.g, dst.g),
            b: channel(src.b, dst.b),
            a: (oa * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }
}

// ── Brushes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy)]
pub struct Brush {
    pub fill: bool,
    pub stroke: bool,
    pub fill_rgba: Rgba,
    pub stroke_rgba: Rgba,
    pub stroke_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub even_odd_fill: bool,
}

impl Default for Brush {
    fn default() -> Self {
        Brush {
            fill: false,
            stroke: false,
            fill_rgba: Rgba::BLACK,
            stroke_rgba: Rgba::BLACK,
            stroke_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            even_odd_fill: false,
        }
    }
}

struct ClipEntry {
    path: PathBuilder,
    fill_rule: FillRule,
}

// ── Canvas ────────────────────────────────────────────────────────────────────

/// A width*height RGBA8 canvas stored directly in its on-disk BMP layout
/// (bottom-up rows, B-G-R-A bytes). `coordinate_scale` maps user-space
/// units to device pixels.
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
    coordinate_scale: f64,
    clip_paths: Vec<ClipEntry>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba, coordinate_scale: f64) -> Self {
        assert!(coordinate_scale > 1e-3);

        let file_size = PIXEL_DATA_OFFSET + width as usize * height as usize * 4;
        info!(
            "creating {}x{} canvas ({} bytes), scale {}",
            width, height, file_size, coordinate_scale
        );

        let mut data = vec![0u8; file_size];
        write_bmp_header(&mut data, file_size as u32);
        write_bmp_info_header(&mut data[crate::bmp::BMP_HEADER_LEN..], width, height);

        for pixel in data[PIXEL_DATA_OFFSET..].chunks_exact_mut(4) {
            pixel[0] = background.b;
            pixel[1] = background.g;
            pixel[2] = background.r;
            pixel[3] = background.a;
        }

        Canvas {
            width,
            height,
            data,
            coordinate_scale,
            clip_paths: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn coordinate_scale(&self) -> f64 {
        self.coordinate_scale
    }

    fn pixel_offset(&self, x: u32, y: u32) -> usize {
        PIXEL_DATA_OFFSET + ((self.height - y - 1) as usize * self.width as usize + x as usize) * 4
    }

    /// A pixel passes the clip stack iff every clip path contains its
    /// center under that clip's fill rule.
    fn pixel_visible(&self, x: u32, y: u32) -> bool {
        if self.clip_paths.is_empty() {
            return true;
        }
        let sample_x = (x as f64 + 0.5) / self.coordinate_scale;
        let sample_y = (y as f64 + 0.5) / self.coordinate_scale;
        self.clip_paths
            .iter()
            .all(|clip| path_contains_point(&clip.path, clip.fill_rule, sample_x, sample_y))
    }

    pub fn get_rgba(&self, x: u32, y: u32) -> Rgba {
        assert!(x < self.width && y < self.height);
        let offset = self.pixel_offset(x, y);
        Rgba {
            b: self.data[offset],
            g: self.data[offset + 1],
            r: self.data[offset + 2],
            a: self.data[offset + 3],
        }
    }

    pub fn set_rgba(&mut self, x: u32, y: u32, rgba: Rgba) {
        assert!(x < self.width && y < self.height);
        if !self.pixel_visible(x, y) {
            return;
        }
        trace!("setting pixel ({}, {})", x, y);
        let offset = self.pixel_offset(x, y);
        self.data[offset] = rgba.b;
        self.data[offset + 1] = rgba.g;
        self.data[offset + 2] = rgba.r;
        self.data[offset + 3] = rgba.a;
    }

    fn blend_pixel(&mut self, x: u32, y: u32, src: Rgba) {
        let dst = self.get_rgba(x, y);
        self.set_rgba(x, y, Rgba::blend_src_over(dst, src));
    }

    // ── Clipping ──────────────────────────────────────────────────────────────

    pub fn push_clip_path(&mut self, path: PathBuilder, even_odd_rule: bool) {
        self.clip_paths.push(ClipEntry {
            path,
            fill_rule: if even_odd_rule {
                FillRule::EvenOdd
            } else {
                FillRule::Nonzero
            },
        });
    }

    pub fn pop_clip_paths(&mut self, count: usize) {
        assert!(count <= self.clip_paths.len());
        for _ in 0..count {
            self.clip_paths.pop();
        }
    }

    pub fn clip_depth(&self) -> usize {
        self.clip_paths.len()
    }

    // ── Path drawing ──────────────────────────────────────────────────────────

    pub fn draw_path(&mut self, path: &PathBuilder, brush: &Brush) {
        if self.width == 0 || self.height == 0 {
            return;
        }

        if brush.fill {
            let fill_rule = if brush.even_odd_fill {
                FillRule::EvenOdd
            } else {
                FillRule::Nonzero
            };
            let (mask, bounds) = rasterize_path_mask(
                path,
                fill_rule,
                self.width,
                self.height,
                self.coordinate_scale,
            );
            if !bounds.is_empty {
                for y in bounds.min_y..=bounds.max_y {
                    for x in bounds.min_x..=bounds.max_x {
                        if mask[y as usize * self.width as usize + x as usize] != 0 {
                            self.blend_pixel(x, y, brush.fill_rgba);
                        }
                    }
                }
            }
        }

        if !brush.stroke || brush.stroke_width <= 0.0 {
            return;
        }

        let stroke_radius = brush.stroke_width * 0.5;
        for contour in path.contours() {
            if contour.segments.len() < 2 {
                continue;
            }

            let Segment::Start(start) = contour.segments[0] else {
                panic!("path contour must start with a Start segment");
            };
            let mut points: Vec<Vec2> = vec![start];
            for segment in &contour.segments[1..] {
                let Segment::Line(point) = *segment else {
                    panic!("stroking requires flattened curves; use PathOptions::flattened()");
                };
                if !point.approx_eq(*points.last().unwrap(), 1e-12) {
                    points.push(point);
                }
            }

            let mut closed = false;
            if points.len() >= 2 && points[points.len() - 1].approx_eq(points[0], 1e-9) {
                closed = true;
                points.pop();
            }

            let can_stroke = if closed {
                points.len() >= 3
            } else {
                points.len() >= 2
            };
            if !can_stroke {
                continue;
            }

            let mut outline = PathBuilder::new(PathOptions::flattened());
            if closed {
                build_closed_stroke_outline(
                    &mut outline,
                    &points,
                    stroke_radius,
                    brush.line_join,
                    brush.miter_limit,
                );
            } else {
                build_open_stroke_outline(
                    &mut outline,
                    &points,
                    stroke_radius,
                    brush.line_cap,
                    brush.line_join,
                    brush.miter_limit,
                );
            }

            let (mask, bounds) = rasterize_path_mask(
                &outline,
                FillRule::EvenOdd,
                self.width,
                self.height,
                self.coordinate_scale,
            );
            if !bounds.is_empty {
                for y in bounds.min_y..=bounds.max_y {
                    for x in bounds.min_x..=bounds.max_x {
                        if mask[y as usize * self.width as usize + x as usize] != 0 {
                            self.blend_pixel(x, y, brush.stroke_rgba);
                        }
                    }
                }
            }
        }
    }

    // ── Debug splats ──────────────────────────────────────────────────────────

    pub fn draw_circle(&mut self, x: f64, y: f64, radius: f64, rgba: Rgba) {
        let x = x * self.coordinate_scale;
        let y = y * self.coordinate_scale;
        let radius = radius * self.coordinate_scale;

        let clamp_floor = |v: f64, max: u32| -> u32 {
            if v < 0.0 {
                0
            } else if v > max as f64 {
                max
            } else {
                v as u32
            }
        };
        let clamp_ceil = |v: f64, max: u32| -> u32 {
            if v < 0.0 {
                0
            } else if v > max as f64 {
                max
            } else {
                v.ceil() as u32
            }
        };

        if self.width == 0 || self.height == 0 {
            return;
        }
        for py in clamp_floor(y - radius, self.height - 1)..clamp_ceil(y + radius, self.height - 1)
        {
            for px in
                clamp_floor(x - radius, self.width - 1)..clamp_ceil(x + radius, self.width - 1)
            {
                let dx = px as f64 + 0.5 - x;
                let dy = py as f64 + 0.5 - y;
                if (dx * dx + dy * dy).sqrt() > radius {
                    continue;
                }
                self.set_rgba(px, py, rgba);
            }
        }
    }

    pub fn draw_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64, rgba: Rgba) {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();
        let mut pixel = 1;
        while (pixel as f64) < dist {
            let t = pixel as f64 / dist;
            self.draw_circle(x1 + dx * t, y1 + dy * t, radius, rgba);
            pixel += 1;
        }
    }

    pub fn draw_arrow(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        radius: f64,
        tip_radius: f64,
        rgba: Rgba,
    ) {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();
        let mut pixel = 1;
        while (pixel as f64) < dist {
            let t = pixel as f64 / dist;
            self.draw_circle(
                x1 + dx * t,
                y1 + dy * t,
                radius * (1.0 - t) + tip_radius * t,
                rgba,
            );
            pixel += 1;
        }
    }

    pub fn draw_bezier(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        cx: f64,
        cy: f64,
        flatness: f64,
        radius: f64,
        rgba: Rgba,
    ) {
        self.draw_circle(x1, y1, radius * 3.0, rgba);
        self.draw_circle(x2, y2, radius * 3.0, rgba);

        let mid_x = (x1 + x2) / 2.0;
        let mid_y = (y1 + y2) / 2.0;
        let fx = cx - mid_x;
        let fy = cy - mid_y;
        if (fx * fx + fy * fy).sqrt() < flatness {
            self.draw_line(x1, y1, x2, y2, radius, rgba);
            return;
        }

        let c1x = (x1 + cx) / 2.0;
        let c1y = (y1 + cy) / 2.0;
        let c2x = (x2 + cx) / 2.0;
        let c2y = (y2 + cy) / 2.0;
        let xm = (c1x + c2x) * 0.5;
        let ym = (c1y + c2y) * 0.5;
        self.draw_bezier(x1, y1, xm, ym, c1x, c1y, flatness, radius, rgba);
        self.draw_bezier(xm, ym, x2, y2, c2x, c2y, flatness, radius, rgba);
    }

    // ── Output ────────────────────────────────────────────────────────────────

    /// The canvas in its on-disk BMP form.
    pub fn bmp_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        info!("writing canvas to {}", path.as_ref().display());
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.data)
    }
}

// ── Stroke outline construction ───────────────────────────────────────────────

fn vec2_angle(center: Vec2, p: Vec2) -> f64 {
    (p.y - center.y).atan2(p.x - center.x)
}

/// Approximate a circular arc from `from` to `to` around `center` with
/// line segments.
fn append_arc(outline: &mut PathBuilder, center: Vec2, from: Vec2, to: Vec2, ccw: bool) {
    let angle_from = vec2_angle(center, from);
    let mut angle_to = vec2_angle(center, to);
    if ccw {
        while angle_to <= angle_from {
            angle_to += 2.0 * std::f64::consts::PI;
        }
    } else {
        while angle_to >= angle_from {
            angle_to -= 2.0 * std::f64::consts::PI;
        }
    }

    let angle_span = (angle_to - angle_from).abs();
    let segment_count = ((angle_span * 8.0 / std::f64::consts::PI).ceil() as usize).clamp(2, 32);

    let radius = from.sub(center).len();
    for idx in 1..=segment_count {
        let t = idx as f64 / segment_count as f64;
        let angle = angle_from + t * (angle_to - angle_from);
        outline.line_to(Vec2::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        ));
    }
}

fn compute_inner_join(
    from: Vec2,
    direction_from: Vec2,
    to: Vec2,
    direction_to: Vec2,
    fallback: Vec2,
) -> Vec2 {
    let det = direction_from.cross(direction_to);
    if det.abs() < 1e-12 {
        return fallback;
    }
    let delta = to.sub(from);
    let factor = (delta.x * direction_to.y - delta.y * direction_to.x) / det;
    from.add(direction_from.scale(factor))
}

#[allow(clippy::too_many_arguments)]
fn append_outer_join(
    outline: &mut PathBuilder,
    vertex: Vec2,
    from: Vec2,
    direction_from: Vec2,
    to: Vec2,
    direction_to: Vec2,
    stroke_radius: f64,
    line_join: LineJoin,
    miter_limit: f64,
) {
    match line_join {
        LineJoin::Bevel => outline.line_to(to),
        LineJoin::Miter => {
            let det = direction_from.cross(direction_to);
            if det.abs() > 1e-12 {
                let delta = to.sub(from);
                let factor = (delta.x * direction_to.y - delta.y * direction_to.x) / det;
                let miter_point = from.add(direction_from.scale(factor));
                let miter_distance_sq = miter_point.sub(vertex).len_sq();
                // Over-limit miters fall back to a bevel.
                if miter_distance_sq <= miter_limit * miter_limit * stroke_radius * stroke_radius {
                    outline.line_to(miter_point);
                    outline.line_to(to);
                    return;
                }
            }
            outline.line_to(to);
        }
        LineJoin::Round => append_arc(outline, vertex, from, to, true),
    }
}

/// The join is outer or inner depending on which side of the turn this
/// offset walk runs along; inner joins pinch to the segment intersection.
#[allow(clippy::too_many_arguments)]
fn append_join(
    outline: &mut PathBuilder,
    vertex: Vec2,
    from: Vec2,
    direction_from: Vec2,
    to: Vec2,
    direction_to: Vec2,
    cross_product: f64,
    side_sign: i32,
    stroke_radius: f64,
    line_join: LineJoin,
    miter_limit: f64,
) {
    if cross_product.abs() < 1e-10 {
        outline.line_to(to);
        return;
    }

    let outer_join = if side_sign > 0 {
        cross_product > 0.0
    } else {
        cross_product < 0.0
    };
    if outer_join {
        append_outer_join(
            outline,
            vertex,
            from,
            direction_from,
            to,
            direction_to,
            stroke_radius,
            line_join,
            miter_limit,
        );
    } else {
        let inner = compute_inner_join(from, direction_from, to, direction_to, vertex);
        outline.line_to(inner);
        outline.line_to(to);
    }
}

/// Offset walk for an open polyline: out along the left side at +r, caps
/// at each end, back along the right side at -r.
fn build_open_stroke_outline(
    outline: &mut PathBuilder,
    points: &[Vec2],
    stroke_radius: f64,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f64,
) {
    debug_assert!(points.len() >= 2);
    let segment_count = points.len() - 1;

    let mut directions = Vec::with_capacity(segment_count);
    let mut normals = Vec::with_capacity(segment_count);
    for idx in 0..segment_count {
        let direction = points[idx + 1].sub(points[idx]).normalize();
        directions.push(direction);
        normals.push(direction.perp());
    }

    let mut start_left = points[0].add(normals[0].scale(stroke_radius));
    if line_cap == LineCap::Square {
        start_left = start_left.sub(directions[0].scale(stroke_radius));
    }
    outline.move_to(start_left);

    let mut curr_left = start_left;
    for idx in 0..segment_count {
        let mut end_left = points[idx + 1].add(normals[idx].scale(stroke_radius));
        if line_cap == LineCap::Square && idx == segment_count - 1 {
            end_left = end_left.add(directions[idx].scale(stroke_radius));
        }
        outline.line_to(end_left);
        curr_left = end_left;

        if idx + 1 < segment_count {
            let next_left = points[idx + 1].add(normals[idx + 1].scale(stroke_radius));
            let cross_product = directions[idx].cross(directions[idx + 1]);
            append_join(
                outline,
                points[idx + 1],
                curr_left,
                directions[idx],
                next_left,
                directions[idx + 1],
                cross_product,
                1,
                stroke_radius,
                line_join,
                miter_limit,
            );
            curr_left = next_left;
        }
    }

    let end_point = points[segment_count];
    let mut end_right = end_point.sub(normals[segment_count - 1].scale(stroke_radius));
    if line_cap == LineCap::Square {
        end_right = end_right.add(directions[segment_count - 1].scale(stroke_radius));
    }

    if line_cap == LineCap::Round {
        append_arc(outline, end_point, curr_left, end_right, false);
    } else {
        outline.line_to(end_right);
    }

    let mut curr_right = end_right;
    for idx in (0..segment_count).rev() {
        let mut prev_right = points[idx].sub(normals[idx].scale(stroke_radius));
        if line_cap == LineCap::Square && idx == 0 {
            prev_right = prev_right.sub(directions[0].scale(stroke_radius));
        }
        outline.line_to(prev_right);
        curr_right = prev_right;

        if idx > 0 {
            let next_right = points[idx].sub(normals[idx - 1].scale(stroke_radius));
            let cross_product = directions[idx - 1].cross(directions[idx]);
            append_join(
                outline,
                points[idx],
                curr_right,
                directions[idx].scale(-1.0),
                next_right,
                directions[idx - 1].scale(-1.0),
                cross_product,
                -1,
                stroke_radius,
                line_join,
                miter_limit,
            );
            curr_right = next_right;
        }
    }

    if line_cap == LineCap::Round {
        append_arc(outline, points[0], curr_right, start_left, false);
    }

    outline.close_contour();
}

/// Two full offset loops around a closed polyline, one per side; filling
/// the pair with even-odd leaves the ring between them.
fn build_closed_stroke_outline(
    outline: &mut PathBuilder,
    points: &[Vec2],
    stroke_radius: f64,
    line_join: LineJoin,
    miter_limit: f64,
) {
    debug_assert!(points.len() >= 3);
    let point_count = points.len();

    let mut directions = Vec::with_capacity(point_count);
    let mut normals = Vec::with_capacity(point_count);
    for idx in 0..point_count {
        let direction = points[(idx + 1) % point_count].sub(points[idx]).normalize();
        directions.push(direction);
        normals.push(direction.perp());
    }

    for side_sign in [1i32, -1] {
        let offset = |p: Vec2, n: Vec2| -> Vec2 {
            if side_sign > 0 {
                p.add(n.scale(stroke_radius))
            } else {
                p.sub(n.scale(stroke_radius))
            }
        };

        let start_point = offset(points[0], normals[0]);
        outline.move_to(start_point);

        for idx in 0..point_count {
            let next_idx = (idx + 1) % point_count;
            let next_point = points[next_idx];

            let segment_end = offset(next_point, normals[idx]);
            outline.line_to(segment_end);

            let join_point = offset(next_point, normals[next_idx]);
            let cross_product = directions[idx].cross(directions[next_idx]);
            append_join(
                outline,
                next_point,
                segment_end,
                directions[idx],
                join_point,
                directions[next_idx],
                cross_product,
                side_sign,
                stroke_radius,
                line_join,
                miter_limit,
            );
        }

        outline.close_contour();
    }
}
