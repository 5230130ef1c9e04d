use crate::geom::{Mat3, Vec2};

/// One step of a contour. A contour always opens with `Start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Start(Vec2),
    Line(Vec2),
    Quad { control: Vec2, end: Vec2 },
    Cubic { control_a: Vec2, control_b: Vec2, end: Vec2 },
}

impl Segment {
    pub fn end_point(&self) -> Vec2 {
        match *self {
            Segment::Start(p) | Segment::Line(p) => p,
            Segment::Quad { end, .. } | Segment::Cubic { end, .. } => end,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Contour {
    pub segments: Vec<Segment>,
}

/// Curve handling knobs. Flattening replaces beziers with chords until the
/// polyline is within the flatness tolerance of the true curve, bisecting
/// at t = 0.5 up to the depth cap.
#[derive(Debug, Clone, Copy)]
pub struct PathOptions {
    pub flatten_curves: bool,
    pub quad_flatness: f64,
    pub quad_max_depth: u32,
    pub cubic_flatness: f64,
    pub cubic_max_depth: u32,
}

impl Default for PathOptions {
    fn default() -> Self {
        PathOptions {
            flatten_curves: false,
            quad_flatness: 0.05,
            quad_max_depth: 24,
            cubic_flatness: 0.05,
            cubic_max_depth: 24,
        }
    }
}

impl PathOptions {
    pub fn flattened() -> Self {
        PathOptions {
            flatten_curves: true,
            ..PathOptions::default()
        }
    }
}

const CLOSE_EPS: f64 = 1e-9;

/// A mutable path: an ordered list of contours.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    options: PathOptions,
    contours: Vec<Contour>,
}

fn point_to_segment_dist(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b.sub(a);
    let len_sq = ab.len_sq();
    if len_sq <= 1e-18 {
        return p.sub(a).len();
    }
    let t = (p.sub(a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.sub(a.lerp(b, t)).len()
}

/// A quadratic is flat enough when the control point sits within twice the
/// tolerance of the chord: the curve's deviation peaks at half the
/// control-point distance (at t = 0.5).
fn quad_is_flat(start: Vec2, control: Vec2, end: Vec2, flatness: f64) -> bool {
    point_to_segment_dist(control, start, end) <= flatness * 2.0
}

/// For a cubic, the deviation is bounded by 3/4 of the larger control
/// distance, so 4/3 of the tolerance bounds both.
fn cubic_is_flat(start: Vec2, ca: Vec2, cb: Vec2, end: Vec2, flatness: f64) -> bool {
    let max_dist = point_to_segment_dist(ca, start, end).max(point_to_segment_dist(cb, start, end));
    max_dist <= flatness * (4.0 / 3.0)
}

impl PathBuilder {
    pub fn new(options: PathOptions) -> Self {
        PathBuilder {
            options,
            contours: Vec::new(),
        }
    }

    pub fn options(&self) -> PathOptions {
        self.options
    }

    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn clear(&mut self) {
        self.contours.clear();
    }

    /// The end point of the most recent segment, if any.
    pub fn current_point(&self) -> Option<Vec2> {
        self.contours
            .last()
            .and_then(|c| c.segments.last())
            .map(|s| s.end_point())
    }

    fn contour_start(&self) -> Option<Vec2> {
        self.contours
            .last()
            .and_then(|c| c.segments.first())
            .map(|s| s.end_point())
    }

    /// Open a new contour at `p`. A contour holding only its Start is
    /// repositioned instead of abandoned.
    pub fn move_to(&mut self, p: Vec2) {
        if let Some(contour) = self.contours.last_mut() {
            if contour.segments.len() == 1 {
                contour.segments[0] = Segment::Start(p);
                return;
            }
        }
        self.contours.push(Contour {
            segments: vec![Segment::Start(p)],
        });
    }

    fn ensure_contour(&mut self, fallback: Vec2) {
        if self.contours.is_empty() {
            self.contours.push(Contour {
                segments: vec![Segment::Start(fallback)],
            });
        }
    }

    fn push_segment(&mut self, segment: Segment) {
        self.contours
            .last_mut()
            .expect("push_segment without a contour")
            .segments
            .push(segment);
    }

    pub fn line_to(&mut self, p: Vec2) {
        self.ensure_contour(p);
        self.push_segment(Segment::Line(p));
    }

    pub fn quad_bezier_to(&mut self, control: Vec2, end: Vec2) {
        self.ensure_contour(end);
        if self.options.flatten_curves {
            let start = self.current_point().unwrap_or(end);
            self.flatten_quad(start, control, end, 0);
        } else {
            self.push_segment(Segment::Quad { control, end });
        }
    }

    pub fn cubic_bezier_to(&mut self, control_a: Vec2, control_b: Vec2, end: Vec2) {
        self.ensure_contour(end);
        if self.options.flatten_curves {
            let start = self.current_point().unwrap_or(end);
            self.flatten_cubic(start, control_a, control_b, end, 0);
        } else {
            self.push_segment(Segment::Cubic {
                control_a,
                control_b,
                end,
            });
        }
    }

    fn flatten_quad(&mut self, start: Vec2, control: Vec2, end: Vec2, depth: u32) {
        if quad_is_flat(start, control, end, self.options.quad_flatness)
            || depth >= self.options.quad_max_depth
        {
            self.push_segment(Segment::Line(end));
            return;
        }
        let c1 = start.lerp(control, 0.5);
        let c2 = control.lerp(end, 0.5);
        let split = c1.lerp(c2, 0.5);
        self.flatten_quad(start, c1, split, depth + 1);
        self.flatten_quad(split, c2, end, depth + 1);
    }

    fn flatten_cubic(&mut self, start: Vec2, ca: Vec2, cb: Vec2, end: Vec2, depth: u32) {
        if cubic_is_flat(start, ca, cb, end, self.options.cubic_flatness)
            || depth >= self.options.cubic_max_depth
        {
            self.push_segment(Segment::Line(end));
            return;
        }
        let p01 = start.lerp(ca, 0.5);
        let p12 = ca.lerp(cb, 0.5);
        let p23 = cb.lerp(end, 0.5);
        let p012 = p01.lerp(p12, 0.5);
        let p123 = p12.lerp(p23, 0.5);
        let split = p012.lerp(p123, 0.5);
        self.flatten_cubic(start, p01, p012, split, depth + 1);
        self.flatten_cubic(split, p123, p23, end, depth + 1);
    }

    /// Close the current contour: insert a line back to its Start when the
    /// current point has moved away from it, then open a fresh contour at
    /// the same point.
    pub fn close_contour(&mut self) {
        let (Some(current), Some(start)) = (self.current_point(), self.contour_start()) else {
            return;
        };
        if !current.approx_eq(start, CLOSE_EPS) {
            self.push_segment(Segment::Line(start));
        }
        self.contours.push(Contour {
            segments: vec![Segment::Start(start)],
        });
    }

    /// Post-multiply every segment point by `m`.
    pub fn apply_transform(&mut self, m: Mat3) {
        for contour in &mut self.contours {
            for segment in &mut contour.segments {
                *segment = match *segment {
                    Segment::Start(p) => Segment::Start(m.transform(p)),
                    Segment::Line(p) => Segment::Line(m.transform(p)),
                    Segment::Quad { control, end } => Segment::Quad {
                        control: m.transform(control),
                        end: m.transform(end),
                    },
                    Segment::Cubic {
                        control_a,
                        control_b,
                        end,
                    } => Segment::Cubic {
                        control_a: m.transform(control_a),
                        control_b: m.transform(control_b),
                        end: m.transform(end),
                    },
                };
            }
        }
    }

    /// Each contour as a polyline. Residual curves (paths built without
    /// `flatten_curves`) are subdivided here with the same tolerances.
    pub fn flattened_contours(&self) -> Vec<Vec<Vec2>> {
        let mut out = Vec::with_capacity(self.contours.len());
        for contour in &self.contours {
            let mut points: Vec<Vec2> = Vec::with_capacity(contour.segments.len());
            for segment in &contour.segments {
                match *segment {
                    Segment::Start(p) => {
                        points.clear();
                        points.push(p);
                    }
                    Segment::Line(p) => points.push(p),
                    Segment::Quad { control, end } => {
                        let start = points.last().copied().unwrap_or(end);
                        flatten_quad_into(
                            &mut points,
                            start,
                            control,
                            end,
                            self.options.quad_flatness,
                            self.options.quad_max_depth,
                            0,
                        );
                    }
                    Segment::Cubic {
                        control_a,
                        control_b,
                        end,
                    } => {
                        let start = points.last().copied().unwrap_or(end);
                        flatten_cubic_into(
                            &mut points,
                            start,
                            control_a,
                            control_b,
                            end,
                            self.options.cubic_flatness,
                            self.options.cubic_max_depth,
                            0,
                        );
                    }
                }
            }
            if points.len() > 1 {
                out.push(points);
            }
        }
        out
    }
}

fn flatten_quad_into(
    points: &mut Vec<Vec2>,
    start: Vec2,
    control: Vec2,
    end: Vec2,
    flatness: f64,
    max_depth: u32,
    depth: u32,
) {
    if quad_is_flat(start, control, end, flatness) || depth >= max_depth {
        points.push(end);
        return;
    }
    let c1 = start.lerp(control, 0.5);
    let c2 = control.lerp(end, 0.5);
    let split = c1.lerp(c2, 0.5);
    flatten_quad_into(points, start, c1, split, flatness, max_depth, depth + 1);
    flatten_quad_into(points, split, c2, end, flatness, max_depth, depth + 1);
}

#[allow(clippy::too_many_arguments)]
fn flatten_cubic_into(
    points: &mut Vec<Vec2>,
    start: Vec2,
    ca: Vec2,
    cb: Vec2,
    end: Vec2,
    flatness: f64,
    max_depth: u32,
    depth: u32,
) {
    if cubic_is_flat(start, ca, cb, end, flatness) || depth >= max_depth {
        points.push(end);
        return;
    }
    let p01 = start.lerp(ca, 0.5);
    let p12 = ca.lerp(cb, 0.5);
    let p23 = cb.lerp(end, 0.5);
    let p012 = p01.lerp(p12, 0.5);
    let p123 = p12.lerp(p23, 0.5);
    let split = p012.lerp(p123, 0.5);
    flatten_cubic_into(points, start, p01, p012, split, flatness, max_depth, depth + 1);
    flatten_cubic_into(points, split, p123, p23, end, flatness, max_depth, depth + 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contours_open_with_start() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(1.0, 0.0));
        path.move_to(Vec2::new(5.0, 5.0));
        path.line_to(Vec2::new(6.0, 5.0));
        assert_eq!(path.contours().len(), 2);
        assert!(matches!(path.contours()[0].segments[0], Segment::Start(_)));
        assert!(matches!(path.contours()[1].segments[0], Segment::Start(_)));
    }

    #[test]
    fn repositioning_an_empty_contour() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(0.0, 0.0));
        path.move_to(Vec2::new(3.0, 3.0));
        assert_eq!(path.contours().len(), 1);
        assert_eq!(path.current_point(), Some(Vec2::new(3.0, 3.0)));
    }

    #[test]
    fn close_inserts_line_when_needed() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(1.0, 0.0));
        path.line_to(Vec2::new(1.0, 1.0));
        path.close_contour();
        let closed = &path.contours()[0];
        assert_eq!(
            closed.segments.last().copied(),
            Some(Segment::Line(Vec2::new(0.0, 0.0)))
        );
        // A fresh contour opened at the start point.
        assert_eq!(path.current_point(), Some(Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn close_skips_line_when_already_at_start() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(1.0, 0.0));
        path.line_to(Vec2::new(0.0, 0.0));
        path.close_contour();
        let closed = &path.contours()[0];
        assert_eq!(closed.segments.len(), 3);
    }

    #[test]
    fn unflattened_paths_keep_beziers() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(0.0, 0.0));
        path.quad_bezier_to(Vec2::new(0.5, 1.0), Vec2::new(1.0, 0.0));
        assert!(matches!(
            path.contours()[0].segments[1],
            Segment::Quad { .. }
        ));
    }

    #[test]
    fn flattened_paths_contain_only_lines() {
        let mut path = PathBuilder::new(PathOptions::flattened());
        path.move_to(Vec2::new(0.0, 0.0));
        path.quad_bezier_to(Vec2::new(0.5, 1.0), Vec2::new(1.0, 0.0));
        path.cubic_bezier_to(
            Vec2::new(1.5, -1.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(2.5, 0.0),
        );
        for segment in &path.contours()[0].segments[1..] {
            assert!(matches!(segment, Segment::Line(_)));
        }
        // The endpoint of the whole run survives flattening exactly.
        assert_eq!(path.current_point(), Some(Vec2::new(2.5, 0.0)));
    }

    #[test]
    fn zero_depth_cap_yields_single_chord() {
        let mut options = PathOptions::flattened();
        options.quad_max_depth = 0;
        let mut path = PathBuilder::new(options);
        path.move_to(Vec2::new(0.0, 0.0));
        path.quad_bezier_to(Vec2::new(0.5, 100.0), Vec2::new(1.0, 0.0));
        assert_eq!(path.contours()[0].segments.len(), 2);
    }

    #[test]
    fn transform_moves_every_point() {
        let mut path = PathBuilder::new(PathOptions::default());
        path.move_to(Vec2::new(1.0, 1.0));
        path.line_to(Vec2::new(2.0, 1.0));
        path.apply_transform(Mat3::from_pdf(2.0, 0.0, 0.0, 2.0, 10.0, 0.0));
        assert_eq!(path.current_point(), Some(Vec2::new(14.0, 2.0)));
    }
}
