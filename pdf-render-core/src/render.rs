//! The render loop: executes a page's operation list against the raster
//! backend, maintaining the graphics-state stack, the current path, text
//! state, and pending clips.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

use crate::canvas::{Brush, Canvas, LineCap, LineJoin, Rgba};
use crate::content::ContentOp;
use crate::dcel::FillRule;
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::font::Font;
use crate::geom::{Mat3, Vec2};
use crate::object::Number;
use crate::page::Page;
use crate::path::{PathBuilder, PathOptions};
use crate::reader::PdfReader;
use crate::sfnt::{glyph_to_path, SfntFont};

// ── Graphics state ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
    render_mode: i32,
    font: Option<Rc<LoadedFont>>,
    font_size: f64,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
            font: None,
            font_size: 0.0,
        }
    }
}

#[derive(Clone)]
struct GState {
    ctm: Mat3,
    stroke_color: Rgba,
    fill_color: Rgba,
    line_width: f64,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f64,
    text: TextState,
    clip_depth: usize,
}

impl GState {
    fn new(base_ctm: Mat3) -> Self {
        GState {
            ctm: base_ctm,
            stroke_color: Rgba::BLACK,
            fill_color: Rgba::BLACK,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            text: TextState::default(),
            clip_depth: 0,
        }
    }
}

struct LoadedFont {
    record: Rc<Font>,
    program: SfntFont,
}

fn component_to_channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn rgb_color(r: f64, g: f64, b: f64) -> Rgba {
    Rgba::new(
        component_to_channel(r),
        component_to_channel(g),
        component_to_channel(b),
        255,
    )
}

fn cmyk_color(c: f64, m: f64, y: f64, k: f64) -> Rgba {
    rgb_color((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

/// Approximate scalar magnification of the CTM, for scaling line widths.
fn ctm_scale(ctm: &Mat3) -> f64 {
    let det = ctm.m[0][0] * ctm.m[1][1] - ctm.m[0][1] * ctm.m[1][0];
    det.abs().sqrt().max(1e-9)
}

// ── Renderer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Device pixels per point.
    pub scale: f64,
    pub background: Rgba,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            scale: 1.0,
            background: Rgba::WHITE,
        }
    }
}

struct Renderer<'r> {
    reader: &'r mut PdfReader,
    canvas: Canvas,
    state: GState,
    state_stack: Vec<GState>,
    current_path: PathBuilder,
    pending_clip: Option<FillRule>,
    text_matrix: Mat3,
    line_matrix: Mat3,
    font_cache: HashMap<String, Rc<LoadedFont>>,
    page_resources: Option<crate::resources::Resources>,
}

/// Render one page to a canvas.
pub fn render_page(
    reader: &mut PdfReader,
    page: &Page,
    options: &RenderOptions,
) -> PdfResult<Canvas> {
    let media_box = page.media_box.ok_or_else(|| {
        PdfError::with_message(PdfErrorKind::MissingDictKey, "page has no MediaBox")
    })?;

    let rotate = page.rotate.unwrap_or(0).rem_euclid(360);
    if rotate % 90 != 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidNumber,
            format!("/Rotate {} is not a multiple of 90", rotate),
        ));
    }

    let page_width = media_box.width();
    let page_height = media_box.height();
    let (canvas_width_pts, canvas_height_pts) = if rotate == 90 || rotate == 270 {
        (page_height, page_width)
    } else {
        (page_width, page_height)
    };

    let width = (canvas_width_pts * options.scale).ceil().max(1.0) as u32;
    let height = (canvas_height_pts * options.scale).ceil().max(1.0) as u32;
    debug!("rendering page to {}x{} canvas", width, height);

    // Flip user space (y up) into device space (y down), then apply the
    // page rotation.
    let flip = Mat3::from_pdf(1.0, 0.0, 0.0, -1.0, -media_box.llx, media_box.ury);
    let base_ctm = match rotate {
        0 => flip,
        90 => flip.mul(Mat3::from_pdf(0.0, 1.0, -1.0, 0.0, page_height, 0.0)),
        180 => flip.mul(Mat3::from_pdf(-1.0, 0.0, 0.0, -1.0, page_width, page_height)),
        270 => flip.mul(Mat3::from_pdf(0.0, -1.0, 1.0, 0.0, 0.0, page_width)),
        _ => unreachable!(),
    };

    let canvas = Canvas::new(width, height, options.background, options.scale);

    let mut operations = Vec::new();
    if let Some(contents) = &page.contents {
        for content_ref in contents {
            let stream = content_ref.resolve(reader).ctx("resolving page contents")?;
            operations.extend(stream.operations.iter().cloned());
        }
    }

    let mut renderer = Renderer {
        reader,
        canvas,
        state: GState::new(base_ctm),
        state_stack: Vec::new(),
        current_path: PathBuilder::new(PathOptions::flattened()),
        pending_clip: None,
        text_matrix: Mat3::identity(),
        line_matrix: Mat3::identity(),
        font_cache: HashMap::new(),
        page_resources: page.resources.clone(),
    };

    for operation in &operations {
        renderer.execute(operation)?;
    }

    Ok(renderer.canvas)
}

impl Renderer<'_> {
    fn device_point(&self, p: Vec2) -> Vec2 {
        self.state.ctm.transform(p)
    }

    fn paint(&mut self, fill: bool, stroke: bool, even_odd: bool, close_first: bool) {
        if close_first {
            self.current_path.close_contour();
        }

        let brush = Brush {
            fill,
            stroke,
            fill_rgba: self.state.fill_color,
            stroke_rgba: self.state.stroke_color,
            stroke_width: self.state.line_width * ctm_scale(&self.state.ctm),
            line_cap: self.state.line_cap,
            line_join: self.state.line_join,
            miter_limit: self.state.miter_limit,
            even_odd_fill: even_odd,
        };
        self.canvas.draw_path(&self.current_path, &brush);
        self.finish_path_op();
    }

    /// Painting ops consume the current path; a pending `W`/`W*` becomes
    /// a clip entry at the same moment.
    fn finish_path_op(&mut self) {
        if let Some(rule) = self.pending_clip.take() {
            self.canvas.push_clip_path(
                self.current_path.clone(),
                rule == FillRule::EvenOdd,
            );
        }
        self.current_path = PathBuilder::new(PathOptions::flattened());
    }

    fn load_font(&mut self, name: &str) -> PdfResult<Rc<LoadedFont>> {
        if let Some(font) = self.font_cache.get(name) {
            return Ok(Rc::clone(font));
        }

        let resources = self.page_resources.as_ref().ok_or_else(|| {
            PdfError::with_message(PdfErrorKind::RenderMissingResource, "page has no resources")
        })?;
        let font_ref = resources.font(name).ok_or_else(|| {
            PdfError::with_message(
                PdfErrorKind::RenderMissingResource,
                format!("font /{} not in resources", name),
            )
        })?;

        let record = font_ref.resolve(self.reader)?;
        let program = record.load_program(self.reader)?;
        let loaded = Rc::new(LoadedFont { record, program });
        self.font_cache.insert(name.to_string(), Rc::clone(&loaded));
        Ok(loaded)
    }

    fn show_text(&mut self, text: &[u8]) -> PdfResult<()> {
        let Some(font) = self.state.text.font.clone() else {
            return Err(PdfError::with_message(
                PdfErrorKind::RenderMissingResource,
                "text shown with no font selected",
            ));
        };

        let size = self.state.text.font_size;
        let th = self.state.text.horizontal_scaling / 100.0;
        let upem = font.program.units_per_em() as f64;
        let invisible = self.state.text.render_mode == 3;

        for cid in Font::decode_cids(text)? {
            if !invisible {
                // Glyph space (font units) to text space to device space.
                let glyph_matrix = Mat3::from_pdf(
                    size * th / upem,
                    0.0,
                    0.0,
                    size / upem,
                    0.0,
                    self.state.text.rise,
                )
                .mul(self.text_matrix)
                .mul(self.state.ctm);

                let glyph = font.program.glyph_for_cid(cid)?;
                let mut glyph_path = PathBuilder::new(PathOptions::flattened());
                glyph_to_path(&glyph, &mut glyph_path, glyph_matrix);

                if !glyph_path.is_empty() {
                    let brush = Brush {
                        fill: true,
                        fill_rgba: self.state.fill_color,
                        ..Brush::default()
                    };
                    self.canvas.draw_path(&glyph_path, &brush);
                }
            }

            // Advance by the CID width plus spacing; word spacing only
            // applies to the single-byte space code.
            let w0 = font.record.glyph_width(cid) as f64 / 1000.0;
            let mut advance = w0 * size + self.state.text.char_spacing;
            if cid == 32 {
                advance += self.state.text.word_spacing;
            }
            self.text_matrix = Mat3::translate(advance * th, 0.0).mul(self.text_matrix);
        }

        Ok(())
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Mat3::translate(tx, ty).mul(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn execute(&mut self, operation: &ContentOp) -> PdfResult<()> {
        match operation {
            // Graphics state
            ContentOp::SetLineWidth(width) => self.state.line_width = *width,
            ContentOp::SetLineCap(cap) => self.state.line_cap = *cap,
            ContentOp::SetLineJoin(join) => self.state.line_join = *join,
            ContentOp::SetMiterLimit(limit) => self.state.miter_limit = *limit,
            ContentOp::SetDashPattern { .. } => warn!("dash patterns are not rendered"),
            ContentOp::SetRenderingIntent(_) | ContentOp::SetFlatness(_) => {}
            ContentOp::SetGState(name) => {
                warn!("/{} gs parameter dictionaries are not applied", name)
            }
            ContentOp::PushGState => self.state_stack.push(self.state.clone()),
            ContentOp::PopGState => {
                let restored = self.state_stack.pop().ok_or_else(|| {
                    PdfError::with_message(
                        PdfErrorKind::RenderStateUnderflow,
                        "Q with no matching q",
                    )
                })?;
                let excess = self.canvas.clip_depth() - restored.clip_depth;
                self.canvas.pop_clip_paths(excess);
                self.state = restored;
            }
            ContentOp::ConcatMatrix(m) => self.state.ctm = m.mul(self.state.ctm),

            // Path construction
            ContentOp::MoveTo(p) => {
                let device = self.device_point(*p);
                self.current_path.move_to(device);
            }
            ContentOp::LineTo(p) => {
                let device = self.device_point(*p);
                self.current_path.line_to(device);
            }
            ContentOp::CubicBezier { c1, c2, end } => {
                let c1 = self.device_point(*c1);
                let c2 = self.device_point(*c2);
                let end = self.device_point(*end);
                self.current_path.cubic_bezier_to(c1, c2, end);
            }
            ContentOp::CubicBezierV { c2, end } => {
                let c1 = self.current_path.current_point().unwrap_or_default();
                let c2 = self.device_point(*c2);
                let end = self.device_point(*end);
                self.current_path.cubic_bezier_to(c1, c2, end);
            }
            ContentOp::CubicBezierY { c1, end } => {
                let c1 = self.device_point(*c1);
                let end = self.device_point(*end);
                self.current_path.cubic_bezier_to(c1, end, end);
            }
            ContentOp::ClosePath => self.current_path.close_contour(),

            // Painting
            ContentOp::Stroke => self.paint(false, true, false, false),
            ContentOp::CloseStroke => self.paint(false, true, false, true),
            ContentOp::Fill => self.paint(true, false, false, false),
            ContentOp::FillEvenOdd => self.paint(true, false, true, false),
            ContentOp::FillStroke => self.paint(true, true, false, false),
            ContentOp::FillStrokeEvenOdd => self.paint(true, true, true, false),
            ContentOp::CloseFillStroke => self.paint(true, true, false, true),
            ContentOp::CloseFillStrokeEvenOdd => self.paint(true, true, true, true),
            ContentOp::EndPath => self.finish_path_op(),

            // Clipping
            ContentOp::Clip => self.pending_clip = Some(FillRule::Nonzero),
            ContentOp::ClipEvenOdd => self.pending_clip = Some(FillRule::EvenOdd),

            // Text
            ContentOp::BeginText => {
                self.text_matrix = Mat3::identity();
                self.line_matrix = Mat3::identity();
            }
            ContentOp::EndText => {}
            ContentOp::SetCharSpacing(v) => self.state.text.char_spacing = *v,
            ContentOp::SetWordSpacing(v) => self.state.text.word_spacing = *v,
            ContentOp::SetHorizontalScaling(v) => self.state.text.horizontal_scaling = *v,
            ContentOp::SetLeading(v) => self.state.text.leading = *v,
            ContentOp::SetFont { font, size } => {
                let loaded = self
                    .load_font(font)
                    .with_ctx(|| format!("selecting font /{}", font))?;
                self.state.text.font = Some(loaded);
                self.state.text.font_size = *size;
            }
            ContentOp::SetRenderMode(mode) => self.state.text.render_mode = *mode,
            ContentOp::SetRise(v) => self.state.text.rise = *v,
            ContentOp::TextOffset(offset) => self.next_line(offset.x, offset.y),
            ContentOp::TextOffsetSetLeading(offset) => {
                self.state.text.leading = -offset.y;
                self.next_line(offset.x, offset.y);
            }
            ContentOp::SetTextMatrix(m) => {
                self.text_matrix = *m;
                self.line_matrix = *m;
            }
            ContentOp::NextLine => self.next_line(0.0, -self.state.text.leading),
            ContentOp::ShowText(text) => self.show_text(text)?,
            ContentOp::PositionText(offset) => {
                let size = self.state.text.font_size;
                let th = self.state.text.horizontal_scaling / 100.0;
                let tx = -offset.as_real() / 1000.0 * size * th;
                self.text_matrix = Mat3::translate(tx, 0.0).mul(self.text_matrix);
            }

            // Type 3 glyph metrics: no Type 3 fonts here.
            ContentOp::SetGlyphWidth(_) | ContentOp::SetGlyphWidthBBox { .. } => {}

            // Color
            ContentOp::SetStrokeColorSpace(name) | ContentOp::SetFillColorSpace(name) => {
                warn!("color space /{} selection is not applied", name)
            }
            ContentOp::SetStrokeColor(components) => {
                if let Some(color) = device_color(components) {
                    self.state.stroke_color = color;
                }
            }
            ContentOp::SetFillColor(components) => {
                if let Some(color) = device_color(components) {
                    self.state.fill_color = color;
                }
            }
            ContentOp::SetStrokeColorN { components, .. } => {
                if let Some(color) = device_color(components) {
                    self.state.stroke_color = color;
                }
            }
            ContentOp::SetFillColorN { components, .. } => {
                if let Some(color) = device_color(components) {
                    self.state.fill_color = color;
                }
            }
            ContentOp::SetStrokeGray(level) => {
                self.state.stroke_color = rgb_color(*level, *level, *level)
            }
            ContentOp::SetFillGray(level) => {
                self.state.fill_color = rgb_color(*level, *level, *level)
            }
            ContentOp::SetStrokeRgb { r, g, b } => {
                self.state.stroke_color = rgb_color(*r, *g, *b)
            }
            ContentOp::SetFillRgb { r, g, b } => self.state.fill_color = rgb_color(*r, *g, *b),
            ContentOp::SetStrokeCmyk { c, m, y, k } => {
                self.state.stroke_color = cmyk_color(*c, *m, *y, *k)
            }
            ContentOp::SetFillCmyk { c, m, y, k } => {
                self.state.fill_color = cmyk_color(*c, *m, *y, *k)
            }

            // Unsupported painting sources
            ContentOp::PaintShading(name) => warn!("shading /{} is not rendered", name),
            ContentOp::PaintXObject(name) => warn!("xobject /{} is not rendered", name),

            // Marked content and compatibility sections carry no
            // rendering semantics.
            ContentOp::MarkedContentPoint(_)
            | ContentOp::MarkedContentPointProps { .. }
            | ContentOp::BeginMarkedContent(_)
            | ContentOp::BeginMarkedContentProps { .. }
            | ContentOp::EndMarkedContent
            | ContentOp::BeginCompatibility
            | ContentOp::EndCompatibility => {}
        }

        Ok(())
    }
}

/// Interpret raw color components by count: gray, RGB, or CMYK.
fn device_color(components: &[Number]) -> Option<Rgba> {
    match components {
        [gray] => {
            let v = gray.as_real();
            Some(rgb_color(v, v, v))
        }
        [r, g, b] => Some(rgb_color(r.as_real(), g.as_real(), b.as_real())),
        [c, m, y, k] => Some(cmyk_color(
            c.as_real(),
            m.as_real(),
            y.as_real(),
            k.as_real(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_content_operations;
    use crate::geom::Rect;
    use crate::object::ObjId;

    fn blank_page(width: f64, height: f64) -> Page {
        Page {
            parent: ObjId(1, 0),
            resources: None,
            media_box: Some(Rect {
                llx: 0.0,
                lly: 0.0,
                urx: width,
                ury: height,
            }),
            crop_box: None,
            rotate: None,
            contents: None,
        }
    }

    fn run_ops(source: &[u8], width: f64, height: f64) -> Canvas {
        // Drive the renderer directly with parsed operations; no file
        // plumbing needed.
        let page = blank_page(width, height);
        let mut reader = crate::reader::PdfReader::from_bytes(minimal_pdf()).unwrap();
        let operations = parse_content_operations(source).unwrap();

        let media_box = page.media_box.unwrap();
        let flip = Mat3::from_pdf(1.0, 0.0, 0.0, -1.0, -media_box.llx, media_box.ury);
        let mut renderer = Renderer {
            reader: &mut reader,
            canvas: Canvas::new(width as u32, height as u32, Rgba::WHITE, 1.0),
            state: GState::new(flip),
            state_stack: Vec::new(),
            current_path: PathBuilder::new(PathOptions::flattened()),
            pending_clip: None,
            text_matrix: Mat3::identity(),
            line_matrix: Mat3::identity(),
            font_cache: HashMap::new(),
            page_resources: None,
        };
        for operation in &operations {
            renderer.execute(operation).unwrap();
        }
        renderer.canvas
    }

    fn minimal_pdf() -> Vec<u8> {
        b"%PDF-1.5\n1 0 obj\n<< >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n30\n%%EOF\n".to_vec()
    }

    #[test]
    fn fill_respects_user_space_flip() {
        // A rectangle at the bottom-left of user space lands at the
        // bottom-left of the image (high canvas y).
        let canvas = run_ops(b"0 0 0 rg 1 1 4 4 re f", 20.0, 20.0);
        assert_eq!(canvas.get_rgba(2, 17), Rgba::BLACK);
        assert_eq!(canvas.get_rgba(2, 2), Rgba::WHITE);
    }

    #[test]
    fn fill_color_applies() {
        let canvas = run_ops(b"1 0 0 rg 5 5 10 10 re f", 20.0, 20.0);
        assert_eq!(canvas.get_rgba(10, 10), Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn gstate_stack_restores_color() {
        let canvas = run_ops(
            b"q 1 0 0 rg 0 10 5 5 re f Q 5 0 5 5 re f",
            20.0,
            20.0,
        );
        // First fill is red, second painted with the restored black.
        assert_eq!(canvas.get_rgba(2, 7), Rgba::new(255, 0, 0, 255));
        assert_eq!(canvas.get_rgba(7, 17), Rgba::BLACK);
    }

    #[test]
    fn pop_below_base_is_an_error() {
        let page = blank_page(10.0, 10.0);
        let mut reader = crate::reader::PdfReader::from_bytes(minimal_pdf()).unwrap();
        let operations = parse_content_operations(b"Q").unwrap();
        let media_box = page.media_box.unwrap();
        let flip = Mat3::from_pdf(1.0, 0.0, 0.0, -1.0, -media_box.llx, media_box.ury);
        let mut renderer = Renderer {
            reader: &mut reader,
            canvas: Canvas::new(10, 10, Rgba::WHITE, 1.0),
            state: GState::new(flip),
            state_stack: Vec::new(),
            current_path: PathBuilder::new(PathOptions::flattened()),
            pending_clip: None,
            text_matrix: Mat3::identity(),
            line_matrix: Mat3::identity(),
            font_cache: HashMap::new(),
            page_resources: None,
        };
        let err = renderer.execute(&operations[0]).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::RenderStateUnderflow);
    }

    #[test]
    fn clip_limits_later_paints() {
        let canvas = run_ops(
            b"0 0 10 20 re W n 0 0 20 20 re f",
            20.0,
            20.0,
        );
        assert_eq!(canvas.get_rgba(5, 10), Rgba::BLACK);
        assert_eq!(canvas.get_rgba(15, 10), Rgba::WHITE);
    }

    #[test]
    fn clip_pops_with_gstate() {
        let canvas = run_ops(
            b"q 0 0 10 20 re W n Q 0 0 20 20 re f",
            20.0,
            20.0,
        );
        // The clip died with the Q, so the full rect painted.
        assert_eq!(canvas.get_rgba(15, 10), Rgba::BLACK);
    }

    #[test]
    fn concat_matrix_scales_paths() {
        let canvas = run_ops(b"2 0 0 2 0 0 cm 1 1 4 4 re f", 20.0, 20.0);
        // The 4x4 rect painted as 8x8 at (2,2) in user space.
        assert_eq!(canvas.get_rgba(5, 13), Rgba::BLACK);
        assert_eq!(canvas.get_rgba(11, 13), Rgba::WHITE);
    }

    #[test]
    fn cmyk_conversion() {
        assert_eq!(cmyk_color(0.0, 0.0, 0.0, 1.0), Rgba::BLACK);
        assert_eq!(cmyk_color(0.0, 0.0, 0.0, 0.0), Rgba::new(255, 255, 255, 255));
        assert_eq!(cmyk_color(1.0, 0.0, 0.0, 0.0), Rgba::new(0, 255, 255, 255));
    }
}
