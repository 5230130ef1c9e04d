//! Content-stream tokenization: operands parse with the object grammar
//! until an operator token follows, which is matched byte by byte and
//! materialized as a tagged operation.

use log::trace;

use crate::canvas::{LineCap, LineJoin};
use crate::ctx::{is_pdf_non_regular, Ctx};
use crate::deserialize::{FromObject, Operands};
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::geom::{Mat3, Vec2};
use crate::object::{Number, PdfObject, PdfString, Stream};
use crate::reader::OptResolver;

// ── Operators ─────────────────────────────────────────────────────────────────

/// The operator tokens, named as they appear on the wire.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    w, J, j, M, d, ri, i, gs,
    q, Q, cm,
    m, l, c, v, y, h, re,
    S, s, f, F, f_star, B, B_star, b, b_star, n,
    W, W_star,
    BT, ET,
    Tc, Tw, Tz, TL, Tf, Tr, Ts,
    Td, TD, Tm, T_star,
    Tj, TJ, quote, double_quote,
    d0, d1,
    CS, cs, SC, SCN, sc, scn, G, g, RG, rg, K, k,
    sh, Do,
    BI, ID, EI,
    MP, DP, BMC, BDC, EMC,
    BX, EX,
}

fn unknown_operator(byte: u8) -> PdfError {
    PdfError::with_message(PdfErrorKind::UnknownOperator, format!("byte 0x{:02x}", byte))
}

/// When a one-byte operator shares its first byte with a two-byte one,
/// the next byte decides: a non-regular byte (or EOF) selects the short
/// form, the exact second byte selects the long form.
fn select_one_or_two(
    ctx: &mut Ctx,
    single: Operator,
    double: Operator,
    second_byte: u8,
) -> PdfResult<Operator> {
    match ctx.peek() {
        Err(_) => Ok(single),
        Ok(byte) if is_pdf_non_regular(byte) => Ok(single),
        Ok(byte) if byte == second_byte => {
            ctx.shift(1)?;
            Ok(double)
        }
        Ok(byte) => Err(unknown_operator(byte)),
    }
}

/// Commit to a two-byte operator: the second byte must match exactly.
fn two_byte(ctx: &mut Ctx, operator: Operator, second_byte: u8) -> PdfResult<Operator> {
    let byte = ctx.peek_and_advance()?;
    if byte != second_byte {
        return Err(PdfError::with_message(
            PdfErrorKind::UnknownOperator,
            format!("expected `{}`, found `{}`", second_byte as char, byte as char),
        ));
    }
    Ok(operator)
}

/// Peek the byte after a shared prefix: non-regular (or EOF) means the
/// one-byte operator stands alone.
fn is_single_byte(ctx: &mut Ctx) -> PdfResult<Option<u8>> {
    match ctx.peek() {
        Err(_) => Ok(None),
        Ok(byte) if is_pdf_non_regular(byte) => Ok(None),
        Ok(byte) => {
            ctx.shift(1)?;
            Ok(Some(byte))
        }
    }
}

pub fn parse_operator(ctx: &mut Ctx) -> PdfResult<Operator> {
    let first = ctx.peek_and_advance()?;

    match first {
        b'w' => Ok(Operator::w),
        b'J' => Ok(Operator::J),
        b'j' => Ok(Operator::j),
        b'M' => select_one_or_two(ctx, Operator::M, Operator::MP, b'P'),
        b'd' => match is_single_byte(ctx)? {
            None => Ok(Operator::d),
            Some(b'0') => Ok(Operator::d0),
            Some(b'1') => Ok(Operator::d1),
            Some(byte) => Err(unknown_operator(byte)),
        },
        b'r' => match ctx.peek_and_advance()? {
            b'i' => Ok(Operator::ri),
            b'e' => Ok(Operator::re),
            b'g' => Ok(Operator::rg),
            byte => Err(unknown_operator(byte)),
        },
        b'i' => Ok(Operator::i),
        b'g' => select_one_or_two(ctx, Operator::g, Operator::gs, b's'),
        b'q' => Ok(Operator::q),
        b'Q' => Ok(Operator::Q),
        b'c' => match is_single_byte(ctx)? {
            None => Ok(Operator::c),
            Some(b'm') => Ok(Operator::cm),
            Some(b's') => Ok(Operator::cs),
            Some(byte) => Err(unknown_operator(byte)),
        },
        b'm' => Ok(Operator::m),
        b'l' => Ok(Operator::l),
        b'v' => Ok(Operator::v),
        b'y' => Ok(Operator::y),
        b'h' => Ok(Operator::h),
        b'S' => match is_single_byte(ctx)? {
            None => Ok(Operator::S),
            Some(b'C') => select_one_or_two(ctx, Operator::SC, Operator::SCN, b'N'),
            Some(byte) => Err(unknown_operator(byte)),
        },
        b's' => match is_single_byte(ctx)? {
            None => Ok(Operator::s),
            Some(b'c') => select_one_or_two(ctx, Operator::sc, Operator::scn, b'n'),
            Some(b'h') => Ok(Operator::sh),
            Some(byte) => Err(unknown_operator(byte)),
        },
        b'f' => select_one_or_two(ctx, Operator::f, Operator::f_star, b'*'),
        b'F' => Ok(Operator::F),
        b'B' => match is_single_byte(ctx)? {
            None => Ok(Operator::B),
            Some(b'*') => Ok(Operator::B_star),
            Some(b'T') => Ok(Operator::BT),
            Some(b'I') => Ok(Operator::BI),
            Some(b'M') => two_byte(ctx, Operator::BMC, b'C'),
            Some(b'D') => two_byte(ctx, Operator::BDC, b'C'),
            Some(b'X') => Ok(Operator::BX),
            Some(byte) => Err(unknown_operator(byte)),
        },
        b'b' => select_one_or_two(ctx, Operator::b, Operator::b_star, b'*'),
        b'n' => Ok(Operator::n),
        b'W' => select_one_or_two(ctx, Operator::W, Operator::W_star, b'*'),
        b'E' => match ctx.peek_and_advance()? {
            b'T' => Ok(Operator::ET),
            b'I' => Ok(Operator::EI),
            b'M' => two_byte(ctx, Operator::EMC, b'C'),
            b'X' => Ok(Operator::EX),
            byte => Err(unknown_operator(byte)),
        },
        b'T' => match ctx.peek_and_advance()? {
            b'c' => Ok(Operator::Tc),
            b'w' => Ok(Operator::Tw),
            b'z' => Ok(Operator::Tz),
            b'L' => Ok(Operator::TL),
            b'f' => Ok(Operator::Tf),
            b'r' => Ok(Operator::Tr),
            b's' => Ok(Operator::Ts),
            b'd' => Ok(Operator::Td),
            b'D' => Ok(Operator::TD),
            b'm' => Ok(Operator::Tm),
            b'*' => Ok(Operator::T_star),
            b'j' => Ok(Operator::Tj),
            b'J' => Ok(Operator::TJ),
            byte => Err(unknown_operator(byte)),
        },
        b'\'' => Ok(Operator::quote),
        b'"' => Ok(Operator::double_quote),
        b'C' => two_byte(ctx, Operator::CS, b'S'),
        b'G' => Ok(Operator::G),
        b'R' => two_byte(ctx, Operator::RG, b'G'),
        b'K' => Ok(Operator::K),
        b'k' => Ok(Operator::k),
        b'I' => two_byte(ctx, Operator::ID, b'D'),
        b'D' => match ctx.peek_and_advance()? {
            b'o' => Ok(Operator::Do),
            b'P' => Ok(Operator::DP),
            byte => Err(unknown_operator(byte)),
        },
        byte => Err(unknown_operator(byte)),
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

/// A materialized painting/text operation with typed operands.
#[derive(Debug, Clone)]
pub enum ContentOp {
    SetLineWidth(f64),
    SetLineCap(LineCap),
    SetLineJoin(LineJoin),
    SetMiterLimit(f64),
    SetDashPattern { array: Vec<f64>, phase: f64 },
    SetRenderingIntent(String),
    SetFlatness(f64),
    SetGState(String),
    PushGState,
    PopGState,
    ConcatMatrix(Mat3),
    MoveTo(Vec2),
    LineTo(Vec2),
    CubicBezier { c1: Vec2, c2: Vec2, end: Vec2 },
    /// `v`: the current point doubles as the first control point.
    CubicBezierV { c2: Vec2, end: Vec2 },
    /// `y`: the endpoint doubles as the second control point.
    CubicBezierY { c1: Vec2, end: Vec2 },
    ClosePath,
    Stroke,
    CloseStroke,
    Fill,
    FillEvenOdd,
    FillStroke,
    FillStrokeEvenOdd,
    CloseFillStroke,
    CloseFillStrokeEvenOdd,
    EndPath,
    Clip,
    ClipEvenOdd,
    BeginText,
    EndText,
    SetCharSpacing(f64),
    SetWordSpacing(f64),
    SetHorizontalScaling(f64),
    SetLeading(f64),
    SetFont { font: String, size: f64 },
    SetRenderMode(i32),
    SetRise(f64),
    TextOffset(Vec2),
    TextOffsetSetLeading(Vec2),
    SetTextMatrix(Mat3),
    NextLine,
    ShowText(Vec<u8>),
    /// A `TJ` numeric element; integer-vs-real typing is preserved.
    PositionText(Number),
    SetGlyphWidth(Vec2),
    SetGlyphWidthBBox { width: Vec2, ll: Vec2, ur: Vec2 },
    SetStrokeColorSpace(String),
    SetFillColorSpace(String),
    SetStrokeColor(Vec<Number>),
    SetStrokeColorN { components: Vec<Number>, pattern: Option<String> },
    SetFillColor(Vec<Number>),
    SetFillColorN { components: Vec<Number>, pattern: Option<String> },
    SetStrokeGray(f64),
    SetFillGray(f64),
    SetStrokeRgb { r: f64, g: f64, b: f64 },
    SetFillRgb { r: f64, g: f64, b: f64 },
    SetStrokeCmyk { c: f64, m: f64, y: f64, k: f64 },
    SetFillCmyk { c: f64, m: f64, y: f64, k: f64 },
    PaintShading(String),
    PaintXObject(String),
    MarkedContentPoint(String),
    MarkedContentPointProps { tag: String, properties: PdfObject },
    BeginMarkedContent(String),
    BeginMarkedContentProps { tag: String, properties: PdfObject },
    EndMarkedContent,
    BeginCompatibility,
    EndCompatibility,
}

fn line_cap_from_int(value: i32) -> PdfResult<LineCap> {
    match value {
        0 => Ok(LineCap::Butt),
        1 => Ok(LineCap::Round),
        2 => Ok(LineCap::Square),
        _ => Err(PdfError::with_message(
            PdfErrorKind::InvalidNumber,
            "line cap style must be in range 0-2 inclusive",
        )),
    }
}

fn line_join_from_int(value: i32) -> PdfResult<LineJoin> {
    match value {
        0 => Ok(LineJoin::Miter),
        1 => Ok(LineJoin::Round),
        2 => Ok(LineJoin::Bevel),
        _ => Err(PdfError::with_message(
            PdfErrorKind::InvalidNumber,
            "line join style must be in range 0-2 inclusive",
        )),
    }
}

fn take_vec2(ops: &mut Operands) -> PdfResult<Vec2> {
    let x = ops.next::<f64>()?;
    let y = ops.next::<f64>()?;
    Ok(Vec2::new(x, y))
}

fn take_matrix(ops: &mut Operands) -> PdfResult<Mat3> {
    let a = ops.next::<f64>()?;
    let b = ops.next::<f64>()?;
    let c = ops.next::<f64>()?;
    let d = ops.next::<f64>()?;
    let e = ops.next::<f64>()?;
    let f = ops.next::<f64>()?;
    Ok(Mat3::from_pdf(a, b, c, d, e, f))
}

/// Color operands for `SC`/`sc`: one to four numbers.
fn take_color_components(operands: &[PdfObject]) -> PdfResult<Vec<Number>> {
    if operands.is_empty() || operands.len() > 4 {
        return Err(PdfError::with_message(
            PdfErrorKind::MissingOperand,
            format!("{} color components", operands.len()),
        ));
    }
    operands.iter().map(|obj| obj.as_number()).collect()
}

/// Color operands for `SCN`/`scn`: numbers, optionally followed by a
/// pattern name.
fn take_color_components_n(operands: &[PdfObject]) -> PdfResult<(Vec<Number>, Option<String>)> {
    let (pattern, numeric) = match operands.last() {
        Some(PdfObject::Name(name)) => (Some(name.clone()), &operands[..operands.len() - 1]),
        _ => (None, operands),
    };
    let components = numeric
        .iter()
        .map(|obj| obj.as_number())
        .collect::<PdfResult<Vec<Number>>>()?;
    Ok((components, pattern))
}

/// Lower one operator and its operands into operation records.
fn build_operations(
    operator: Operator,
    operands: &[PdfObject],
    out: &mut Vec<ContentOp>,
) -> PdfResult<()> {
    let mut ops = Operands::new(operands);

    match operator {
        Operator::w => out.push(ContentOp::SetLineWidth(ops.next()?)),
        Operator::J => out.push(ContentOp::SetLineCap(line_cap_from_int(ops.next()?)?)),
        Operator::j => out.push(ContentOp::SetLineJoin(line_join_from_int(ops.next()?)?)),
        Operator::M => out.push(ContentOp::SetMiterLimit(ops.next()?)),
        Operator::d => {
            let array: Vec<f64> = ops.next()?;
            let phase: f64 = ops.next()?;
            out.push(ContentOp::SetDashPattern { array, phase });
        }
        Operator::ri => out.push(ContentOp::SetRenderingIntent(ops.next()?)),
        Operator::i => out.push(ContentOp::SetFlatness(ops.next()?)),
        Operator::gs => out.push(ContentOp::SetGState(ops.next()?)),
        Operator::q => out.push(ContentOp::PushGState),
        Operator::Q => out.push(ContentOp::PopGState),
        Operator::cm => out.push(ContentOp::ConcatMatrix(take_matrix(&mut ops)?)),
        Operator::m => out.push(ContentOp::MoveTo(take_vec2(&mut ops)?)),
        Operator::l => out.push(ContentOp::LineTo(take_vec2(&mut ops)?)),
        Operator::c => {
            let c1 = take_vec2(&mut ops)?;
            let c2 = take_vec2(&mut ops)?;
            let end = take_vec2(&mut ops)?;
            out.push(ContentOp::CubicBezier { c1, c2, end });
        }
        Operator::v => {
            let c2 = take_vec2(&mut ops)?;
            let end = take_vec2(&mut ops)?;
            out.push(ContentOp::CubicBezierV { c2, end });
        }
        Operator::y => {
            let c1 = take_vec2(&mut ops)?;
            let end = take_vec2(&mut ops)?;
            out.push(ContentOp::CubicBezierY { c1, end });
        }
        Operator::h => out.push(ContentOp::ClosePath),
        Operator::re => {
            // A rectangle is sugar for move, three lines, close.
            let x: f64 = ops.next()?;
            let y: f64 = ops.next()?;
            let width: f64 = ops.next()?;
            let height: f64 = ops.next()?;
            out.push(ContentOp::MoveTo(Vec2::new(x, y)));
            out.push(ContentOp::LineTo(Vec2::new(x + width, y)));
            out.push(ContentOp::LineTo(Vec2::new(x + width, y + height)));
            out.push(ContentOp::LineTo(Vec2::new(x, y + height)));
            out.push(ContentOp::ClosePath);
        }
        Operator::S => out.push(ContentOp::Stroke),
        Operator::s => out.push(ContentOp::CloseStroke),
        Operator::f | Operator::F => out.push(ContentOp::Fill),
        Operator::f_star => out.push(ContentOp::FillEvenOdd),
        Operator::B => out.push(ContentOp::FillStroke),
        Operator::B_star => out.push(ContentOp::FillStrokeEvenOdd),
        Operator::b => out.push(ContentOp::CloseFillStroke),
        Operator::b_star => out.push(ContentOp::CloseFillStrokeEvenOdd),
        Operator::n => out.push(ContentOp::EndPath),
        Operator::W => out.push(ContentOp::Clip),
        Operator::W_star => out.push(ContentOp::ClipEvenOdd),
        Operator::BT => out.push(ContentOp::BeginText),
        Operator::ET => out.push(ContentOp::EndText),
        Operator::Tc => out.push(ContentOp::SetCharSpacing(ops.next()?)),
        Operator::Tw => out.push(ContentOp::SetWordSpacing(ops.next()?)),
        Operator::Tz => out.push(ContentOp::SetHorizontalScaling(ops.next()?)),
        Operator::TL => out.push(ContentOp::SetLeading(ops.next()?)),
        Operator::Tf => {
            let font: String = ops.next()?;
            let size: f64 = ops.next()?;
            out.push(ContentOp::SetFont { font, size });
        }
        Operator::Tr => out.push(ContentOp::SetRenderMode(ops.next()?)),
        Operator::Ts => out.push(ContentOp::SetRise(ops.next()?)),
        Operator::Td => out.push(ContentOp::TextOffset(take_vec2(&mut ops)?)),
        Operator::TD => out.push(ContentOp::TextOffsetSetLeading(take_vec2(&mut ops)?)),
        Operator::Tm => out.push(ContentOp::SetTextMatrix(take_matrix(&mut ops)?)),
        Operator::T_star => out.push(ContentOp::NextLine),
        Operator::Tj => {
            let text: PdfString = ops.next()?;
            out.push(ContentOp::ShowText(text.0));
        }
        Operator::TJ => {
            let elements: Vec<PdfObject> = ops.next()?;
            for element in &elements {
                match element {
                    PdfObject::String(text) => out.push(ContentOp::ShowText(text.clone())),
                    PdfObject::Integer(_) | PdfObject::Real(_) => {
                        out.push(ContentOp::PositionText(element.as_number()?))
                    }
                    other => {
                        return Err(PdfError::with_message(
                            PdfErrorKind::IncorrectType,
                            format!("TJ element is {}", other.type_name()),
                        ))
                    }
                }
            }
        }
        Operator::quote => {
            let text: PdfString = ops.next()?;
            out.push(ContentOp::NextLine);
            out.push(ContentOp::ShowText(text.0));
        }
        Operator::double_quote => {
            let word_spacing: f64 = ops.next()?;
            let char_spacing: f64 = ops.next()?;
            let text: PdfString = ops.next()?;
            out.push(ContentOp::SetWordSpacing(word_spacing));
            out.push(ContentOp::SetCharSpacing(char_spacing));
            out.push(ContentOp::NextLine);
            out.push(ContentOp::ShowText(text.0));
        }
        Operator::d0 => out.push(ContentOp::SetGlyphWidth(take_vec2(&mut ops)?)),
        Operator::d1 => {
            let width = take_vec2(&mut ops)?;
            let ll = take_vec2(&mut ops)?;
            let ur = take_vec2(&mut ops)?;
            out.push(ContentOp::SetGlyphWidthBBox { width, ll, ur });
        }
        Operator::CS => out.push(ContentOp::SetStrokeColorSpace(ops.next()?)),
        Operator::cs => out.push(ContentOp::SetFillColorSpace(ops.next()?)),
        Operator::SC => {
            out.push(ContentOp::SetStrokeColor(take_color_components(operands)?));
            return Ok(());
        }
        Operator::sc => {
            out.push(ContentOp::SetFillColor(take_color_components(operands)?));
            return Ok(());
        }
        Operator::SCN => {
            let (components, pattern) = take_color_components_n(operands)?;
            out.push(ContentOp::SetStrokeColorN { components, pattern });
            return Ok(());
        }
        Operator::scn => {
            let (components, pattern) = take_color_components_n(operands)?;
            out.push(ContentOp::SetFillColorN { components, pattern });
            return Ok(());
        }
        Operator::G => out.push(ContentOp::SetStrokeGray(ops.next()?)),
        Operator::g => out.push(ContentOp::SetFillGray(ops.next()?)),
        Operator::RG => {
            let r = ops.next()?;
            let g = ops.next()?;
            let b = ops.next()?;
            out.push(ContentOp::SetStrokeRgb { r, g, b });
        }
        Operator::rg => {
            let r = ops.next()?;
            let g = ops.next()?;
            let b = ops.next()?;
            out.push(ContentOp::SetFillRgb { r, g, b });
        }
        Operator::K => {
            let c = ops.next()?;
            let m = ops.next()?;
            let y = ops.next()?;
            let k = ops.next()?;
            out.push(ContentOp::SetStrokeCmyk { c, m, y, k });
        }
        Operator::k => {
            let c = ops.next()?;
            let m = ops.next()?;
            let y = ops.next()?;
            let k = ops.next()?;
            out.push(ContentOp::SetFillCmyk { c, m, y, k });
        }
        Operator::sh => out.push(ContentOp::PaintShading(ops.next()?)),
        Operator::Do => out.push(ContentOp::PaintXObject(ops.next()?)),
        Operator::BI | Operator::ID | Operator::EI => {
            // Inline image data is raw binary the operand tokenizer
            // cannot skip.
            return Err(PdfError::with_message(
                PdfErrorKind::Unimplemented,
                "inline images",
            ));
        }
        Operator::MP => out.push(ContentOp::MarkedContentPoint(ops.next()?)),
        Operator::DP => {
            let tag: String = ops.next()?;
            let properties: PdfObject = ops.next()?;
            out.push(ContentOp::MarkedContentPointProps { tag, properties });
        }
        Operator::BMC => out.push(ContentOp::BeginMarkedContent(ops.next()?)),
        Operator::BDC => {
            let tag: String = ops.next()?;
            let properties: PdfObject = ops.next()?;
            out.push(ContentOp::BeginMarkedContentProps { tag, properties });
        }
        Operator::EMC => out.push(ContentOp::EndMarkedContent),
        Operator::BX => out.push(ContentOp::BeginCompatibility),
        Operator::EX => out.push(ContentOp::EndCompatibility),
    }

    ops.finish()
}

// ── Stream parsing ────────────────────────────────────────────────────────────

/// A parsed content stream: the ordered operation list.
#[derive(Debug, Clone)]
pub struct ContentStream {
    pub operations: Vec<ContentOp>,
}

/// Tokenize a decoded content stream. Operands never contain indirect
/// references, so no resolver is needed; the byte context is borrowed
/// exclusively for the duration of the parse.
pub fn parse_content_operations(data: &[u8]) -> PdfResult<Vec<ContentOp>> {
    let mut ctx = Ctx::new(data);
    let mut operations = Vec::new();

    loop {
        // Operand objects parse until the grammar fails; what follows
        // must be an operator.
        let mut operands = Vec::new();
        loop {
            ctx.consume_whitespace();
            let saved = ctx.offset();
            match crate::parser::parse_object(&mut ctx, &mut OptResolver::none(true), false) {
                Ok(object) => operands.push(object),
                Err(_) => {
                    let _ = ctx.seek(saved);
                    break;
                }
            }
        }

        ctx.consume_whitespace();
        if ctx.peek().is_err() {
            if !operands.is_empty() {
                return Err(PdfError::with_message(
                    PdfErrorKind::UnknownOperator,
                    format!("{} trailing operands with no operator", operands.len()),
                ));
            }
            break;
        }

        let operator = parse_operator(&mut ctx)
            .with_ctx(|| format!("operator at offset {}", ctx.offset()))?;
        trace!("operator {:?} with {} operands", operator, operands.len());
        build_operations(operator, &operands, &mut operations)
            .with_ctx(|| format!("operands of {:?}", operator))?;
    }

    Ok(operations)
}

impl ContentStream {
    pub fn from_stream(stream: &Stream) -> PdfResult<Self> {
        let operations =
            parse_content_operations(&stream.data).ctx("parsing content stream")?;
        Ok(ContentStream { operations })
    }
}

impl FromObject for ContentStream {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let resolved = resolver.resolve_object(object)?;
        match resolved {
            PdfObject::Stream(stream) => ContentStream::from_stream(&stream),
            other => Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                format!("content stream is {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Vec<ContentOp> {
        parse_content_operations(data).unwrap()
    }

    #[test]
    fn line_width_and_caps() {
        let ops = parse(b"0.5 w 1 J 2 j");
        assert!(matches!(ops[0], ContentOp::SetLineWidth(w) if w == 0.5));
        assert!(matches!(ops[1], ContentOp::SetLineCap(LineCap::Round)));
        assert!(matches!(ops[2], ContentOp::SetLineJoin(LineJoin::Bevel)));
    }

    #[test]
    fn bad_line_cap_value() {
        let err = parse_content_operations(b"3 J").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::InvalidNumber);
    }

    #[test]
    fn rectangle_lowers_to_move_lines_close() {
        let ops = parse(b"10 20 30 40 re");
        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[0], ContentOp::MoveTo(p) if p == Vec2::new(10.0, 20.0)));
        assert!(matches!(ops[1], ContentOp::LineTo(p) if p == Vec2::new(40.0, 20.0)));
        assert!(matches!(ops[2], ContentOp::LineTo(p) if p == Vec2::new(40.0, 60.0)));
        assert!(matches!(ops[3], ContentOp::LineTo(p) if p == Vec2::new(10.0, 60.0)));
        assert!(matches!(ops[4], ContentOp::ClosePath));
    }

    #[test]
    fn positioned_text_preserves_number_typing() {
        let ops = parse(b"[(A) -120 (B) -1.5 (C)] TJ");
        assert_eq!(ops.len(), 5);
        assert!(matches!(&ops[0], ContentOp::ShowText(t) if t == b"A"));
        assert!(matches!(ops[1], ContentOp::PositionText(Number::Integer(-120))));
        assert!(matches!(&ops[2], ContentOp::ShowText(t) if t == b"B"));
        assert!(matches!(ops[3], ContentOp::PositionText(Number::Real(v)) if v == -1.5));
        assert!(matches!(&ops[4], ContentOp::ShowText(t) if t == b"C"));
    }

    #[test]
    fn two_byte_operators_require_exact_match() {
        assert!(parse_content_operations(b"/X CS").is_ok());
        assert!(parse_content_operations(b"/X Cz").is_err());
        assert!(parse_content_operations(b"1 0 0 RG").is_ok());
        assert!(parse_content_operations(b"1 0 0 Rz").is_err());
    }

    #[test]
    fn clipping_operators_emit_and_continue() {
        let ops = parse(b"0 0 5 5 re W n");
        assert!(matches!(ops[5], ContentOp::Clip));
        assert!(matches!(ops[6], ContentOp::EndPath));

        let ops = parse(b"0 0 5 5 re W* n");
        assert!(matches!(ops[5], ContentOp::ClipEvenOdd));
    }

    #[test]
    fn text_block_operators() {
        let ops = parse(b"BT /F0 12 Tf 72 700 Td (Hi) Tj ET");
        assert!(matches!(ops[0], ContentOp::BeginText));
        assert!(
            matches!(&ops[1], ContentOp::SetFont { font, size } if font == "F0" && *size == 12.0)
        );
        assert!(matches!(ops[2], ContentOp::TextOffset(p) if p == Vec2::new(72.0, 700.0)));
        assert!(matches!(&ops[3], ContentOp::ShowText(t) if t == b"Hi"));
        assert!(matches!(ops[4], ContentOp::EndText));
    }

    #[test]
    fn quote_operators_lower_to_next_line_and_show() {
        let ops = parse(b"(one) '");
        assert!(matches!(ops[0], ContentOp::NextLine));
        assert!(matches!(&ops[1], ContentOp::ShowText(t) if t == b"one"));

        let ops = parse(b"2 1 (two) \"");
        assert!(matches!(ops[0], ContentOp::SetWordSpacing(v) if v == 2.0));
        assert!(matches!(ops[1], ContentOp::SetCharSpacing(v) if v == 1.0));
        assert!(matches!(ops[2], ContentOp::NextLine));
        assert!(matches!(&ops[3], ContentOp::ShowText(t) if t == b"two"));
    }

    #[test]
    fn color_operators_carry_operands() {
        let ops = parse(b"1 0 0 rg 0 1 0 RG 0.5 g 0 0 0 1 k");
        assert!(matches!(ops[0], ContentOp::SetFillRgb { r, .. } if r == 1.0));
        assert!(matches!(ops[1], ContentOp::SetStrokeRgb { g, .. } if g == 1.0));
        assert!(matches!(ops[2], ContentOp::SetFillGray(v) if v == 0.5));
        assert!(matches!(ops[3], ContentOp::SetFillCmyk { k, .. } if k == 1.0));
    }

    #[test]
    fn scn_accepts_trailing_pattern_name() {
        let ops = parse(b"0.2 0.3 0.4 /P0 scn");
        match &ops[0] {
            ContentOp::SetFillColorN { components, pattern } => {
                assert_eq!(components.len(), 3);
                assert_eq!(pattern.as_deref(), Some("P0"));
            }
            other => panic!("expected SetFillColorN, found {:?}", other),
        }
    }

    #[test]
    fn marked_content_is_carried() {
        let ops = parse(b"/Tag BMC EMC BX EX");
        assert!(matches!(&ops[0], ContentOp::BeginMarkedContent(tag) if tag == "Tag"));
        assert!(matches!(ops[1], ContentOp::EndMarkedContent));
        assert!(matches!(ops[2], ContentOp::BeginCompatibility));
        assert!(matches!(ops[3], ContentOp::EndCompatibility));
    }

    #[test]
    fn excess_operands_rejected() {
        let err = parse_content_operations(b"1 2 w").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::ExcessOperand);
    }

    #[test]
    fn missing_operands_rejected() {
        let err = parse_content_operations(b"1 0 cm").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::MissingOperand);
    }

    #[test]
    fn unknown_operator_rejected() {
        let err = parse_content_operations(b"1 zz").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::UnknownOperator);
    }

    #[test]
    fn inline_images_are_fatal() {
        let err = parse_content_operations(b"BI").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
    }
}
