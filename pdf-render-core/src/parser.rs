use log::trace;

use crate::codec::{apply_filter_chain, StreamFilter};
use crate::ctx::{is_pdf_non_regular, is_pdf_whitespace, Ctx};
use crate::deserialize::DictReader;
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{
    decode_name_escapes, Dict, ObjId, PdfObject, Stream, StreamDict, REAL_LIMIT,
};
use crate::reader::OptResolver;

/// Parse one object from the cursor.
///
/// Atomic: when parsing fails the cursor is restored to where it started.
/// `in_indirect_obj` enables the dict-to-stream promotion, which is only
/// legal directly inside `obj ... endobj`.
pub fn parse_object(
    ctx: &mut Ctx,
    resolver: &mut OptResolver<'_>,
    in_indirect_obj: bool,
) -> PdfResult<PdfObject> {
    let start = ctx.offset();
    match parse_object_inner(ctx, resolver, in_indirect_obj) {
        Ok(object) => Ok(object),
        Err(err) => {
            let _ = ctx.seek(start);
            Err(err)
        }
    }
}

fn parse_object_inner(
    ctx: &mut Ctx,
    resolver: &mut OptResolver<'_>,
    in_indirect_obj: bool,
) -> PdfResult<PdfObject> {
    ctx.consume_whitespace();
    let first = ctx.peek()?;

    match first {
        b't' | b'f' | b'n' => parse_keyword(ctx),
        b'+' | b'-' | b'.' => parse_number(ctx),
        b'0'..=b'9' => {
            // A digit run may open an indirect object or reference; if
            // that parse fails, rewind and read it as a plain number.
            let saved = ctx.offset();
            match parse_indirect(ctx, resolver) {
                Ok(object) => Ok(object),
                Err(_) => {
                    ctx.seek(saved)?;
                    parse_number(ctx)
                }
            }
        }
        b'(' => parse_literal_string(ctx),
        b'<' => {
            if ctx.peek_next() == Ok(b'<') {
                parse_dict_or_stream(ctx, resolver, in_indirect_obj)
            } else {
                parse_hex_string(ctx)
            }
        }
        b'/' => parse_name(ctx).map(PdfObject::Name),
        b'[' => parse_array(ctx, resolver),
        other => Err(PdfError::with_message(
            PdfErrorKind::InvalidObject,
            format!("no object starts with 0x{:02x}", other),
        )),
    }
}

/// Every scalar must be terminated by whitespace, a delimiter, or EOF.
fn require_terminator(ctx: &Ctx) -> PdfResult<()> {
    ctx.require_byte_type(true, is_pdf_non_regular)
        .ctx("scalar object must end at whitespace, delimiter, or EOF")
}

// ── Keywords ──────────────────────────────────────────────────────────────────

fn parse_keyword(ctx: &mut Ctx) -> PdfResult<PdfObject> {
    let object = if ctx.expect("true").is_ok() {
        PdfObject::Boolean(true)
    } else if ctx.expect("false").is_ok() {
        PdfObject::Boolean(false)
    } else if ctx.expect("null").is_ok() {
        PdfObject::Null
    } else {
        return Err(PdfError::new(PdfErrorKind::InvalidObject));
    };
    require_terminator(ctx)?;
    Ok(object)
}

// ── Numbers ───────────────────────────────────────────────────────────────────

/// Parse a signed integer or real: `[+-]?(\d+|\d+\.\d*|\.\d+)`.
pub fn parse_number(ctx: &mut Ctx) -> PdfResult<PdfObject> {
    let start = ctx.offset();
    let result = parse_number_inner(ctx);
    if result.is_err() {
        let _ = ctx.seek(start);
    }
    result
}

fn parse_number_inner(ctx: &mut Ctx) -> PdfResult<PdfObject> {
    let negative = match ctx.peek()? {
        b'-' => {
            ctx.shift(1)?;
            true
        }
        b'+' => {
            ctx.shift(1)?;
            false
        }
        _ => false,
    };

    let mut int_digits = 0u32;
    let mut int_value: i64 = 0;
    let mut int_real: f64 = 0.0;
    while let Ok(byte) = ctx.peek() {
        if !byte.is_ascii_digit() {
            break;
        }
        let digit = (byte - b'0') as i64;
        int_real = int_real * 10.0 + digit as f64;
        int_value = int_value * 10 + digit;
        if int_value > (i32::MAX as i64) + 1 {
            // Clamp so the integer accumulator cannot overflow i64; the
            // limit check below still sees an out-of-range magnitude.
            int_value = (i32::MAX as i64) + 2;
        }
        int_digits += 1;
        ctx.shift(1)?;
    }

    let mut is_real = false;
    let mut frac_digits = 0u32;
    let mut frac_value: f64 = 0.0;
    let mut frac_scale: f64 = 1.0;
    if ctx.peek() == Ok(b'.') {
        is_real = true;
        ctx.shift(1)?;
        while let Ok(byte) = ctx.peek() {
            if !byte.is_ascii_digit() {
                break;
            }
            frac_scale /= 10.0;
            frac_value += (byte - b'0') as f64 * frac_scale;
            frac_digits += 1;
            ctx.shift(1)?;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidNumber,
            "number has no digits",
        ));
    }
    require_terminator(ctx)?;

    if is_real {
        let magnitude = int_real + frac_value;
        if magnitude > REAL_LIMIT {
            return Err(PdfError::new(PdfErrorKind::NumberLimit));
        }
        Ok(PdfObject::Real(if negative { -magnitude } else { magnitude }))
    } else {
        let signed = if negative { -int_value } else { int_value };
        if signed < i32::MIN as i64 || signed > i32::MAX as i64 {
            return Err(PdfError::new(PdfErrorKind::NumberLimit));
        }
        Ok(PdfObject::Integer(signed as i32))
    }
}

// ── Indirect objects and references ───────────────────────────────────────────

fn parse_indirect(ctx: &mut Ctx, resolver: &mut OptResolver<'_>) -> PdfResult<PdfObject> {
    let (id, id_digits) = ctx.parse_int(None)?;
    if id_digits == 0 || id > u32::MAX as u64 {
        return Err(PdfError::new(PdfErrorKind::InvalidObject));
    }
    ctx.require_byte_type(false, is_pdf_whitespace)?;
    ctx.consume_whitespace();

    let (gen, gen_digits) = ctx.parse_int(None)?;
    if gen_digits == 0 || gen > u16::MAX as u64 {
        return Err(PdfError::new(PdfErrorKind::InvalidObject));
    }
    ctx.require_byte_type(false, is_pdf_whitespace)?;
    ctx.consume_whitespace();

    let obj_id = ObjId(id as u32, gen as u16);

    if ctx.peek()? == b'R' {
        ctx.shift(1)?;
        require_terminator(ctx)?;
        return Ok(PdfObject::IndirectRef(obj_id));
    }

    ctx.expect("obj")?;
    require_terminator(ctx)?;

    let inner = parse_object(ctx, resolver, true).ctx("indirect object body")?;

    ctx.consume_whitespace();
    ctx.expect("endobj")?;
    require_terminator(ctx)?;

    Ok(PdfObject::IndirectObject {
        id: obj_id,
        inner: Box::new(inner),
    })
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn parse_literal_string(ctx: &mut Ctx) -> PdfResult<PdfObject> {
    ctx.expect("(")?;

    let mut out = Vec::new();
    let mut depth = 1u32;

    loop {
        let byte = ctx
            .peek_and_advance()
            .map_err(|e| e.push_ctx("unterminated literal string"))?;
        match byte {
            b'(' => {
                depth += 1;
                out.push(byte);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                out.push(byte);
            }
            b'\\' => {
                let escaped = ctx.peek_and_advance()?;
                match escaped {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'\\' => out.push(b'\\'),
                    b'0'..=b'7' => {
                        return Err(PdfError::with_message(
                            PdfErrorKind::Unimplemented,
                            "octal escapes in literal strings",
                        ))
                    }
                    b'\r' | b'\n' => {
                        return Err(PdfError::with_message(
                            PdfErrorKind::Unimplemented,
                            "split-line escapes in literal strings",
                        ))
                    }
                    other => out.push(other),
                }
            }
            _ => out.push(byte),
        }
    }

    Ok(PdfObject::String(out))
}

fn parse_hex_string(ctx: &mut Ctx) -> PdfResult<PdfObject> {
    ctx.expect("<")?;

    let mut out = Vec::new();
    let mut pending: Option<u8> = None;

    loop {
        let byte = ctx
            .peek_and_advance()
            .map_err(|e| e.push_ctx("unterminated hex string"))?;
        if byte == b'>' {
            break;
        }
        if is_pdf_whitespace(byte) {
            continue;
        }
        let value = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            other => {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidObject,
                    format!("0x{:02x} in hex string", other),
                ))
            }
        };
        match pending.take() {
            Some(high) => out.push((high << 4) | value),
            None => pending = Some(value),
        }
    }

    // An odd final digit behaves as if followed by zero.
    if let Some(high) = pending {
        out.push(high << 4);
    }

    Ok(PdfObject::String(out))
}

// ── Names ─────────────────────────────────────────────────────────────────────

fn parse_name(ctx: &mut Ctx) -> PdfResult<String> {
    ctx.expect("/")?;
    let start = ctx.offset();
    ctx.consume_regular();
    let raw = &ctx.buffer()[start..ctx.offset()];
    decode_name_escapes(raw)
}

// ── Containers ────────────────────────────────────────────────────────────────

fn parse_array(ctx: &mut Ctx, resolver: &mut OptResolver<'_>) -> PdfResult<PdfObject> {
    ctx.expect("[")?;

    let mut items = Vec::new();
    loop {
        ctx.consume_whitespace();
        if ctx.peek()? == b']' {
            ctx.shift(1)?;
            break;
        }
        items.push(parse_object(ctx, resolver, false).ctx("array element")?);
    }

    Ok(PdfObject::Array(items))
}

fn parse_dict_or_stream(
    ctx: &mut Ctx,
    resolver: &mut OptResolver<'_>,
    in_indirect_obj: bool,
) -> PdfResult<PdfObject> {
    ctx.expect("<<")?;

    let mut dict = Dict::new();
    loop {
        ctx.consume_whitespace();
        if ctx.expect(">>").is_ok() {
            break;
        }
        let key = parse_name(ctx).ctx("dictionary key")?;
        let value = parse_object(ctx, resolver, false)
            .with_ctx(|| format!("value for /{}", key))?;
        dict.push(key, value);
    }

    if in_indirect_obj {
        let saved = ctx.offset();
        match parse_stream_payload(ctx, resolver, &dict) {
            Ok(Some(stream)) => return Ok(PdfObject::Stream(stream)),
            Ok(None) => {
                ctx.seek(saved)?;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(PdfObject::Dictionary(dict))
}

// ── Streams ───────────────────────────────────────────────────────────────────

fn deserialize_stream_dict(
    dict: &Dict,
    resolver: &mut OptResolver<'_>,
) -> PdfResult<StreamDict> {
    let object = PdfObject::Dictionary(dict.clone());
    let mut fields = DictReader::new(&object, resolver, true, "StreamDict")?;

    let length: i32 = fields.required("Length")?;
    let filter_names: Option<Vec<String>> = fields.optional_as_array("Filter")?;
    let length1 = fields.optional("Length1")?;
    let length2 = fields.optional("Length2")?;
    let length3 = fields.optional("Length3")?;
    let subtype = fields.optional("Subtype")?;
    fields.ignored("Metadata");
    fields.unimplemented("DecodeParms")?;
    fields.unimplemented("F")?;
    fields.unimplemented("FFilter")?;
    fields.unimplemented("FDecodeParms")?;
    fields.unimplemented("DL")?;
    fields.finish()?;

    let mut filters = Vec::new();
    for name in filter_names.unwrap_or_default() {
        filters.push(StreamFilter::from_name(&name)?);
    }

    Ok(StreamDict {
        length,
        filters,
        length1,
        length2,
        length3,
        subtype,
    })
}

/// Try to read a stream payload following a dictionary. Returns `Ok(None)`
/// when the next token is not `stream` (the dict stands alone); a malformed
/// payload after `stream` is a hard error.
fn parse_stream_payload(
    ctx: &mut Ctx,
    resolver: &mut OptResolver<'_>,
    dict: &Dict,
) -> PdfResult<Option<Stream>> {
    ctx.consume_whitespace();
    if ctx.expect("stream").is_err() {
        return Ok(None);
    }

    // The keyword must be followed by LF or CR-LF (never a bare CR).
    match ctx.peek_and_advance()? {
        b'\n' => {}
        b'\r' => {
            if ctx.peek_and_advance()? != b'\n' {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidObject,
                    "bare CR after `stream` keyword",
                ));
            }
        }
        _ => {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidObject,
                "missing newline after `stream` keyword",
            ))
        }
    }

    let stream_dict = deserialize_stream_dict(dict, resolver).ctx("stream dictionary")?;
    if stream_dict.length < 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::StreamInvalidLength,
            format!("/Length {}", stream_dict.length),
        ));
    }

    let start = ctx.offset();
    let end = start + stream_dict.length as usize;
    if end > ctx.len() {
        return Err(PdfError::with_message(
            PdfErrorKind::StreamInvalidLength,
            "stream data extends past end of buffer",
        ));
    }
    let raw = &ctx.buffer()[start..end];
    ctx.seek(end)?;
    trace!("stream payload {} raw bytes at {}", raw.len(), start);

    // Optional single EOL, then the closing keyword.
    if ctx.peek() == Ok(b'\r') {
        ctx.shift(1)?;
        if ctx.peek() == Ok(b'\n') {
            ctx.shift(1)?;
        }
    } else if ctx.peek() == Ok(b'\n') {
        ctx.shift(1)?;
    }
    ctx.expect("endstream")
        .map_err(|e| e.push_ctx("`endstream` must follow the stream data"))?;

    let data = apply_filter_chain(raw, &stream_dict.filters).ctx("stream filter chain")?;
    let decoded_len = data.len();

    Ok(Some(Stream {
        dict: stream_dict,
        raw_dict: dict.clone(),
        data,
        decoded_len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> PdfResult<PdfObject> {
        let mut ctx = Ctx::new(input);
        parse_object(&mut ctx, &mut OptResolver::none(true), false)
    }

    fn parse_in_obj(input: &[u8]) -> PdfResult<PdfObject> {
        let mut ctx = Ctx::new(input);
        parse_object(&mut ctx, &mut OptResolver::none(true), true)
    }

    #[test]
    fn keywords() {
        assert!(matches!(parse(b"true "), Ok(PdfObject::Boolean(true))));
        assert!(matches!(parse(b"false]"), Ok(PdfObject::Boolean(false))));
        assert!(matches!(parse(b"null"), Ok(PdfObject::Null)));
        assert!(parse(b"truest").is_err());
    }

    #[test]
    fn integers_and_reals() {
        assert!(matches!(parse(b"123"), Ok(PdfObject::Integer(123))));
        assert!(matches!(parse(b"-98"), Ok(PdfObject::Integer(-98))));
        assert!(matches!(parse(b"+17"), Ok(PdfObject::Integer(17))));
        match parse(b"34.5").unwrap() {
            PdfObject::Real(v) => assert!((v - 34.5).abs() < 1e-12),
            other => panic!("expected real, found {:?}", other),
        }
        match parse(b"-.002").unwrap() {
            PdfObject::Real(v) => assert!((v + 0.002).abs() < 1e-12),
            other => panic!("expected real, found {:?}", other),
        }
        match parse(b"4.").unwrap() {
            PdfObject::Real(v) => assert_eq!(v, 4.0),
            other => panic!("expected real, found {:?}", other),
        }
    }

    #[test]
    fn number_needs_a_digit() {
        assert!(parse(b".").is_err());
        assert!(parse(b"-").is_err());
        assert!(parse(b"+.").is_err());
    }

    #[test]
    fn integer_limits() {
        assert!(matches!(parse(b"2147483647"), Ok(PdfObject::Integer(i32::MAX))));
        assert!(matches!(parse(b"-2147483648"), Ok(PdfObject::Integer(i32::MIN))));
        assert_eq!(
            parse(b"2147483648").unwrap_err().kind(),
            PdfErrorKind::NumberLimit
        );
        assert_eq!(
            parse(b"-2147483649").unwrap_err().kind(),
            PdfErrorKind::NumberLimit
        );
    }

    #[test]
    fn parse_failure_restores_offset() {
        let mut ctx = Ctx::new(b"}oops");
        let before = ctx.offset();
        assert!(parse_object(&mut ctx, &mut OptResolver::none(true), false).is_err());
        assert_eq!(ctx.offset(), before);

        let mut ctx = Ctx::new(b"2147483648 ");
        assert!(parse_object(&mut ctx, &mut OptResolver::none(true), false).is_err());
        assert_eq!(ctx.offset(), 0);
    }

    #[test]
    fn literal_strings() {
        match parse(b"(Hello (nested) world)").unwrap() {
            PdfObject::String(s) => assert_eq!(s, b"Hello (nested) world"),
            other => panic!("expected string, found {:?}", other),
        }
        match parse(br"(a\(b\)c\\d\n)").unwrap() {
            PdfObject::String(s) => assert_eq!(s, b"a(b)c\\d\n"),
            other => panic!("expected string, found {:?}", other),
        }
        assert!(parse(b"(unbalanced").is_err());
        assert_eq!(
            parse(br"(\101)").unwrap_err().kind(),
            PdfErrorKind::Unimplemented
        );
    }

    #[test]
    fn hex_strings() {
        match parse(b"<48 65 6C 6C 6F>").unwrap() {
            PdfObject::String(s) => assert_eq!(s, b"Hello"),
            other => panic!("expected string, found {:?}", other),
        }
        match parse(b"<901FA>").unwrap() {
            PdfObject::String(s) => assert_eq!(s, vec![0x90, 0x1f, 0xa0]),
            other => panic!("expected string, found {:?}", other),
        }
    }

    #[test]
    fn names_decode_escapes() {
        match parse(b"/Adobe#20Green ").unwrap() {
            PdfObject::Name(n) => assert_eq!(n, "Adobe Green"),
            other => panic!("expected name, found {:?}", other),
        }
    }

    #[test]
    fn arrays_and_dicts() {
        match parse(b"[1 2.5 /X (s) [3]]").unwrap() {
            PdfObject::Array(items) => assert_eq!(items.len(), 5),
            other => panic!("expected array, found {:?}", other),
        }
        match parse(b"<< /A 1 /B [1 2 3] >>").unwrap() {
            PdfObject::Dictionary(dict) => {
                assert_eq!(dict.len(), 2);
                assert!(matches!(dict.get("A"), Some(PdfObject::Integer(1))));
            }
            other => panic!("expected dict, found {:?}", other),
        }
    }

    #[test]
    fn indirect_reference_and_object() {
        match parse(b"12 0 R ").unwrap() {
            PdfObject::IndirectRef(id) => assert_eq!(id, ObjId(12, 0)),
            other => panic!("expected ref, found {:?}", other),
        }
        match parse(b"7 1 obj\n42\nendobj").unwrap() {
            PdfObject::IndirectObject { id, inner } => {
                assert_eq!(id, ObjId(7, 1));
                assert!(matches!(*inner, PdfObject::Integer(42)));
            }
            other => panic!("expected indirect object, found {:?}", other),
        }
    }

    #[test]
    fn digit_run_falls_back_to_number() {
        // Two integers, not an indirect reference.
        match parse(b"12 34 nope").unwrap() {
            PdfObject::Integer(12) => {}
            other => panic!("expected 12, found {:?}", other),
        }
    }

    #[test]
    fn stream_only_inside_indirect_object() {
        let bytes = b"<< /Length 5 >>\nstream\nhello\nendstream";
        match parse_in_obj(bytes).unwrap() {
            PdfObject::Stream(stream) => {
                assert_eq!(stream.data, b"hello");
                assert_eq!(stream.decoded_len, 5);
            }
            other => panic!("expected stream, found {:?}", other),
        }
        // Outside an indirect object the dict stands alone.
        match parse(bytes).unwrap() {
            PdfObject::Dictionary(_) => {}
            other => panic!("expected dict, found {:?}", other),
        }
    }

    #[test]
    fn stream_length_must_cover_data() {
        let bytes = b"<< /Length 500 >>\nstream\nhello\nendstream";
        assert_eq!(
            parse_in_obj(bytes).unwrap_err().kind(),
            PdfErrorKind::StreamInvalidLength
        );
    }

    #[test]
    fn stream_unimplemented_keys_are_fatal() {
        let bytes = b"<< /Length 5 /DecodeParms null >>\nstream\nhello\nendstream";
        assert_eq!(
            parse_in_obj(bytes).unwrap_err().kind(),
            PdfErrorKind::Unimplemented
        );
    }
}
