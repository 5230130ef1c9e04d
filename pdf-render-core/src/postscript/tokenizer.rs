//! PostScript tokenizer: numbers (decimal, real, radix), strings
//! (literal, hex, base-85), names, and the structure tokens.

use crate::codec::ascii::decode_ascii85;
use crate::error::{PdfError, PdfErrorKind, PdfResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i32),
    Real(f64),
    /// Radix literal `base#digits`, reinterpreted as signed 32-bit.
    RadixNum(i32),
    LitString(Vec<u8>),
    HexString(Vec<u8>),
    Base85String(Vec<u8>),
    /// Bare word, executed when interpreted.
    ExeName(String),
    /// `/name`.
    LitName(String),
    /// `//name`, resolved immediately when interpreted.
    ImmName(String),
    StartArray,
    EndArray,
    StartProc,
    EndProc,
    StartDict,
    EndDict,
}

fn is_ps_whitespace(byte: u8) -> bool {
    matches!(byte, 0x00 | b'\t' | b'\n' | 0x0c | b'\r' | b' ')
}

fn is_ps_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_ps_regular(byte: u8) -> bool {
    !is_ps_whitespace(byte) && !is_ps_delimiter(byte)
}

pub struct Tokenizer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Tokenizer { data, offset: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        Some(byte)
    }

    fn consume_whitespace_and_comments(&mut self) {
        loop {
            while let Some(byte) = self.peek() {
                if !is_ps_whitespace(byte) {
                    break;
                }
                self.offset += 1;
            }
            if self.peek() == Some(b'%') {
                while let Some(byte) = self.bump() {
                    if byte == b'\n' || byte == b'\r' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    fn read_regular_run(&mut self) -> String {
        let start = self.offset;
        while let Some(byte) = self.peek() {
            if !is_ps_regular(byte) {
                break;
            }
            self.offset += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.offset]).into_owned()
    }

    /// The next token, or `None` at end of input.
    pub fn next_token(&mut self) -> PdfResult<Option<Token>> {
        self.consume_whitespace_and_comments();

        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let token = match first {
            b'(' => {
                self.offset += 1;
                Token::LitString(self.read_lit_string()?)
            }
            b'<' => {
                self.offset += 1;
                match self.peek() {
                    Some(b'<') => {
                        self.offset += 1;
                        Token::StartDict
                    }
                    Some(b'~') => {
                        self.offset += 1;
                        Token::Base85String(self.read_base85_string()?)
                    }
                    _ => Token::HexString(self.read_hex_string()?),
                }
            }
            b'>' => {
                self.offset += 1;
                if self.bump() != Some(b'>') {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptSyntax,
                        "expected `>`",
                    ));
                }
                Token::EndDict
            }
            b'/' => {
                self.offset += 1;
                if self.peek() == Some(b'/') {
                    self.offset += 1;
                    Token::ImmName(self.read_regular_run())
                } else {
                    Token::LitName(self.read_regular_run())
                }
            }
            b'[' => {
                self.offset += 1;
                Token::StartArray
            }
            b']' => {
                self.offset += 1;
                Token::EndArray
            }
            b'{' => {
                self.offset += 1;
                Token::StartProc
            }
            b'}' => {
                self.offset += 1;
                Token::EndProc
            }
            byte if is_ps_regular(byte) => {
                let word = self.read_regular_run();
                classify_word(word)?
            }
            byte => {
                return Err(PdfError::with_message(
                    PdfErrorKind::PostscriptSyntax,
                    format!("unexpected byte 0x{:02x}", byte),
                ))
            }
        };

        Ok(Some(token))
    }

    /// Balanced-paren literal string with escapes: the single-character
    /// set, one-to-three-digit octal codes, and elided line
    /// continuations. An unknown escaped character stands for itself.
    fn read_lit_string(&mut self) -> PdfResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut open = 1u32;

        loop {
            let Some(byte) = self.bump() else {
                return Err(PdfError::with_message(
                    PdfErrorKind::PostscriptUnmatched,
                    "unterminated literal string",
                ));
            };

            match byte {
                b'(' => {
                    open += 1;
                    out.push(byte);
                }
                b')' => {
                    open -= 1;
                    if open == 0 {
                        return Ok(out);
                    }
                    out.push(byte);
                }
                b'\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(PdfError::with_message(
                            PdfErrorKind::PostscriptUnmatched,
                            "escape at end of input",
                        ));
                    };
                    match escaped {
                        b'\n' => {}
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.offset += 1;
                            }
                        }
                        b'0'..=b'7' => {
                            let mut value: u16 = (escaped - b'0') as u16;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(digit @ b'0'..=b'7') => {
                                        value = (value << 3) | (digit - b'0') as u16;
                                        self.offset += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(value as u8);
                        }
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'\\' => out.push(b'\\'),
                        b'(' => out.push(b'('),
                        b')' => out.push(b')'),
                        other => out.push(other),
                    }
                }
                _ => out.push(byte),
            }
        }
    }

    /// Whitespace-tolerant hex pairs up to `>`; an odd digit pads with 0.
    fn read_hex_string(&mut self) -> PdfResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            let Some(byte) = self.bump() else {
                return Err(PdfError::with_message(
                    PdfErrorKind::PostscriptUnmatched,
                    "unterminated hex string",
                ));
            };
            if byte == b'>' {
                break;
            }
            if is_ps_whitespace(byte) {
                continue;
            }
            let value = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                b'A'..=b'F' => byte - b'A' + 10,
                other => {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptSyntax,
                        format!("0x{:02x} in hex string", other),
                    ))
                }
            };
            match pending.take() {
                Some(high) => out.push((high << 4) | value),
                None => pending = Some(value),
            }
        }

        if let Some(high) = pending {
            out.push(high << 4);
        }
        Ok(out)
    }

    fn read_base85_string(&mut self) -> PdfResult<Vec<u8>> {
        let start = self.offset;
        loop {
            match self.bump() {
                Some(b'~') => {
                    if self.bump() != Some(b'>') {
                        return Err(PdfError::with_message(
                            PdfErrorKind::PostscriptSyntax,
                            "`~` not followed by `>`",
                        ));
                    }
                    break;
                }
                Some(_) => {}
                None => {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptUnmatched,
                        "unterminated base-85 string",
                    ))
                }
            }
        }
        // Hand the body (with its terminator restored) to the shared
        // base-85 decoder.
        let mut body = self.data[start..self.offset - 2].to_vec();
        body.extend_from_slice(b"~>");
        decode_ascii85(&body)
            .map_err(|e| e.push_ctx("base-85 postscript string"))
    }
}

/// Classify a regular-character run: decimal integer (overflow promotes
/// to real), real with optional exponent, radix number, or a bare
/// executable name.
fn classify_word(word: String) -> PdfResult<Token> {
    let bytes = word.as_bytes();

    let looks_numeric = bytes
        .first()
        .is_some_and(|&b| b.is_ascii_digit() || b == b'+' || b == b'-' || b == b'.');
    if !looks_numeric {
        return Ok(Token::ExeName(word));
    }

    if let Some(hash) = word.find('#') {
        if let Some(token) = parse_radix(&word[..hash], &word[hash + 1..])? {
            return Ok(token);
        }
        return Ok(Token::ExeName(word));
    }

    if is_decimal_integer(bytes) {
        // Magnitudes past 32 bits quietly become reals.
        return match word.parse::<i32>() {
            Ok(value) => Ok(Token::Integer(value)),
            Err(_) => Ok(Token::Real(word.parse::<f64>().unwrap_or(0.0))),
        };
    }

    if is_real_literal(bytes) {
        if let Ok(value) = word.parse::<f64>() {
            return Ok(Token::Real(value));
        }
    }

    Ok(Token::ExeName(word))
}

fn is_decimal_integer(bytes: &[u8]) -> bool {
    let digits = match bytes.first() {
        Some(b'+') | Some(b'-') => &bytes[1..],
        _ => bytes,
    };
    !digits.is_empty() && digits.iter().all(|b| b.is_ascii_digit())
}

fn is_real_literal(bytes: &[u8]) -> bool {
    let rest = match bytes.first() {
        Some(b'+') | Some(b'-') => &bytes[1..],
        _ => bytes,
    };

    // Mantissa: digits with at most one dot, at least one digit.
    let mantissa_end = rest
        .iter()
        .position(|&b| b == b'e' || b == b'E')
        .unwrap_or(rest.len());
    let mantissa = &rest[..mantissa_end];
    let mut digits = 0;
    let mut dots = 0;
    for &byte in mantissa {
        match byte {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }

    // A real must have a dot or an exponent; a plain digit run is an
    // integer.
    let has_exponent = mantissa_end < rest.len();
    if !has_exponent {
        return dots == 1;
    }

    let exponent = &rest[mantissa_end + 1..];
    let exp_digits = match exponent.first() {
        Some(b'+') | Some(b'-') => &exponent[1..],
        _ => exponent,
    };
    !exp_digits.is_empty() && exp_digits.iter().all(|b| b.is_ascii_digit())
}

/// `base#digits` with base 2..=36; the accumulated value keeps its low
/// 32 bits and is reinterpreted as signed.
fn parse_radix(base_str: &str, digits: &str) -> PdfResult<Option<Token>> {
    let Ok(base) = base_str.parse::<u32>() else {
        return Ok(None);
    };
    if !(2..=36).contains(&base) {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptInvalidRadix,
            format!("base {}", base),
        ));
    }
    if digits.is_empty() {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptInvalidRadix,
            "radix number has no digits",
        ));
    }

    let mut value: u64 = 0;
    for byte in digits.bytes() {
        let digit = match byte {
            b'0'..=b'9' => (byte - b'0') as u32,
            b'a'..=b'z' => (byte - b'a' + 10) as u32,
            b'A'..=b'Z' => (byte - b'A' + 10) as u32,
            _ => {
                return Err(PdfError::with_message(
                    PdfErrorKind::PostscriptInvalidRadix,
                    format!("digit 0x{:02x}", byte),
                ))
            }
        };
        if digit >= base {
            return Err(PdfError::with_message(
                PdfErrorKind::PostscriptInvalidRadix,
                format!("digit out of range for base {}", base),
            ));
        }
        value = value * base as u64 + digit as u64;
        if value > u32::MAX as u64 {
            return Err(PdfError::with_message(
                PdfErrorKind::PostscriptRangeCheck,
                "radix number exceeds 32 bits",
            ));
        }
    }

    Ok(Some(Token::RadixNum(value as u32 as i32)))
}
