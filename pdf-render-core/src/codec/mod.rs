//! Stream filters: zlib/DEFLATE plus the ASCII transport encodings.

pub mod ascii;
pub mod bitstream;
pub mod deflate;
pub mod zlib;

use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};

/// A stream filter named by `/Filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFilter {
    FlateDecode,
    AsciiHexDecode,
    Ascii85Decode,
}

impl StreamFilter {
    pub fn from_name(name: &str) -> PdfResult<Self> {
        match name {
            "FlateDecode" => Ok(StreamFilter::FlateDecode),
            "ASCIIHexDecode" => Ok(StreamFilter::AsciiHexDecode),
            "ASCII85Decode" => Ok(StreamFilter::Ascii85Decode),
            other => Err(PdfError::with_message(
                PdfErrorKind::UnknownFilter,
                format!("/{}", other),
            )),
        }
    }

    pub fn decode(self, data: &[u8]) -> PdfResult<Vec<u8>> {
        match self {
            StreamFilter::FlateDecode => zlib::decode_zlib(data),
            StreamFilter::AsciiHexDecode => ascii::decode_ascii_hex(data),
            StreamFilter::Ascii85Decode => ascii::decode_ascii85(data),
        }
    }
}

/// Run raw stream bytes through a filter chain in order: the first filter
/// sees the on-wire bytes, the last produces the decoded payload.
pub fn apply_filter_chain(raw: &[u8], filters: &[StreamFilter]) -> PdfResult<Vec<u8>> {
    let mut data = raw.to_vec();
    for filter in filters {
        data = filter
            .decode(&data)
            .with_ctx(|| format!("applying {:?}", filter))?;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_filter_is_fatal() {
        let err = StreamFilter::from_name("LZWDecode").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::UnknownFilter);
    }

    #[test]
    fn chain_applies_in_order() {
        // ASCIIHex wrapping of a stored-block zlib stream.
        let payload = b"abc";
        let mut inner = vec![0x78u8, 0x01, 0x01];
        inner.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        inner.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
        inner.extend_from_slice(payload);
        inner.extend_from_slice(&zlib::adler32(payload).to_be_bytes());

        let mut hex = String::new();
        for byte in &inner {
            hex.push_str(&format!("{:02X}", byte));
        }
        hex.push('>');

        let decoded = apply_filter_chain(
            hex.as_bytes(),
            &[StreamFilter::AsciiHexDecode, StreamFilter::FlateDecode],
        )
        .unwrap();
        assert_eq!(decoded, payload);
    }
}
