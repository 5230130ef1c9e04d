use log::trace;

use crate::codec::bitstream::BitStream;
use crate::codec::deflate::decode_deflate;
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};

const ADLER_MOD: u32 = 65521;

/// Adler-32 checksum (RFC 1950 section 8.2).
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in data {
        a = (a + byte as u32) % ADLER_MOD;
        b = (b + a) % ADLER_MOD;
    }
    (b << 16) | a
}

/// Decode a zlib stream (RFC 1950): validate the CMF/FLG header, inflate
/// the DEFLATE payload, and verify the trailing Adler-32.
pub fn decode_zlib(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut bits = BitStream::new(data);

    // CMF: compression method in the low nibble, window info in the high.
    let method = bits.read_bits(4)?;
    let info = bits.read_bits(4)?;
    match method {
        8 => {}
        15 => return Err(PdfError::new(PdfErrorKind::ZlibReservedCm)),
        _ => {
            return Err(PdfError::with_message(
                PdfErrorKind::ZlibInvalidCm,
                format!("compression method {}", method),
            ))
        }
    }

    // FLG: check bits, preset-dictionary flag, compression level.
    let fcheck = bits.read_bits(5)?;
    let fdict = bits.next_bit()?;
    let flevel = bits.read_bits(2)?;

    let check_val = (info << 12) | (method << 8) | (flevel << 6) | (fdict << 5) | fcheck;
    if check_val % 31 != 0 {
        return Err(PdfError::new(PdfErrorKind::ZlibInvalidFcheck));
    }
    trace!("zlib header ok, window info {}", info);

    if fdict != 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::Unimplemented,
            "zlib preset dictionaries",
        ));
    }

    let decoded = decode_deflate(&mut bits).ctx("deflate payload")?;

    // Trailer: byte-aligned big-endian Adler-32 of the decoded bytes.
    bits.align_byte();
    let trailer = bits.take_bytes(4)?;
    let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = adler32(&decoded);
    if stored != computed {
        return Err(PdfError::with_message(
            PdfErrorKind::ZlibInvalidChecksum,
            format!("computed 0x{:08x}, stored 0x{:08x}", computed, stored),
        ));
    }

    Ok(decoded)
}
