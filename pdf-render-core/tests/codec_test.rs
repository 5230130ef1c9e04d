use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use pdf_render_core::codec::zlib::{adler32, decode_zlib};
use pdf_render_core::codec::{apply_filter_chain, StreamFilter};
use pdf_render_core::PdfErrorKind;

fn zlib_encode(data: &[u8], level: Compression) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn round_trips_canonical_zlib_streams() {
    let samples: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"Hello, world!".to_vec(),
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec(),
        (0u32..2000).flat_map(|v| v.to_le_bytes()).collect(),
        // Repetitive enough to exercise long back-references.
        b"abcdefgh".repeat(1000),
    ];

    for sample in &samples {
        for level in [Compression::none(), Compression::fast(), Compression::best()] {
            let encoded = zlib_encode(sample, level);
            let decoded = decode_zlib(&encoded).unwrap();
            assert_eq!(&decoded, sample);
            assert_eq!(adler32(&decoded), adler32(sample));
        }
    }
}

#[test]
fn pseudo_random_payloads_round_trip() {
    // Incompressible data forces stored/fixed blocks depending on level.
    let mut state = 0x12345678u32;
    let mut data = Vec::with_capacity(65536);
    for _ in 0..65536 {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        data.push((state >> 24) as u8);
    }

    for level in [Compression::none(), Compression::best()] {
        let encoded = zlib_encode(&data, level);
        assert_eq!(decode_zlib(&encoded).unwrap(), data);
    }
}

#[test]
fn corrupt_checksum_is_detected() {
    let encoded = zlib_encode(b"Hello, world!", Compression::best());

    // Flip one byte of the four-byte Adler-32 trailer.
    for trailer_byte in 1..=4 {
        let mut corrupted = encoded.clone();
        let idx = corrupted.len() - trailer_byte;
        corrupted[idx] ^= 0x5a;
        let err = decode_zlib(&corrupted).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::ZlibInvalidChecksum);
    }
}

#[test]
fn truncated_stream_is_detected() {
    let encoded = zlib_encode(b"Hello, world!", Compression::best());
    let err = decode_zlib(&encoded[..encoded.len() / 2]).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::BitstreamEod);
}

#[test]
fn filter_chain_unwraps_hex_then_flate() {
    let payload = b"chained filters";
    let inner = zlib_encode(payload, Compression::best());
    let mut hex: Vec<u8> = inner
        .iter()
        .flat_map(|byte| format!("{:02X}", byte).into_bytes())
        .collect();
    hex.push(b'>');

    let decoded = apply_filter_chain(
        &hex,
        &[StreamFilter::AsciiHexDecode, StreamFilter::FlateDecode],
    )
    .unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn hex_string_round_trip_is_identity() {
    // Decode-then-encode (uppercase) is identity modulo whitespace.
    let original = b"901FA3007C";
    let decoded = pdf_render_core::codec::ascii::decode_ascii_hex(original).unwrap();
    let encoded: String = decoded.iter().map(|b| format!("{:02X}", b)).collect();
    assert_eq!(encoded.as_bytes(), original);
}
