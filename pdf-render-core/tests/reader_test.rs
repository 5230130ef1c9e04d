mod common;

use pdf_render_core::{ObjId, PdfErrorKind, PdfObject, PdfReader};

/// The minimal document exercised throughout: a bare catalog holding two
/// unmodeled entries.
fn minimal_pdf() -> Vec<u8> {
    b"%PDF-1.5\n\
      1 0 obj\n\
      << /A 1 /B [1 2 3] >>\n\
      endobj\n\
      xref\n\
      0 2\n\
      0000000000 65535 f \n\
      0000000009 00000 n \n\
      trailer\n\
      << /Size 2 /Root 1 0 R >>\n\
      startxref\n\
      46\n\
      %%EOF\n"
        .to_vec()
}

#[test]
fn parses_version_and_startxref() {
    let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    assert_eq!(reader.version(), 5);
    assert_eq!(reader.startxref(), 46);
}

#[test]
fn trailer_names_the_catalog() {
    let mut reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    let trailer = reader.trailer().unwrap();
    assert_eq!(trailer.size, 2);
    assert_eq!(trailer.root.id(), ObjId(1, 0));
}

#[test]
fn catalog_exposes_raw_entries() {
    let mut reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    let catalog = reader.catalog().unwrap();
    assert!(matches!(catalog.dict.get("A"), Some(PdfObject::Integer(1))));
    match catalog.dict.get("B") {
        Some(PdfObject::Array(items)) => {
            assert_eq!(items.len(), 3);
            assert!(matches!(items[0], PdfObject::Integer(1)));
            assert!(matches!(items[2], PdfObject::Integer(3)));
        }
        other => panic!("expected array, found {:?}", other),
    }
}

#[test]
fn resolution_is_cached() {
    let mut reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    let first = reader.resolve_ref(ObjId(1, 0)).unwrap();
    let second = reader.resolve_ref(ObjId(1, 0)).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));
}

#[test]
fn generation_mismatch_is_rejected() {
    let mut reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    let err = reader.resolve_ref(ObjId(1, 3)).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::XrefGenerationMismatch);
}

#[test]
fn free_objects_do_not_resolve() {
    let mut reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
    let err = reader.resolve_ref(ObjId(0, 65535)).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::InvalidXrefReference);
}

#[test]
fn garbage_input_is_not_a_pdf() {
    let err = PdfReader::from_bytes(b"this is not a pdf at all".to_vec()).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::CtxExpect);
}

#[test]
fn empty_input_is_not_a_pdf() {
    assert!(PdfReader::from_bytes(Vec::new()).is_err());
}

#[test]
fn truncated_pdf_is_rejected() {
    let err = PdfReader::from_bytes(b"%PDF-1.7\n".to_vec()).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::CtxScanLimit);
}

#[test]
fn unsupported_version_is_rejected() {
    let err = PdfReader::from_bytes(b"%PDF-1.9\nrest".to_vec()).unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::InvalidVersion);
}

#[test]
fn synthesized_documents_parse() {
    let bytes = common::build_pdf(&[b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()]);
    let mut reader = PdfReader::from_bytes(bytes).unwrap();
    let catalog = reader.catalog().unwrap();
    assert_eq!(catalog.pages().unwrap().id(), ObjId(2, 0));
}

#[test]
fn encrypted_documents_are_rejected() {
    let mut bytes = common::build_pdf(&[b"<< >>".to_vec()]);
    // Splice an /Encrypt entry into the trailer dictionary.
    let trailer_pos = bytes.windows(7).rposition(|w| w == b"trailer").unwrap();
    let insert_at = trailer_pos
        + bytes[trailer_pos..]
            .windows(2)
            .position(|w| w == b">>")
            .unwrap();
    bytes.splice(insert_at..insert_at, b"/Encrypt 9 0 R ".iter().copied());
    // The xref offset is unchanged: the splice happened after the table.

    let mut reader = PdfReader::from_bytes(bytes).unwrap();
    let err = reader.trailer().unwrap_err();
    assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
}
