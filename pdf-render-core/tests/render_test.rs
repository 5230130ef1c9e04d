mod common;

use pdf_render_core::{render_page, PageIter, PdfReader, RenderOptions, Rgba};

fn document_with_content(content: &[u8], media_box: &str) -> Vec<u8> {
    common::build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox {} >>",
            media_box
        )
        .into_bytes(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
        common::stream_object("", content),
    ])
}

fn render_first_page(bytes: Vec<u8>, scale: f64) -> pdf_render_core::Canvas {
    let mut reader = PdfReader::from_bytes(bytes).unwrap();
    let catalog = reader.catalog().unwrap();
    let root = catalog.pages().unwrap().clone();
    let mut iter = PageIter::new(&mut reader, &root).unwrap();
    let page = iter.next_page(&mut reader).unwrap().unwrap();

    let options = RenderOptions {
        scale,
        ..RenderOptions::default()
    };
    render_page(&mut reader, &page, &options).unwrap()
}

#[test]
fn renders_filled_rectangle() {
    let canvas = render_first_page(
        document_with_content(b"0 0 0 rg 5 5 10 10 re f", "[0 0 20 20]"),
        1.0,
    );
    assert_eq!(canvas.width(), 20);
    assert_eq!(canvas.height(), 20);

    // User space y is flipped into image rows.
    assert_eq!(canvas.get_rgba(10, 10), Rgba::BLACK);
    assert_eq!(canvas.get_rgba(1, 1), Rgba::WHITE);
    assert_eq!(canvas.get_rgba(18, 18), Rgba::WHITE);
}

#[test]
fn renders_stroked_line() {
    let canvas = render_first_page(
        document_with_content(b"4 w 0 0 1 RG 2 10 m 18 10 l S", "[0 0 20 20]"),
        1.0,
    );
    let blue = Rgba::new(0, 0, 255, 255);
    assert_eq!(canvas.get_rgba(10, 10), blue);
    assert_eq!(canvas.get_rgba(10, 2), Rgba::WHITE);
}

#[test]
fn scale_multiplies_device_resolution() {
    let canvas = render_first_page(
        document_with_content(b"0 g 0 0 10 10 re f", "[0 0 20 20]"),
        2.0,
    );
    assert_eq!(canvas.width(), 40);
    assert_eq!(canvas.height(), 40);
    // The bottom-left user-space square covers the bottom-left image
    // quadrant.
    assert_eq!(canvas.get_rgba(5, 35), Rgba::BLACK);
    assert_eq!(canvas.get_rgba(5, 5), Rgba::WHITE);
}

#[test]
fn content_stream_arrays_concatenate() {
    let bytes = common::build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 10 10] >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>".to_vec(),
        common::stream_object("", b"0 g 0 0 4 4 re"),
        common::stream_object("", b"f"),
    ]);
    let canvas = render_first_page(bytes, 1.0);
    assert_eq!(canvas.get_rgba(1, 8), Rgba::BLACK);
}

#[test]
fn bmp_output_is_well_formed() {
    let canvas = render_first_page(
        document_with_content(b"0 g 0 0 20 20 re f", "[0 0 20 20]"),
        1.0,
    );
    let bytes = canvas.bmp_bytes();
    assert_eq!(&bytes[0..2], b"BM");
    let file_size = u32::from_le_bytes(bytes[2..6].try_into().unwrap()) as usize;
    assert_eq!(file_size, bytes.len());
    assert_eq!(file_size, 54 + 20 * 20 * 4);
    let width = u32::from_le_bytes(bytes[18..22].try_into().unwrap());
    let height = u32::from_le_bytes(bytes[22..26].try_into().unwrap());
    assert_eq!((width, height), (20, 20));
    // Every pixel painted black, stored as B-G-R-A.
    assert_eq!(&bytes[54..58], &[0, 0, 0, 255]);
}

#[test]
fn rotated_pages_swap_dimensions() {
    let bytes = common::build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 10 20] /Rotate 90 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
        common::stream_object("", b"0 g 0 0 2 2 re f"),
    ]);
    let canvas = render_first_page(bytes, 1.0);
    assert_eq!((canvas.width(), canvas.height()), (20, 10));
}

#[test]
fn deflated_content_streams_decode() {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(b"0 0 0 rg 2 2 6 6 re f").unwrap();
    let compressed = encoder.finish().unwrap();

    let bytes = common::build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 10 10] >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
        common::stream_object("/Filter /FlateDecode", &compressed),
    ]);
    let canvas = render_first_page(bytes, 1.0);
    assert_eq!(canvas.get_rgba(5, 5), Rgba::BLACK);
}
