mod common;

use pdf_render_core::deserialize::FromObject;
use pdf_render_core::{Function, Number, ObjId, OptResolver, PdfReader};

fn function_pdf(body: &str, dict: &str) -> Vec<u8> {
    common::build_pdf(&[
        b"<< /Type /Catalog >>".to_vec(),
        common::stream_object(dict, body.as_bytes()),
    ])
}

fn load_function(bytes: Vec<u8>) -> Function {
    let mut reader = PdfReader::from_bytes(bytes).unwrap();
    let object = reader.resolve_ref(ObjId(2, 0)).unwrap();
    let mut resolver = OptResolver::some(&mut reader);
    let unwrapped = resolver.resolve_object(&object).unwrap();
    Function::from_object(&unwrapped, &mut resolver).unwrap()
}

#[test]
fn calculator_function_from_document() {
    let bytes = function_pdf(
        "{ 360 mul sin 2 div exch 360 mul sin 2 div add }",
        "/FunctionType 4 /Domain [-1.0 1.0 -1.0 1.0] /Range [-1.0 1.0]",
    );
    let function = load_function(bytes);
    assert_eq!(function.function_type, 4);

    let outputs = function
        .eval(&[Number::Real(0.25), Number::Real(0.5)])
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert!((outputs[0].as_real() - 0.5).abs() < 1e-9);
}

#[test]
fn calculator_conditionals() {
    let bytes = function_pdf(
        "{ 0.5 lt { 0 } { 1 } ifelse }",
        "/FunctionType 4 /Domain [0.0 1.0] /Range [0 1]",
    );
    let function = load_function(bytes);

    let low = function.eval(&[Number::Real(0.25)]).unwrap();
    assert_eq!(low[0].as_real(), 0.0);
    let high = function.eval(&[Number::Real(0.75)]).unwrap();
    assert_eq!(high[0].as_real(), 1.0);
}

#[test]
fn evaluation_is_repeatable() {
    // The compiled program is reusable: repeated calls see fresh stacks.
    let bytes = function_pdf(
        "{ dup mul }",
        "/FunctionType 4 /Domain [0.0 10.0] /Range [0.0 100.0]",
    );
    let function = load_function(bytes);
    for value in [0.0, 1.5, 3.0, 9.0] {
        let outputs = function.eval(&[Number::Real(value)]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!((outputs[0].as_real() - value * value).abs() < 1e-12);
    }
}

#[test]
fn range_clipping_applies_per_component() {
    let bytes = function_pdf(
        "{ dup 2 mul exch 3 mul }",
        "/FunctionType 4 /Domain [0.0 1.0] /Range [0.0 1.5 0.0 2.0]",
    );
    let function = load_function(bytes);
    let outputs = function.eval(&[Number::Real(1.0)]).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].as_real(), 1.5);
    assert_eq!(outputs[1].as_real(), 2.0);
}
