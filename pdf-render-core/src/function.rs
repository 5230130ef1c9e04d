//! PDF function records. Type 2 (exponential) and type 3 (stitching)
//! evaluate directly; type 4 compiles its calculator program once and
//! runs it through the PostScript interpreter per call.

use log::debug;

use crate::deserialize::{DictReader, FromObject};
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{Number, PdfObject};
use crate::postscript::{Interpreter, PsObject, PsValue, Tokenizer};
use crate::reader::OptResolver;

#[derive(Debug, Clone)]
enum FunctionKind {
    Exponential {
        c0: Vec<f64>,
        c1: Vec<f64>,
        n: f64,
    },
    Stitching {
        functions: Vec<Function>,
        bounds: Vec<f64>,
        encode: Vec<f64>,
    },
    Calculator {
        program: PsObject,
    },
}

/// A function dictionary or stream: `FunctionType`, `Domain`, optional
/// `Range`, plus the type-specific fields.
#[derive(Debug, Clone)]
pub struct Function {
    pub function_type: i32,
    pub domain: Vec<Number>,
    pub range: Option<Vec<Number>>,
    kind: FunctionKind,
}

fn clip_number(value: Number, min: Number, max: Number) -> Number {
    if value.as_real() < min.as_real() {
        return min;
    }
    if value.as_real() > max.as_real() {
        return max;
    }
    value
}

fn pair(values: &[Number], idx: usize) -> PdfResult<(Number, Number)> {
    match (values.get(2 * idx), values.get(2 * idx + 1)) {
        (Some(&min), Some(&max)) => Ok((min, max)),
        _ => Err(PdfError::with_message(
            PdfErrorKind::ExcessOperand,
            format!("no interval {} in a {}-element array", idx, values.len()),
        )),
    }
}

impl FromObject for Function {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let resolved = resolver.resolve_object(object)?;
        if !matches!(
            resolved,
            PdfObject::Dictionary(_) | PdfObject::Stream(_)
        ) {
            return Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                "functions must be a stream or dict",
            ));
        }

        let mut fields = DictReader::new(&resolved, resolver, true, "Function")?;
        let function_type: i32 = fields.required("FunctionType")?;
        let domain: Vec<Number> = fields.required("Domain")?;
        let range: Option<Vec<Number>> = fields.optional("Range")?;
        fields.finish()?;
        debug!("function type {}", function_type);

        let kind = match function_type {
            2 => {
                let mut fields = DictReader::new(&resolved, resolver, true, "Type2 Function")?;
                let c0: Option<Vec<f64>> = fields.optional("C0")?;
                let c1: Option<Vec<f64>> = fields.optional("C1")?;
                let n: f64 = fields.required("N")?;
                fields.finish()?;

                let c0 = c0.unwrap_or_else(|| vec![0.0]);
                let c1 = c1.unwrap_or_else(|| vec![1.0]);
                if c0.len() != c1.len() {
                    return Err(PdfError::with_message(
                        PdfErrorKind::IncorrectType,
                        "C0 and C1 must have the same length",
                    ));
                }
                FunctionKind::Exponential { c0, c1, n }
            }
            3 => {
                let mut fields = DictReader::new(&resolved, resolver, true, "Type3 Function")?;
                let functions: Vec<Function> = fields.required_as_array("Functions")?;
                let bounds: Vec<f64> = fields.required("Bounds")?;
                let encode: Vec<f64> = fields.required("Encode")?;
                fields.finish()?;

                let k = functions.len();
                if k == 0 || bounds.len() != k - 1 || encode.len() != 2 * k {
                    return Err(PdfError::with_message(
                        PdfErrorKind::IncorrectType,
                        "inconsistent stitching function arrays",
                    ));
                }
                FunctionKind::Stitching {
                    functions,
                    bounds,
                    encode,
                }
            }
            4 => {
                let PdfObject::Stream(stream) = &resolved else {
                    return Err(PdfError::with_message(
                        PdfErrorKind::IncorrectType,
                        "type 4 function must be a stream",
                    ));
                };
                let program = compile_calculator(&stream.data)
                    .ctx("compiling calculator function")?;
                FunctionKind::Calculator { program }
            }
            0 => {
                return Err(PdfError::with_message(
                    PdfErrorKind::Unimplemented,
                    "sampled (type 0) functions",
                ))
            }
            other => {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidSubtype,
                    format!("FunctionType {}", other),
                ))
            }
        };

        Ok(Function {
            function_type,
            domain,
            range,
            kind,
        })
    }
}

/// Tokenize a calculator program and capture its body as one procedure.
fn compile_calculator(data: &[u8]) -> PdfResult<PsObject> {
    let mut interpreter = Interpreter::new();
    let mut tokenizer = Tokenizer::new(data);
    while let Some(token) = tokenizer.next_token()? {
        interpreter.interpret_token(token)?;
    }

    let program = interpreter.pop_operand().map_err(|_| {
        PdfError::with_message(PdfErrorKind::PostscriptSyntax, "program has no body")
    })?;
    if !program.is_procedure() || interpreter.operand_len() != 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptSyntax,
            "program is not a single procedure",
        ));
    }
    Ok(program)
}

impl Function {
    /// Evaluate the function: inputs clip to `Domain`, outputs clip to
    /// `Range` when present.
    pub fn eval(&self, inputs: &[Number]) -> PdfResult<Vec<Number>> {
        let mut clipped = Vec::with_capacity(inputs.len());
        for (idx, &input) in inputs.iter().enumerate() {
            let (min, max) = pair(&self.domain, idx)?;
            clipped.push(clip_number(input, min, max));
        }

        let outputs = match &self.kind {
            FunctionKind::Exponential { c0, c1, n } => {
                let x = single_input(&clipped)?;
                c0.iter()
                    .zip(c1)
                    .map(|(&a, &b)| Number::Real(a + x.powf(*n) * (b - a)))
                    .collect()
            }
            FunctionKind::Stitching {
                functions,
                bounds,
                encode,
            } => {
                let x = single_input(&clipped)?;
                let (d0, d1) = pair(&self.domain, 0)?;

                let k = bounds.partition_point(|&bound| bound <= x);
                let low = if k == 0 { d0.as_real() } else { bounds[k - 1] };
                let high = if k == bounds.len() {
                    d1.as_real()
                } else {
                    bounds[k]
                };

                let e0 = encode[2 * k];
                let e1 = encode[2 * k + 1];
                let encoded = if (high - low).abs() < f64::EPSILON {
                    e0
                } else {
                    e0 + (x - low) / (high - low) * (e1 - e0)
                };

                functions[k].eval(&[Number::Real(encoded)])?
            }
            FunctionKind::Calculator { program } => {
                let mut interpreter = Interpreter::new();
                for &input in &clipped {
                    match input {
                        Number::Integer(v) => interpreter.push_operand(PsObject::integer(v)),
                        Number::Real(v) => interpreter.push_operand(PsObject::real(v)),
                    }
                }
                interpreter.run_procedure(program)?;

                let mut outputs = Vec::with_capacity(interpreter.operand_len());
                let mut stack = Vec::with_capacity(interpreter.operand_len());
                while interpreter.operand_len() > 0 {
                    stack.push(interpreter.pop_operand()?);
                }
                stack.reverse();
                for object in stack {
                    match object.value {
                        PsValue::Integer(v) => outputs.push(Number::Integer(v)),
                        PsValue::Real(v) => outputs.push(Number::Real(v)),
                        other => {
                            return Err(PdfError::with_message(
                                PdfErrorKind::IncorrectType,
                                format!("calculator output {:?}", other),
                            ))
                        }
                    }
                }
                outputs
            }
        };

        match &self.range {
            Some(range) => outputs
                .into_iter()
                .enumerate()
                .map(|(idx, output)| {
                    let (min, max) = pair(range, idx)?;
                    Ok(clip_number(output, min, max))
                })
                .collect(),
            None => Ok(outputs),
        }
    }
}

fn single_input(inputs: &[Number]) -> PdfResult<f64> {
    match inputs {
        [x] => Ok(x.as_real()),
        _ => Err(PdfError::with_message(
            PdfErrorKind::MissingOperand,
            format!("expected one input, found {}", inputs.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Ctx;
    use crate::parser::parse_object;

    fn function_from_pdf(source: String) -> Function {
        let bytes = source.into_bytes();
        let mut ctx = Ctx::new(&bytes);
        let mut resolver = OptResolver::none(true);
        let object = parse_object(&mut ctx, &mut resolver, true).unwrap();
        Function::from_object(&object, &mut resolver).unwrap()
    }

    fn type4(body: &str, domain: &str, range: &str) -> Function {
        function_from_pdf(format!(
            "<< /FunctionType 4 /Domain {} /Range {} /Length {} >>\nstream\n{}\nendstream",
            domain,
            range,
            body.len(),
            body
        ))
    }

    #[test]
    fn calculator_sine_mix() {
        let function = type4(
            "{ 360 mul sin\n2 div\nexch 360 mul sin\n2 div\nadd\n}",
            "[-1.0 1.0 -1.0 1.0]",
            "[-1.0 1.0]",
        );
        let outputs = function
            .eval(&[Number::Real(0.25), Number::Real(0.5)])
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert!((outputs[0].as_real() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn calculator_clips_inputs_to_domain() {
        let function = type4("{ }", "[0.0 1.0]", "[0.0 10.0]");
        let outputs = function.eval(&[Number::Real(7.0)]).unwrap();
        assert_eq!(outputs[0].as_real(), 1.0);
    }

    #[test]
    fn calculator_clips_outputs_to_range() {
        let function = type4("{ 100 mul }", "[0.0 1.0]", "[0.0 10.0]");
        let outputs = function.eval(&[Number::Real(1.0)]).unwrap();
        assert_eq!(outputs[0].as_real(), 10.0);
    }

    #[test]
    fn exponential_interpolates() {
        let function = function_from_pdf(
            "<< /FunctionType 2 /Domain [0.0 1.0] /C0 [0.0 0.0] /C1 [1.0 0.5] /N 1 >>"
                .to_string(),
        );
        let outputs = function.eval(&[Number::Real(0.5)]).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!((outputs[0].as_real() - 0.5).abs() < 1e-12);
        assert!((outputs[1].as_real() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn stitching_selects_subfunction() {
        let function = function_from_pdf(
            "<< /FunctionType 3 /Domain [0.0 1.0] \
             /Functions [ << /FunctionType 2 /Domain [0.0 1.0] /C0 [0.0] /C1 [1.0] /N 1 >> \
                          << /FunctionType 2 /Domain [0.0 1.0] /C0 [10.0] /C1 [11.0] /N 1 >> ] \
             /Bounds [0.5] /Encode [0.0 1.0 0.0 1.0] >>"
                .to_string(),
        );
        // First half maps to the first function.
        let outputs = function.eval(&[Number::Real(0.25)]).unwrap();
        assert!((outputs[0].as_real() - 0.5).abs() < 1e-12);
        // Second half maps to the second.
        let outputs = function.eval(&[Number::Real(0.75)]).unwrap();
        assert!((outputs[0].as_real() - 10.5).abs() < 1e-12);
    }

    #[test]
    fn sampled_functions_unimplemented() {
        let bytes = b"<< /FunctionType 0 /Domain [0 1] >>".to_vec();
        let mut ctx = Ctx::new(&bytes);
        let mut resolver = OptResolver::none(true);
        let object = parse_object(&mut ctx, &mut resolver, false).unwrap();
        let err = Function::from_object(&object, &mut resolver).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
    }
}
