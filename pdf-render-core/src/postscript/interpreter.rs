//! The PostScript interpreter: operand stack, dictionary stack with a
//! preloaded systemdict, and a construction stack for array, dictionary,
//! and procedure literals.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::error::{PdfError, PdfErrorKind, PdfResult};
use crate::postscript::tokenizer::Token;
use crate::postscript::{PsAccess, PsObject, PsValue};

enum FrameKind {
    Array,
    Proc,
    Dict,
}

struct Frame {
    kind: FrameKind,
    items: Vec<PsObject>,
}

pub struct Interpreter {
    operands: Vec<PsObject>,
    /// Bottom entry is systemdict; the top is the current dictionary.
    dict_stack: Vec<PsObject>,
    construction: Vec<Frame>,
    proc_depth: usize,
    /// category -> [(name, instance)]
    resources: Vec<(String, Vec<(String, PsObject)>)>,
}

fn stack_underflow() -> PdfError {
    PdfError::new(PdfErrorKind::PostscriptStackUnderflow)
}

fn type_mismatch(expected: &str, found: &PsObject) -> PdfError {
    PdfError::with_message(
        PdfErrorKind::PostscriptTypeMismatch,
        format!("expected {}, found {:?}", expected, found.value),
    )
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            operands: Vec::new(),
            dict_stack: vec![systemdict()],
            construction: Vec::new(),
            proc_depth: 0,
            resources: Vec::new(),
        }
    }

    // ── Stacks ────────────────────────────────────────────────────────────────

    pub fn operand_len(&self) -> usize {
        self.operands.len()
    }

    pub fn push_operand(&mut self, object: PsObject) {
        self.operands.push(object);
    }

    pub fn pop_operand(&mut self) -> PdfResult<PsObject> {
        self.operands.pop().ok_or_else(stack_underflow)
    }

    pub fn pop_real(&mut self) -> PdfResult<f64> {
        let object = self.pop_operand()?;
        match object.value {
            PsValue::Integer(v) => Ok(v as f64),
            PsValue::Real(v) => Ok(v),
            _ => Err(type_mismatch("number", &object)),
        }
    }

    pub fn pop_int(&mut self) -> PdfResult<i32> {
        let object = self.pop_operand()?;
        match object.value {
            PsValue::Integer(v) => Ok(v),
            _ => Err(type_mismatch("integer", &object)),
        }
    }

    pub fn pop_bool(&mut self) -> PdfResult<bool> {
        let object = self.pop_operand()?;
        match object.value {
            PsValue::Boolean(v) => Ok(v),
            _ => Err(type_mismatch("boolean", &object)),
        }
    }

    fn pop_name(&mut self) -> PdfResult<String> {
        let object = self.pop_operand()?;
        match object.value {
            PsValue::Name(name) => Ok(name),
            _ => Err(type_mismatch("name", &object)),
        }
    }

    fn pop_procedure(&mut self) -> PdfResult<PsObject> {
        let object = self.pop_operand()?;
        if !object.is_procedure() {
            return Err(type_mismatch("procedure", &object));
        }
        Ok(object)
    }

    fn top_dict(&self) -> PdfResult<&PsObject> {
        self.dict_stack.last().ok_or_else(stack_underflow)
    }

    // ── Name resolution ───────────────────────────────────────────────────────

    /// Walk the dictionary stack top-down; within each dictionary the
    /// first matching key wins.
    pub fn lookup_name(&self, name: &str) -> PdfResult<PsObject> {
        let key = PsObject::name(name);
        for dict in self.dict_stack.iter().rev() {
            let PsValue::Dict(entries) = &dict.value else {
                continue;
            };
            for (entry_key, value) in entries.borrow().iter() {
                if entry_key.key_eq(&key) {
                    return Ok(value.clone());
                }
            }
        }
        Err(PdfError::with_message(
            PdfErrorKind::PostscriptUndefinedName,
            name.to_string(),
        ))
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    pub fn execute_object(&mut self, object: &PsObject) -> PdfResult<()> {
        match &object.value {
            PsValue::Operator(name, operator) => {
                trace!("executing operator {}", name);
                operator(self)
            }
            PsValue::Array(_) if object.is_procedure() => self.run_procedure(object),
            PsValue::Name(name) if !object.literal => {
                let resolved = self.lookup_name(name)?;
                self.execute_object(&resolved)
            }
            _ => {
                self.push_operand(object.clone());
                Ok(())
            }
        }
    }

    /// Evaluate a procedure's elements in order: literals push, nested
    /// procedures push deferred, executable names and operators run.
    pub fn run_procedure(&mut self, procedure: &PsObject) -> PdfResult<()> {
        let PsValue::Array(items) = &procedure.value else {
            return Err(type_mismatch("procedure", procedure));
        };
        let items = items.borrow().clone();
        for item in &items {
            if item.literal || item.is_procedure() {
                self.push_operand(item.clone());
            } else {
                self.execute_object(item)?;
            }
        }
        Ok(())
    }

    // ── Token interpretation ──────────────────────────────────────────────────

    /// Deliver a scanned object: append to the innermost bracket under
    /// construction, or push it on the operand stack. Execution never
    /// happens here.
    fn emit(&mut self, object: PsObject) -> PdfResult<()> {
        if let Some(frame) = self.construction.last_mut() {
            frame.items.push(object);
        } else {
            self.push_operand(object);
        }
        Ok(())
    }

    pub fn interpret_token(&mut self, token: Token) -> PdfResult<()> {
        match token {
            Token::Integer(value) | Token::RadixNum(value) => {
                self.emit(PsObject::integer(value))
            }
            Token::Real(value) => self.emit(PsObject::real(value)),
            Token::LitString(bytes) | Token::HexString(bytes) | Token::Base85String(bytes) => {
                self.emit(PsObject::literal(PsValue::String(bytes)))
            }
            Token::ExeName(name) => {
                // Inside a procedure body, execution is deferred.
                if self.proc_depth > 0 {
                    return self.emit(PsObject::executable(PsValue::Name(name)));
                }
                let object = PsObject::executable(PsValue::Name(name));
                self.execute_object(&object)
            }
            Token::LitName(name) => {
                // The keywords read back as booleans.
                if name == "true" || name == "false" {
                    return self.emit(PsObject::boolean(name == "true"));
                }
                self.emit(PsObject::name(name))
            }
            Token::ImmName(name) => {
                let resolved = self.lookup_name(&name)?;
                self.emit(resolved)
            }
            Token::StartArray => {
                self.construction.push(Frame {
                    kind: FrameKind::Array,
                    items: Vec::new(),
                });
                Ok(())
            }
            Token::EndArray => {
                let frame = self.construction.pop().ok_or_else(|| {
                    PdfError::with_message(PdfErrorKind::PostscriptUnmatched, "`]` with no `[`")
                })?;
                if !matches!(frame.kind, FrameKind::Array) {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptUnmatched,
                        "`]` closes a different bracket",
                    ));
                }
                self.emit(PsObject::literal(PsValue::Array(Rc::new(RefCell::new(
                    frame.items,
                )))))
            }
            Token::StartProc => {
                self.construction.push(Frame {
                    kind: FrameKind::Proc,
                    items: Vec::new(),
                });
                self.proc_depth += 1;
                Ok(())
            }
            Token::EndProc => {
                let frame = self.construction.pop().ok_or_else(|| {
                    PdfError::with_message(PdfErrorKind::PostscriptUnmatched, "`}` with no `{`")
                })?;
                if !matches!(frame.kind, FrameKind::Proc) {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptUnmatched,
                        "`}` closes a different bracket",
                    ));
                }
                self.proc_depth -= 1;
                self.emit(PsObject::procedure(frame.items))
            }
            Token::StartDict => {
                self.construction.push(Frame {
                    kind: FrameKind::Dict,
                    items: Vec::new(),
                });
                Ok(())
            }
            Token::EndDict => {
                let frame = self.construction.pop().ok_or_else(|| {
                    PdfError::with_message(PdfErrorKind::PostscriptUnmatched, "`>>` with no `<<`")
                })?;
                if !matches!(frame.kind, FrameKind::Dict) {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptUnmatched,
                        "`>>` closes a different bracket",
                    ));
                }
                if frame.items.len() % 2 != 0 {
                    return Err(PdfError::with_message(
                        PdfErrorKind::PostscriptRangeCheck,
                        "dictionary literal with an odd number of objects",
                    ));
                }
                let mut entries = Vec::with_capacity(frame.items.len() / 2);
                let mut iter = frame.items.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    entries.push((key, value));
                }
                self.emit(PsObject::literal(PsValue::Dict(Rc::new(RefCell::new(
                    entries,
                )))))
            }
        }
    }

    // ── Resources ─────────────────────────────────────────────────────────────

    pub fn define_resource(&mut self, category: &str, name: &str, instance: PsObject) {
        let category_entry = match self.resources.iter_mut().find(|(c, _)| c == category) {
            Some(entry) => entry,
            None => {
                self.resources.push((category.to_string(), Vec::new()));
                self.resources.last_mut().unwrap()
            }
        };
        match category_entry.1.iter_mut().find(|(n, _)| n == name) {
            Some(resource) => resource.1 = instance,
            None => category_entry.1.push((name.to_string(), instance)),
        }
    }

    pub fn find_resource(&self, category: &str, name: &str) -> PdfResult<PsObject> {
        self.resources
            .iter()
            .find(|(c, _)| c == category)
            .and_then(|(_, resources)| resources.iter().find(|(n, _)| n == name))
            .map(|(_, instance)| instance.clone())
            .ok_or_else(|| {
                PdfError::with_message(
                    PdfErrorKind::PostscriptUndefinedName,
                    format!("resource {}/{}", category, name),
                )
            })
    }
}

// ── systemdict ────────────────────────────────────────────────────────────────

fn systemdict() -> PsObject {
    let ops: &[(&'static str, crate::postscript::PsOperatorFn)] = &[
        ("pop", op_pop),
        ("exch", op_exch),
        ("dup", op_dup),
        ("copy", op_copy),
        ("index", op_index),
        ("roll", op_roll),
        ("add", op_add),
        ("sub", op_sub),
        ("mul", op_mul),
        ("div", op_div),
        ("idiv", op_idiv),
        ("mod", op_mod),
        ("neg", op_neg),
        ("abs", op_abs),
        ("ceiling", op_ceiling),
        ("floor", op_floor),
        ("round", op_round),
        ("truncate", op_truncate),
        ("sqrt", op_sqrt),
        ("sin", op_sin),
        ("cos", op_cos),
        ("atan", op_atan),
        ("exp", op_exp),
        ("ln", op_ln),
        ("log", op_log),
        ("cvi", op_cvi),
        ("cvr", op_cvr),
        ("eq", op_eq),
        ("ne", op_ne),
        ("lt", op_lt),
        ("le", op_le),
        ("gt", op_gt),
        ("ge", op_ge),
        ("and", op_and),
        ("or", op_or),
        ("xor", op_xor),
        ("not", op_not),
        ("bitshift", op_bitshift),
        ("true", op_true),
        ("false", op_false),
        ("if", op_if),
        ("ifelse", op_ifelse),
        ("dict", op_dict),
        ("def", op_def),
        ("begin", op_begin),
        ("end", op_end),
        ("currentdict", op_currentdict),
        ("defineresource", op_defineresource),
        ("findresource", op_findresource),
    ];

    let entries: Vec<(PsObject, PsObject)> = ops
        .iter()
        .map(|&(name, operator)| {
            (
                PsObject::name(name),
                PsObject {
                    value: PsValue::Operator(name, operator),
                    literal: false,
                    access: PsAccess::ExecuteOnly,
                },
            )
        })
        .collect();

    PsObject {
        value: PsValue::Dict(Rc::new(RefCell::new(entries))),
        literal: true,
        access: PsAccess::ReadOnly,
    }
}

// ── Stack operators ───────────────────────────────────────────────────────────

fn op_pop(interp: &mut Interpreter) -> PdfResult<()> {
    interp.pop_operand().map(|_| ())
}

fn op_exch(interp: &mut Interpreter) -> PdfResult<()> {
    let b = interp.pop_operand()?;
    let a = interp.pop_operand()?;
    interp.push_operand(b);
    interp.push_operand(a);
    Ok(())
}

fn op_dup(interp: &mut Interpreter) -> PdfResult<()> {
    let object = interp.pop_operand()?;
    interp.push_operand(object.clone());
    interp.push_operand(object);
    Ok(())
}

fn op_copy(interp: &mut Interpreter) -> PdfResult<()> {
    let count = interp.pop_int()?;
    if count < 0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    let count = count as usize;
    if count > interp.operands.len() {
        return Err(stack_underflow());
    }
    let start = interp.operands.len() - count;
    let copies: Vec<PsObject> = interp.operands[start..].to_vec();
    interp.operands.extend(copies);
    Ok(())
}

fn op_index(interp: &mut Interpreter) -> PdfResult<()> {
    let depth = interp.pop_int()?;
    if depth < 0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    let depth = depth as usize;
    if depth >= interp.operands.len() {
        return Err(stack_underflow());
    }
    let object = interp.operands[interp.operands.len() - 1 - depth].clone();
    interp.push_operand(object);
    Ok(())
}

fn op_roll(interp: &mut Interpreter) -> PdfResult<()> {
    let shift = interp.pop_int()?;
    let count = interp.pop_int()?;
    if count < 0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    let count = count as usize;
    if count > interp.operands.len() {
        return Err(stack_underflow());
    }
    if count == 0 {
        return Ok(());
    }
    let start = interp.operands.len() - count;
    let shift = shift.rem_euclid(count as i32) as usize;
    interp.operands[start..].rotate_right(shift);
    Ok(())
}

// ── Arithmetic operators ──────────────────────────────────────────────────────

enum PsNumber {
    Int(i32),
    Real(f64),
}

impl PsNumber {
    fn as_f64(&self) -> f64 {
        match *self {
            PsNumber::Int(v) => v as f64,
            PsNumber::Real(v) => v,
        }
    }
}

fn pop_number(interp: &mut Interpreter) -> PdfResult<PsNumber> {
    let object = interp.pop_operand()?;
    match object.value {
        PsValue::Integer(v) => Ok(PsNumber::Int(v)),
        PsValue::Real(v) => Ok(PsNumber::Real(v)),
        _ => Err(type_mismatch("number", &object)),
    }
}

fn push_number(interp: &mut Interpreter, number: PsNumber) {
    match number {
        PsNumber::Int(v) => interp.push_operand(PsObject::integer(v)),
        PsNumber::Real(v) => interp.push_operand(PsObject::real(v)),
    }
}

/// Integer arithmetic that overflows promotes to real.
fn binary_arith(
    interp: &mut Interpreter,
    int_op: fn(i32, i32) -> Option<i32>,
    real_op: fn(f64, f64) -> f64,
) -> PdfResult<()> {
    let b = pop_number(interp)?;
    let a = pop_number(interp)?;
    let result = match (&a, &b) {
        (PsNumber::Int(x), PsNumber::Int(y)) => match int_op(*x, *y) {
            Some(v) => PsNumber::Int(v),
            None => PsNumber::Real(real_op(*x as f64, *y as f64)),
        },
        _ => PsNumber::Real(real_op(a.as_f64(), b.as_f64())),
    };
    push_number(interp, result);
    Ok(())
}

fn op_add(interp: &mut Interpreter) -> PdfResult<()> {
    binary_arith(interp, i32::checked_add, |a, b| a + b)
}

fn op_sub(interp: &mut Interpreter) -> PdfResult<()> {
    binary_arith(interp, i32::checked_sub, |a, b| a - b)
}

fn op_mul(interp: &mut Interpreter) -> PdfResult<()> {
    binary_arith(interp, i32::checked_mul, |a, b| a * b)
}

fn op_div(interp: &mut Interpreter) -> PdfResult<()> {
    let b = pop_number(interp)?.as_f64();
    let a = pop_number(interp)?.as_f64();
    if b == 0.0 {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptRangeCheck,
            "division by zero",
        ));
    }
    interp.push_operand(PsObject::real(a / b));
    Ok(())
}

fn op_idiv(interp: &mut Interpreter) -> PdfResult<()> {
    let b = interp.pop_int()?;
    let a = interp.pop_int()?;
    if b == 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptRangeCheck,
            "division by zero",
        ));
    }
    interp.push_operand(PsObject::integer(a.wrapping_div(b)));
    Ok(())
}

fn op_mod(interp: &mut Interpreter) -> PdfResult<()> {
    let b = interp.pop_int()?;
    let a = interp.pop_int()?;
    if b == 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::PostscriptRangeCheck,
            "modulo by zero",
        ));
    }
    interp.push_operand(PsObject::integer(a.wrapping_rem(b)));
    Ok(())
}

fn op_neg(interp: &mut Interpreter) -> PdfResult<()> {
    let number = pop_number(interp)?;
    let result = match number {
        PsNumber::Int(v) => match v.checked_neg() {
            Some(n) => PsNumber::Int(n),
            None => PsNumber::Real(-(v as f64)),
        },
        PsNumber::Real(v) => PsNumber::Real(-v),
    };
    push_number(interp, result);
    Ok(())
}

fn op_abs(interp: &mut Interpreter) -> PdfResult<()> {
    let number = pop_number(interp)?;
    let result = match number {
        PsNumber::Int(v) => match v.checked_abs() {
            Some(n) => PsNumber::Int(n),
            None => PsNumber::Real((v as f64).abs()),
        },
        PsNumber::Real(v) => PsNumber::Real(v.abs()),
    };
    push_number(interp, result);
    Ok(())
}

fn unary_round(interp: &mut Interpreter, real_op: fn(f64) -> f64) -> PdfResult<()> {
    let number = pop_number(interp)?;
    let result = match number {
        PsNumber::Int(v) => PsNumber::Int(v),
        PsNumber::Real(v) => PsNumber::Real(real_op(v)),
    };
    push_number(interp, result);
    Ok(())
}

fn op_ceiling(interp: &mut Interpreter) -> PdfResult<()> {
    unary_round(interp, f64::ceil)
}

fn op_floor(interp: &mut Interpreter) -> PdfResult<()> {
    unary_round(interp, f64::floor)
}

fn op_round(interp: &mut Interpreter) -> PdfResult<()> {
    unary_round(interp, f64::round)
}

fn op_truncate(interp: &mut Interpreter) -> PdfResult<()> {
    unary_round(interp, f64::trunc)
}

fn op_sqrt(interp: &mut Interpreter) -> PdfResult<()> {
    let value = interp.pop_real()?;
    if value < 0.0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    interp.push_operand(PsObject::real(value.sqrt()));
    Ok(())
}

fn op_sin(interp: &mut Interpreter) -> PdfResult<()> {
    let degrees = interp.pop_real()?;
    interp.push_operand(PsObject::real(degrees.to_radians().sin()));
    Ok(())
}

fn op_cos(interp: &mut Interpreter) -> PdfResult<()> {
    let degrees = interp.pop_real()?;
    interp.push_operand(PsObject::real(degrees.to_radians().cos()));
    Ok(())
}

fn op_atan(interp: &mut Interpreter) -> PdfResult<()> {
    let den = interp.pop_real()?;
    let num = interp.pop_real()?;
    let mut degrees = num.atan2(den).to_degrees();
    if degrees < 0.0 {
        degrees += 360.0;
    }
    interp.push_operand(PsObject::real(degrees));
    Ok(())
}

fn op_exp(interp: &mut Interpreter) -> PdfResult<()> {
    let exponent = interp.pop_real()?;
    let base = interp.pop_real()?;
    interp.push_operand(PsObject::real(base.powf(exponent)));
    Ok(())
}

fn op_ln(interp: &mut Interpreter) -> PdfResult<()> {
    let value = interp.pop_real()?;
    if value <= 0.0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    interp.push_operand(PsObject::real(value.ln()));
    Ok(())
}

fn op_log(interp: &mut Interpreter) -> PdfResult<()> {
    let value = interp.pop_real()?;
    if value <= 0.0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    interp.push_operand(PsObject::real(value.log10()));
    Ok(())
}

fn op_cvi(interp: &mut Interpreter) -> PdfResult<()> {
    let number = pop_number(interp)?;
    let value = match number {
        PsNumber::Int(v) => v,
        PsNumber::Real(v) => {
            let truncated = v.trunc();
            if truncated < i32::MIN as f64 || truncated > i32::MAX as f64 {
                return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
            }
            truncated as i32
        }
    };
    interp.push_operand(PsObject::integer(value));
    Ok(())
}

fn op_cvr(interp: &mut Interpreter) -> PdfResult<()> {
    let value = interp.pop_real()?;
    interp.push_operand(PsObject::real(value));
    Ok(())
}

// ── Comparison and boolean operators ──────────────────────────────────────────

fn op_eq(interp: &mut Interpreter) -> PdfResult<()> {
    let b = interp.pop_operand()?;
    let a = interp.pop_operand()?;
    interp.push_operand(PsObject::boolean(a.key_eq(&b)));
    Ok(())
}

fn op_ne(interp: &mut Interpreter) -> PdfResult<()> {
    let b = interp.pop_operand()?;
    let a = interp.pop_operand()?;
    interp.push_operand(PsObject::boolean(!a.key_eq(&b)));
    Ok(())
}

fn compare(interp: &mut Interpreter, cmp: fn(f64, f64) -> bool) -> PdfResult<()> {
    let b = pop_number(interp)?.as_f64();
    let a = pop_number(interp)?.as_f64();
    interp.push_operand(PsObject::boolean(cmp(a, b)));
    Ok(())
}

fn op_lt(interp: &mut Interpreter) -> PdfResult<()> {
    compare(interp, |a, b| a < b)
}

fn op_le(interp: &mut Interpreter) -> PdfResult<()> {
    compare(interp, |a, b| a <= b)
}

fn op_gt(interp: &mut Interpreter) -> PdfResult<()> {
    compare(interp, |a, b| a > b)
}

fn op_ge(interp: &mut Interpreter) -> PdfResult<()> {
    compare(interp, |a, b| a >= b)
}

/// Boolean on booleans, bitwise on integers.
fn logic(
    interp: &mut Interpreter,
    bool_op: fn(bool, bool) -> bool,
    int_op: fn(i32, i32) -> i32,
) -> PdfResult<()> {
    let b = interp.pop_operand()?;
    let a = interp.pop_operand()?;
    match (&a.value, &b.value) {
        (PsValue::Boolean(x), PsValue::Boolean(y)) => {
            interp.push_operand(PsObject::boolean(bool_op(*x, *y)));
            Ok(())
        }
        (PsValue::Integer(x), PsValue::Integer(y)) => {
            interp.push_operand(PsObject::integer(int_op(*x, *y)));
            Ok(())
        }
        _ => Err(type_mismatch("two booleans or two integers", &a)),
    }
}

fn op_and(interp: &mut Interpreter) -> PdfResult<()> {
    logic(interp, |a, b| a && b, |a, b| a & b)
}

fn op_or(interp: &mut Interpreter) -> PdfResult<()> {
    logic(interp, |a, b| a || b, |a, b| a | b)
}

fn op_xor(interp: &mut Interpreter) -> PdfResult<()> {
    logic(interp, |a, b| a ^ b, |a, b| a ^ b)
}

fn op_not(interp: &mut Interpreter) -> PdfResult<()> {
    let object = interp.pop_operand()?;
    match object.value {
        PsValue::Boolean(v) => {
            interp.push_operand(PsObject::boolean(!v));
            Ok(())
        }
        PsValue::Integer(v) => {
            interp.push_operand(PsObject::integer(!v));
            Ok(())
        }
        _ => Err(type_mismatch("boolean or integer", &object)),
    }
}

fn op_bitshift(interp: &mut Interpreter) -> PdfResult<()> {
    let shift = interp.pop_int()?;
    let value = interp.pop_int()?;
    let result = if shift >= 0 {
        value.wrapping_shl(shift as u32)
    } else {
        value.wrapping_shr((-shift) as u32)
    };
    interp.push_operand(PsObject::integer(result));
    Ok(())
}

fn op_true(interp: &mut Interpreter) -> PdfResult<()> {
    interp.push_operand(PsObject::boolean(true));
    Ok(())
}

fn op_false(interp: &mut Interpreter) -> PdfResult<()> {
    interp.push_operand(PsObject::boolean(false));
    Ok(())
}

// ── Control operators ─────────────────────────────────────────────────────────

fn op_if(interp: &mut Interpreter) -> PdfResult<()> {
    let procedure = interp.pop_procedure()?;
    let condition = interp.pop_bool()?;
    if condition {
        interp.run_procedure(&procedure)?;
    }
    Ok(())
}

fn op_ifelse(interp: &mut Interpreter) -> PdfResult<()> {
    let else_proc = interp.pop_procedure()?;
    let then_proc = interp.pop_procedure()?;
    let condition = interp.pop_bool()?;
    if condition {
        interp.run_procedure(&then_proc)?;
    } else {
        interp.run_procedure(&else_proc)?;
    }
    Ok(())
}

// ── Dictionary operators ──────────────────────────────────────────────────────

fn op_dict(interp: &mut Interpreter) -> PdfResult<()> {
    let capacity = interp.pop_int()?;
    if capacity < 0 {
        return Err(PdfError::new(PdfErrorKind::PostscriptRangeCheck));
    }
    interp.push_operand(PsObject::literal(PsValue::Dict(Rc::new(RefCell::new(
        Vec::new(),
    )))));
    Ok(())
}

/// Bind key -> value in the currently-open dictionary, replacing an
/// existing binding.
fn op_def(interp: &mut Interpreter) -> PdfResult<()> {
    let value = interp.pop_operand()?;
    let key = interp.pop_operand()?;

    let top = interp.top_dict()?;
    let PsValue::Dict(entries) = &top.value else {
        return Err(type_mismatch("dictionary", top));
    };
    let entries = Rc::clone(entries);
    let mut entries = entries.borrow_mut();
    for (entry_key, entry_value) in entries.iter_mut() {
        if entry_key.key_eq(&key) {
            *entry_value = value;
            return Ok(());
        }
    }
    entries.push((key, value));
    Ok(())
}

fn op_begin(interp: &mut Interpreter) -> PdfResult<()> {
    let object = interp.pop_operand()?;
    if !matches!(object.value, PsValue::Dict(_)) {
        return Err(type_mismatch("dictionary", &object));
    }
    interp.dict_stack.push(object);
    Ok(())
}

fn op_end(interp: &mut Interpreter) -> PdfResult<()> {
    // systemdict stays.
    if interp.dict_stack.len() <= 1 {
        return Err(stack_underflow());
    }
    interp.dict_stack.pop();
    Ok(())
}

fn op_currentdict(interp: &mut Interpreter) -> PdfResult<()> {
    let dict = interp.top_dict()?.clone();
    interp.push_operand(dict);
    Ok(())
}

// ── Resource operators ────────────────────────────────────────────────────────

fn op_defineresource(interp: &mut Interpreter) -> PdfResult<()> {
    let category = interp.pop_name()?;
    let instance = interp.pop_operand()?;
    let key = interp.pop_name()?;
    interp.define_resource(&category, &key, instance.clone());
    interp.push_operand(instance);
    Ok(())
}

fn op_findresource(interp: &mut Interpreter) -> PdfResult<()> {
    let category = interp.pop_name()?;
    let key = interp.pop_name()?;
    let instance = interp.find_resource(&category, &key)?;
    interp.push_operand(instance);
    Ok(())
}
