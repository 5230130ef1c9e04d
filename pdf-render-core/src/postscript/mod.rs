//! PostScript calculator-function machinery: tokenizer, object model,
//! and a stack interpreter covering the Type-4 subset.

pub mod interpreter;
pub mod tokenizer;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::PdfResult;

pub use interpreter::Interpreter;
pub use tokenizer::{Token, Tokenizer};

/// Built-in operator implementation.
pub type PsOperatorFn = fn(&mut Interpreter) -> PdfResult<()>;

/// Access attribute per the PostScript object model. Procedure literals
/// are execute-only; everything else defaults to unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsAccess {
    Unlimited,
    ReadOnly,
    ExecuteOnly,
    None,
}

pub type PsArray = Rc<RefCell<Vec<PsObject>>>;
/// Dictionaries are flat key/value pair lists, first match wins.
pub type PsDict = Rc<RefCell<Vec<(PsObject, PsObject)>>>;

#[derive(Clone)]
pub enum PsValue {
    Boolean(bool),
    Integer(i32),
    Real(f64),
    Name(String),
    Mark,
    Null,
    String(Vec<u8>),
    Array(PsArray),
    Dict(PsDict),
    Operator(&'static str, PsOperatorFn),
}

impl fmt::Debug for PsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsValue::Boolean(v) => write!(f, "{}", v),
            PsValue::Integer(v) => write!(f, "{}", v),
            PsValue::Real(v) => write!(f, "{}", v),
            PsValue::Name(name) => write!(f, "/{}", name),
            PsValue::Mark => write!(f, "mark"),
            PsValue::Null => write!(f, "null"),
            PsValue::String(bytes) => write!(f, "({})", String::from_utf8_lossy(bytes)),
            PsValue::Array(items) => write!(f, "array[{}]", items.borrow().len()),
            PsValue::Dict(entries) => write!(f, "dict[{}]", entries.borrow().len()),
            PsValue::Operator(name, _) => write!(f, "--{}--", name),
        }
    }
}

/// A tagged value plus its literal and access flags.
#[derive(Debug, Clone)]
pub struct PsObject {
    pub value: PsValue,
    pub literal: bool,
    pub access: PsAccess,
}

impl PsObject {
    pub fn literal(value: PsValue) -> Self {
        PsObject {
            value,
            literal: true,
            access: PsAccess::Unlimited,
        }
    }

    pub fn executable(value: PsValue) -> Self {
        PsObject {
            value,
            literal: false,
            access: PsAccess::Unlimited,
        }
    }

    pub fn integer(value: i32) -> Self {
        PsObject::literal(PsValue::Integer(value))
    }

    pub fn real(value: f64) -> Self {
        PsObject::literal(PsValue::Real(value))
    }

    pub fn boolean(value: bool) -> Self {
        PsObject::literal(PsValue::Boolean(value))
    }

    pub fn name(name: impl Into<String>) -> Self {
        PsObject::literal(PsValue::Name(name.into()))
    }

    /// A procedure: an executable array with execute-only access.
    pub fn procedure(items: Vec<PsObject>) -> Self {
        PsObject {
            value: PsValue::Array(Rc::new(RefCell::new(items))),
            literal: false,
            access: PsAccess::ExecuteOnly,
        }
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self.value, PsValue::Array(_)) && !self.literal
    }

    /// Key equality for dictionary lookup.
    pub fn key_eq(&self, other: &PsObject) -> bool {
        match (&self.value, &other.value) {
            (PsValue::Name(a), PsValue::Name(b)) => a == b,
            (PsValue::Integer(a), PsValue::Integer(b)) => a == b,
            (PsValue::Real(a), PsValue::Real(b)) => a == b,
            (PsValue::Integer(a), PsValue::Real(b)) | (PsValue::Real(b), PsValue::Integer(a)) => {
                *a as f64 == *b
            }
            (PsValue::Boolean(a), PsValue::Boolean(b)) => a == b,
            (PsValue::String(a), PsValue::String(b)) => a == b,
            (PsValue::Null, PsValue::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedures_are_executable_arrays() {
        let proc_obj = PsObject::procedure(vec![PsObject::integer(1)]);
        assert!(proc_obj.is_procedure());
        assert_eq!(proc_obj.access, PsAccess::ExecuteOnly);

        let array = PsObject::literal(PsValue::Array(Rc::new(RefCell::new(Vec::new()))));
        assert!(!array.is_procedure());
    }

    #[test]
    fn key_equality_mixes_numeric_types() {
        assert!(PsObject::integer(3).key_eq(&PsObject::real(3.0)));
        assert!(PsObject::name("abc").key_eq(&PsObject::name("abc")));
        assert!(!PsObject::name("abc").key_eq(&PsObject::integer(1)));
    }
}
