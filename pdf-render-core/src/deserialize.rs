use std::cell::OnceCell;
use std::rc::Rc;

use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{Dict, Number, ObjId, PdfObject, PdfString, Stream};
use crate::reader::{OptResolver, PdfReader};

// ── The capability interface ──────────────────────────────────────────────────

/// Maps a node of the dynamic object graph into a statically-shaped value.
///
/// This is the trait-dispatch rendition of a field-descriptor table: each
/// domain record implements `from_object` by driving a [`DictReader`]
/// through its fields.
pub trait FromObject: Sized {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self>;
}

fn type_error(expected: &str, found: &PdfObject) -> PdfError {
    PdfError::with_message(
        PdfErrorKind::IncorrectType,
        format!("expected {}, found {}", expected, found.type_name()),
    )
}

impl FromObject for PdfObject {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        Ok(object.clone())
    }
}

impl FromObject for bool {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Boolean(v) => Ok(*v),
            other => Err(type_error("boolean", other)),
        }
    }
}

impl FromObject for i32 {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Integer(v) => Ok(*v),
            other => Err(type_error("integer", other)),
        }
    }
}

impl FromObject for Number {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        object.as_number()
    }
}

/// Numbers read as `f64` accept both integer and real literals.
impl FromObject for f64 {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        Ok(object.as_number()?.as_real())
    }
}

/// Names deserialize to `String`; text strings to [`PdfString`].
impl FromObject for String {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Name(v) => Ok(v.clone()),
            other => Err(type_error("name", other)),
        }
    }
}

impl FromObject for PdfString {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::String(v) => Ok(PdfString(v.clone())),
            other => Err(type_error("string", other)),
        }
    }
}

impl FromObject for Dict {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Dictionary(v) => Ok(v.clone()),
            other => Err(type_error("dictionary", other)),
        }
    }
}

impl FromObject for Stream {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Stream(v) => Ok(v.clone()),
            other => Err(type_error("stream", other)),
        }
    }
}

impl FromObject for ObjId {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::IndirectRef(id) => Ok(*id),
            other => Err(type_error("indirect reference", other)),
        }
    }
}

impl<T: FromObject> FromObject for Vec<T> {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    T::from_object(item, resolver)
                        .with_ctx(|| format!("array element {}", idx))
                })
                .collect(),
            other => Err(type_error("array", other)),
        }
    }
}

// ── Lazily-resolved references ────────────────────────────────────────────────

/// An indirect reference paired with the memoized result of resolving it.
/// The first `resolve` parses and deserializes the target; every later
/// call returns the same `Rc`.
#[derive(Debug)]
pub struct ObjRef<T> {
    id: ObjId,
    resolved: OnceCell<Rc<T>>,
}

impl<T> ObjRef<T> {
    pub fn new(id: ObjId) -> Self {
        ObjRef {
            id,
            resolved: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ObjId {
        self.id
    }
}

impl<T: FromObject> ObjRef<T> {
    pub fn resolve(&self, reader: &mut PdfReader) -> PdfResult<Rc<T>> {
        if let Some(value) = self.resolved.get() {
            return Ok(Rc::clone(value));
        }
        let object = reader
            .resolve_ref(self.id)
            .with_ctx(|| format!("resolving {} R", self.id))?;
        // The xref cache stores the parsed indirect object as-is; peel
        // the wrapper before deserializing.
        let unwrapped = OptResolver::some(reader).resolve_object(&object)?;
        let value = Rc::new(T::from_object(&unwrapped, &mut OptResolver::some(reader))?);
        let _ = self.resolved.set(Rc::clone(&value));
        Ok(value)
    }
}

impl<T> Clone for ObjRef<T> {
    fn clone(&self) -> Self {
        ObjRef {
            id: self.id,
            resolved: match self.resolved.get() {
                Some(rc) => OnceCell::from(Rc::clone(rc)),
                None => OnceCell::new(),
            },
        }
    }
}

impl<T> FromObject for ObjRef<T> {
    fn from_object(object: &PdfObject, _resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        match object {
            PdfObject::IndirectRef(id) => Ok(ObjRef::new(*id)),
            other => Err(type_error("indirect reference", other)),
        }
    }
}

// ── Dictionary driver ─────────────────────────────────────────────────────────

/// Walks a dictionary through a record's fields, enforcing the key rules:
/// the object may sit behind one level of indirection, duplicate and
/// unknown keys are rejected unless `allow_unknown`, missing required keys
/// fail, and fields marked unimplemented fail only when present.
#[derive(Debug)]
pub struct DictReader<'x, 'r> {
    dict: Dict,
    resolver: &'x mut OptResolver<'r>,
    allow_unknown: bool,
    known: Vec<String>,
    record_name: &'static str,
}

impl<'x, 'r> DictReader<'x, 'r> {
    pub fn new(
        object: &PdfObject,
        resolver: &'x mut OptResolver<'r>,
        allow_unknown: bool,
        record_name: &'static str,
    ) -> PdfResult<Self> {
        let resolved = resolver.resolve_object(object)?;
        let dict = match resolved {
            PdfObject::Dictionary(dict) => dict,
            // Stream-backed records read their fields from the stream's
            // own dictionary.
            PdfObject::Stream(stream) => stream.raw_dict,
            other => {
                return Err(type_error("dictionary", &other)
                    .push_ctx(format!("deserializing {}", record_name)))
            }
        };

        if !allow_unknown {
            for (idx, (key, _)) in dict.iter().enumerate() {
                if dict.iter().skip(idx + 1).any(|(other, _)| other == key) {
                    return Err(PdfError::with_message(
                        PdfErrorKind::DuplicateKey,
                        format!("/{} appears twice in {}", key, record_name),
                    ));
                }
            }
        }

        Ok(DictReader {
            dict,
            resolver,
            allow_unknown,
            known: Vec::new(),
            record_name,
        })
    }

    fn mark(&mut self, key: &str) {
        self.known.push(key.to_string());
    }

    pub fn required<T: FromObject>(&mut self, key: &str) -> PdfResult<T> {
        self.mark(key);
        let object = self.dict.get(key).ok_or_else(|| {
            PdfError::with_message(
                PdfErrorKind::MissingDictKey,
                format!("/{} missing from {}", key, self.record_name),
            )
        })?;
        T::from_object(object, self.resolver).with_ctx(|| format!("field /{}", key))
    }

    pub fn optional<T: FromObject>(&mut self, key: &str) -> PdfResult<Option<T>> {
        self.mark(key);
        match self.dict.get(key) {
            Some(object) => Ok(Some(
                T::from_object(object, self.resolver).with_ctx(|| format!("field /{}", key))?,
            )),
            None => Ok(None),
        }
    }

    /// Singleton-or-array: a lone element deserializes as a one-element
    /// vector; anything else must be an array.
    pub fn required_as_array<T: FromObject>(&mut self, key: &str) -> PdfResult<Vec<T>> {
        self.mark(key);
        let object = self.dict.get(key).ok_or_else(|| {
            PdfError::with_message(
                PdfErrorKind::MissingDictKey,
                format!("/{} missing from {}", key, self.record_name),
            )
        })?;
        as_array(object, self.resolver).with_ctx(|| format!("field /{}", key))
    }

    pub fn optional_as_array<T: FromObject>(&mut self, key: &str) -> PdfResult<Option<Vec<T>>> {
        self.mark(key);
        match self.dict.get(key) {
            Some(object) => Ok(Some(
                as_array(object, self.resolver).with_ctx(|| format!("field /{}", key))?,
            )),
            None => Ok(None),
        }
    }

    /// Deserialize through a caller-supplied function, for fields whose
    /// shape no blanket impl covers.
    pub fn required_with<T>(
        &mut self,
        key: &str,
        deser: impl FnOnce(&PdfObject, &mut OptResolver<'_>) -> PdfResult<T>,
    ) -> PdfResult<T> {
        self.mark(key);
        let object = self.dict.get(key).ok_or_else(|| {
            PdfError::with_message(
                PdfErrorKind::MissingDictKey,
                format!("/{} missing from {}", key, self.record_name),
            )
        })?;
        deser(object, self.resolver).with_ctx(|| format!("field /{}", key))
    }

    pub fn optional_with<T>(
        &mut self,
        key: &str,
        deser: impl FnOnce(&PdfObject, &mut OptResolver<'_>) -> PdfResult<T>,
    ) -> PdfResult<Option<T>> {
        self.mark(key);
        match self.dict.get(key) {
            Some(object) => Ok(Some(
                deser(object, self.resolver).with_ctx(|| format!("field /{}", key))?,
            )),
            None => Ok(None),
        }
    }

    /// Known but deliberately skipped, present or not.
    pub fn ignored(&mut self, key: &str) {
        self.mark(key);
    }

    /// Known, and fatal when actually present.
    pub fn unimplemented(&mut self, key: &str) -> PdfResult<()> {
        self.mark(key);
        if self.dict.get(key).is_some() {
            return Err(PdfError::with_message(
                PdfErrorKind::Unimplemented,
                format!("/{} in {}", key, self.record_name),
            ));
        }
        Ok(())
    }

    /// Verify no key was left unaccounted for.
    pub fn finish(self) -> PdfResult<()> {
        if self.allow_unknown {
            return Ok(());
        }
        for (key, _) in self.dict.iter() {
            if !self.known.iter().any(|k| k == key) {
                return Err(PdfError::with_message(
                    PdfErrorKind::UnknownKey,
                    format!("/{} in {}", key, self.record_name),
                ));
            }
        }
        Ok(())
    }
}

fn as_array<T: FromObject>(
    object: &PdfObject,
    resolver: &mut OptResolver<'_>,
) -> PdfResult<Vec<T>> {
    if let Ok(single) = T::from_object(object, resolver) {
        return Ok(vec![single]);
    }
    Vec::<T>::from_object(object, resolver)
}

// ── Positional operands ───────────────────────────────────────────────────────

/// Exact-arity positional deserialization for content-stream operands.
/// References never appear here, so no resolver is involved.
pub struct Operands<'a> {
    items: &'a [PdfObject],
    index: usize,
}

impl<'a> Operands<'a> {
    pub fn new(items: &'a [PdfObject]) -> Self {
        Operands { items, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn next<T: FromObject>(&mut self) -> PdfResult<T> {
        let object = self.items.get(self.index).ok_or_else(|| {
            PdfError::with_message(
                PdfErrorKind::MissingOperand,
                format!("expected operand {}", self.index + 1),
            )
        })?;
        self.index += 1;
        T::from_object(object, &mut OptResolver::none(true))
            .with_ctx(|| format!("operand {}", self.index))
    }

    pub fn finish(self) -> PdfResult<()> {
        if self.index != self.items.len() {
            return Err(PdfError::with_message(
                PdfErrorKind::ExcessOperand,
                format!("{} operands, {} consumed", self.items.len(), self.index),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_obj(entries: Vec<(&str, PdfObject)>) -> PdfObject {
        let mut dict = Dict::new();
        for (k, v) in entries {
            dict.push(k.to_string(), v);
        }
        PdfObject::Dictionary(dict)
    }

    #[test]
    fn required_and_optional_fields() {
        let obj = dict_obj(vec![("Size", PdfObject::Integer(4))]);
        let mut resolver = OptResolver::none(true);
        let mut reader = DictReader::new(&obj, &mut resolver, false, "Test").unwrap();
        let size: i32 = reader.required("Size").unwrap();
        let prev: Option<i32> = reader.optional("Prev").unwrap();
        assert_eq!(size, 4);
        assert_eq!(prev, None);
        reader.finish().unwrap();
    }

    #[test]
    fn missing_required_key_fails() {
        let obj = dict_obj(vec![]);
        let mut resolver = OptResolver::none(true);
        let mut reader = DictReader::new(&obj, &mut resolver, false, "Test").unwrap();
        let err = reader.required::<i32>("Size").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::MissingDictKey);
    }

    #[test]
    fn unknown_key_rejected() {
        let obj = dict_obj(vec![("Bogus", PdfObject::Null)]);
        let mut resolver = OptResolver::none(true);
        let reader = DictReader::new(&obj, &mut resolver, false, "Test").unwrap();
        let err = reader.finish().unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::UnknownKey);
    }

    #[test]
    fn unknown_key_allowed_when_requested() {
        let obj = dict_obj(vec![("Bogus", PdfObject::Null)]);
        let mut resolver = OptResolver::none(true);
        let reader = DictReader::new(&obj, &mut resolver, true, "Test").unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn duplicate_key_rejected() {
        let obj = dict_obj(vec![
            ("A", PdfObject::Integer(1)),
            ("A", PdfObject::Integer(2)),
        ]);
        let mut resolver = OptResolver::none(true);
        let err = DictReader::new(&obj, &mut resolver, false, "Test").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::DuplicateKey);
    }

    #[test]
    fn unimplemented_field_only_fails_when_present() {
        let obj = dict_obj(vec![("Encrypt", PdfObject::Null)]);
        let mut resolver = OptResolver::none(true);
        let mut reader = DictReader::new(&obj, &mut resolver, false, "Test").unwrap();
        assert!(reader.unimplemented("DecodeParms").is_ok());
        let err = reader.unimplemented("Encrypt").unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
    }

    #[test]
    fn as_array_accepts_singletons() {
        let obj = dict_obj(vec![
            ("One", PdfObject::Integer(7)),
            ("Many", PdfObject::Array(vec![
                PdfObject::Integer(1),
                PdfObject::Integer(2),
            ])),
        ]);
        let mut resolver = OptResolver::none(true);
        let mut reader = DictReader::new(&obj, &mut resolver, false, "Test").unwrap();
        assert_eq!(reader.required_as_array::<i32>("One").unwrap(), vec![7]);
        assert_eq!(reader.required_as_array::<i32>("Many").unwrap(), vec![1, 2]);
    }

    #[test]
    fn operands_enforce_exact_arity() {
        let items = vec![PdfObject::Integer(1), PdfObject::Real(2.5)];
        let mut ops = Operands::new(&items);
        assert_eq!(ops.next::<f64>().unwrap(), 1.0);
        assert_eq!(ops.next::<f64>().unwrap(), 2.5);
        ops.finish().unwrap();

        let items = vec![PdfObject::Integer(1)];
        let ops = Operands::new(&items);
        assert_eq!(ops.finish().unwrap_err().kind(), PdfErrorKind::ExcessOperand);
    }
}
