use crate::deserialize::{DictReader, FromObject, ObjRef};
use crate::error::{PdfError, PdfErrorKind, PdfResult};
use crate::object::{Dict, PdfObject};
use crate::page::Pages;
use crate::reader::OptResolver;

/// The trailer dictionary at the end of the file.
#[derive(Debug, Clone)]
pub struct Trailer {
    pub size: i32,
    pub root: ObjRef<Catalog>,
    pub prev: Option<i32>,
}

impl FromObject for Trailer {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "Trailer")?;
        let size = fields.required("Size")?;
        let root = fields.required("Root")?;
        let prev = fields.optional("Prev")?;
        fields.ignored("Info");
        fields.ignored("ID");
        fields.unimplemented("Encrypt")?;
        fields.finish()?;
        Ok(Trailer { size, root, prev })
    }
}

/// The document catalog: the root of the object graph.
///
/// Only the page tree is consumed here; the raw dictionary is retained so
/// callers can inspect entries this reader does not model.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub pages: Option<ObjRef<Pages>>,
    pub dict: Dict,
}

impl Catalog {
    pub fn pages(&self) -> PdfResult<&ObjRef<Pages>> {
        self.pages.as_ref().ok_or_else(|| {
            PdfError::with_message(PdfErrorKind::MissingDictKey, "/Pages missing from Catalog")
        })
    }
}

impl FromObject for Catalog {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let resolved = resolver.resolve_object(object)?;
        let mut fields = DictReader::new(&resolved, resolver, true, "Catalog")?;
        let type_name: Option<String> = fields.optional("Type")?;
        let pages = fields.optional("Pages")?;
        fields.finish()?;

        if let Some(name) = type_name {
            if name != "Catalog" {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidSubtype,
                    format!("catalog /Type is /{}", name),
                ));
            }
        }

        let dict = match resolved {
            PdfObject::Dictionary(dict) => dict,
            other => {
                return Err(PdfError::with_message(
                    PdfErrorKind::ObjectNotDict,
                    format!("catalog is {}", other.type_name()),
                ))
            }
        };

        Ok(Catalog { pages, dict })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjId;

    #[test]
    fn trailer_requires_root() {
        let mut dict = Dict::new();
        dict.push("Size".into(), PdfObject::Integer(2));
        let object = PdfObject::Dictionary(dict);
        let err = Trailer::from_object(&object, &mut OptResolver::none(true)).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::MissingDictKey);
    }

    #[test]
    fn trailer_rejects_encryption() {
        let mut dict = Dict::new();
        dict.push("Size".into(), PdfObject::Integer(2));
        dict.push("Root".into(), PdfObject::IndirectRef(ObjId(1, 0)));
        dict.push("Encrypt".into(), PdfObject::Null);
        let object = PdfObject::Dictionary(dict);
        let err = Trailer::from_object(&object, &mut OptResolver::none(true)).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
    }

    #[test]
    fn trailer_happy_path() {
        let mut dict = Dict::new();
        dict.push("Size".into(), PdfObject::Integer(2));
        dict.push("Root".into(), PdfObject::IndirectRef(ObjId(1, 0)));
        let object = PdfObject::Dictionary(dict);
        let trailer = Trailer::from_object(&object, &mut OptResolver::none(true)).unwrap();
        assert_eq!(trailer.size, 2);
        assert_eq!(trailer.root.id(), ObjId(1, 0));
        assert!(trailer.prev.is_none());
    }

    #[test]
    fn catalog_keeps_unmodeled_entries() {
        let mut dict = Dict::new();
        dict.push("A".into(), PdfObject::Integer(1));
        let object = PdfObject::Dictionary(dict);
        let catalog = Catalog::from_object(&object, &mut OptResolver::none(true)).unwrap();
        assert!(matches!(catalog.dict.get("A"), Some(PdfObject::Integer(1))));
        assert!(catalog.pages().is_err());
    }

    #[test]
    fn catalog_type_must_match_when_present() {
        let mut dict = Dict::new();
        dict.push("Type".into(), PdfObject::Name("Page".into()));
        let object = PdfObject::Dictionary(dict);
        let err = Catalog::from_object(&object, &mut OptResolver::none(true)).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::InvalidSubtype);
    }
}
