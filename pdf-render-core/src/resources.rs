use crate::deserialize::{DictReader, FromObject, ObjRef};
use crate::error::{PdfError, PdfErrorKind, PdfResult};
use crate::font::Font;
use crate::object::PdfObject;
use crate::reader::OptResolver;

/// A page's resource dictionary. Only the font map is modeled; the other
/// categories are recognized and skipped.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    /// Resource name (e.g. "F0") to font reference.
    pub fonts: Vec<(String, ObjRef<Font>)>,
}

impl Resources {
    pub fn font(&self, name: &str) -> Option<&ObjRef<Font>> {
        self.fonts
            .iter()
            .find(|(font_name, _)| font_name == name)
            .map(|(_, font)| font)
    }
}

impl FromObject for Resources {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "Resources")?;
        fields.ignored("ExtGState");
        fields.ignored("ColorSpace");
        fields.ignored("Pattern");
        fields.ignored("Shading");
        fields.ignored("XObject");
        fields.ignored("ProcSet");
        fields.ignored("Properties");
        let fonts = fields
            .optional_with("Font", |font_dict, resolver| {
                // The font map may itself sit behind a reference; each
                // value must be one.
                let resolved = resolver.resolve_object(font_dict)?;
                let PdfObject::Dictionary(dict) = resolved else {
                    return Err(PdfError::with_message(
                        PdfErrorKind::IncorrectType,
                        format!("/Font is {}", resolved.type_name()),
                    ));
                };
                let mut fonts = Vec::with_capacity(dict.len());
                for (name, value) in dict.iter() {
                    let font_ref = ObjRef::<Font>::from_object(value, resolver)?;
                    fonts.push((name.to_string(), font_ref));
                }
                Ok(fonts)
            })?
            .unwrap_or_default();
        fields.finish()?;

        Ok(Resources { fonts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Dict, ObjId};

    #[test]
    fn font_map_records_references() {
        let mut font_dict = Dict::new();
        font_dict.push("F0".into(), PdfObject::IndirectRef(ObjId(7, 0)));
        font_dict.push("F1".into(), PdfObject::IndirectRef(ObjId(9, 0)));

        let mut dict = Dict::new();
        dict.push("Font".into(), PdfObject::Dictionary(font_dict));
        let object = PdfObject::Dictionary(dict);

        let resources =
            Resources::from_object(&object, &mut OptResolver::none(true)).unwrap();
        assert_eq!(resources.fonts.len(), 2);
        assert_eq!(resources.font("F0").unwrap().id(), ObjId(7, 0));
        assert!(resources.font("F9").is_none());
    }

    #[test]
    fn unknown_resource_category_rejected() {
        let mut dict = Dict::new();
        dict.push("Bogus".into(), PdfObject::Null);
        let object = PdfObject::Dictionary(dict);
        let err =
            Resources::from_object(&object, &mut OptResolver::none(true)).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::UnknownKey);
    }
}
