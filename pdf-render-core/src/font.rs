//! Font records: Type0 composite fonts with CIDFontType2 descendants,
//! CID width tables, and the embedded TrueType program.

use log::debug;

use crate::deserialize::{DictReader, FromObject, ObjRef};
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{PdfObject, Stream};
use crate::reader::{OptResolver, PdfReader};
use crate::sfnt::SfntFont;

/// The default width a CID font assumes when `/DW` is absent.
pub const DEFAULT_GLYPH_WIDTH: i32 = 1000;

// ── Widths ────────────────────────────────────────────────────────────────────

/// The `/W` array: runs `c [w1 w2 ...]` and ranges `c_first c_last w`,
/// flattened into a cid-indexed lookup table.
#[derive(Debug, Clone, Default)]
pub struct FontWidths {
    cid_to_width: Vec<Option<i32>>,
}

impl FontWidths {
    pub fn width_for_cid(&self, cid: u32) -> Option<i32> {
        self.cid_to_width.get(cid as usize).copied().flatten()
    }

    fn set(&mut self, cid: usize, width: i32) {
        if cid >= self.cid_to_width.len() {
            self.cid_to_width.resize(cid + 1, None);
        }
        self.cid_to_width[cid] = Some(width);
    }
}

impl FromObject for FontWidths {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let resolved = resolver.resolve_object(object)?;
        let PdfObject::Array(elements) = resolved else {
            return Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                "font width array must be an array",
            ));
        };

        let mut widths = FontWidths::default();
        let mut pending: Vec<i32> = Vec::new();

        for element in &elements {
            match element {
                PdfObject::Integer(value) => {
                    pending.push(*value);
                    if pending.len() == 3 {
                        // c_first c_last w
                        let (first, last, width) = (pending[0], pending[1], pending[2]);
                        if first < 0 || last < first {
                            return Err(PdfError::with_message(
                                PdfErrorKind::InvalidNumber,
                                format!("cid range {} to {}", first, last),
                            ));
                        }
                        for cid in first..=last {
                            widths.set(cid as usize, width);
                        }
                        pending.clear();
                    }
                }
                PdfObject::Array(run) => {
                    // c [w1 w2 ...]
                    if pending.len() != 1 {
                        return Err(PdfError::with_message(
                            PdfErrorKind::IncorrectType,
                            "array of widths must have exactly one preceding integer",
                        ));
                    }
                    let first = pending[0];
                    if first < 0 {
                        return Err(PdfError::new(PdfErrorKind::InvalidNumber));
                    }
                    for (offset, width) in run.iter().enumerate() {
                        let PdfObject::Integer(width) = width else {
                            return Err(PdfError::with_message(
                                PdfErrorKind::IncorrectType,
                                "widths in a run must be integers",
                            ));
                        };
                        widths.set(first as usize + offset, *width);
                    }
                    pending.clear();
                }
                other => {
                    return Err(PdfError::with_message(
                        PdfErrorKind::IncorrectType,
                        format!(
                            "only integers and arrays allowed in widths, found {}",
                            other.type_name()
                        ),
                    ))
                }
            }
        }

        Ok(widths)
    }
}

// ── Font descriptor ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FontDescriptor {
    pub font_name: String,
    pub flags: i32,
    pub font_file2: Option<ObjRef<Stream>>,
}

impl FromObject for FontDescriptor {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "FontDescriptor")?;
        let type_name: String = fields.required("Type")?;
        let font_name = fields.required("FontName")?;
        let flags = fields.required("Flags")?;
        let font_file2 = fields.optional("FontFile2")?;
        fields.ignored("FontFamily");
        fields.ignored("FontStretch");
        fields.ignored("FontWeight");
        fields.ignored("FontBBox");
        fields.ignored("ItalicAngle");
        fields.ignored("Ascent");
        fields.ignored("Descent");
        fields.ignored("Leading");
        fields.ignored("CapHeight");
        fields.ignored("XHeight");
        fields.ignored("StemV");
        fields.ignored("StemH");
        fields.ignored("AvgWidth");
        fields.ignored("MaxWidth");
        fields.ignored("MissingWidth");
        fields.unimplemented("FontFile")?;
        fields.unimplemented("FontFile3")?;
        fields.unimplemented("CharSet")?;
        fields.finish()?;

        if type_name != "FontDescriptor" {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                "`Type` must be `FontDescriptor`",
            ));
        }

        Ok(FontDescriptor {
            font_name,
            flags,
            font_file2,
        })
    }
}

// ── CID fonts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CidFont {
    pub base_font: String,
    pub descriptor: ObjRef<FontDescriptor>,
    pub widths: Option<FontWidths>,
    pub default_width: i32,
}

impl CidFont {
    pub fn glyph_width(&self, cid: u32) -> i32 {
        self.widths
            .as_ref()
            .and_then(|w| w.width_for_cid(cid))
            .unwrap_or(self.default_width)
    }
}

impl FromObject for CidFont {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "CIDFont")?;
        let type_name: String = fields.required("Type")?;
        let subtype: String = fields.required("Subtype")?;
        let base_font = fields.required("BaseFont")?;
        fields.ignored("CIDSystemInfo");
        let descriptor = fields.required("FontDescriptor")?;
        let default_width: Option<i32> = fields.optional("DW")?;
        let widths = fields.optional("W")?;
        fields.unimplemented("DW2")?;
        fields.unimplemented("W2")?;
        let cid_to_gid: Option<PdfObject> = fields.optional("CIDToGIDMap")?;
        fields.finish()?;

        if type_name != "Font" {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                "`Type` must be `Font`",
            ));
        }
        if subtype != "CIDFontType2" {
            return Err(PdfError::with_message(
                PdfErrorKind::Unimplemented,
                format!("descendant font subtype /{}", subtype),
            ));
        }
        match cid_to_gid {
            None => {}
            Some(PdfObject::Name(name)) if name == "Identity" => {}
            Some(_) => {
                return Err(PdfError::with_message(
                    PdfErrorKind::Unimplemented,
                    "non-identity CIDToGIDMap",
                ))
            }
        }

        Ok(CidFont {
            base_font,
            descriptor,
            widths,
            default_width: default_width.unwrap_or(DEFAULT_GLYPH_WIDTH),
        })
    }
}

// ── Composite fonts ───────────────────────────────────────────────────────────

/// A Type0 font with an Identity-H encoding and a CIDFontType2
/// descendant.
#[derive(Debug, Clone)]
pub struct Font {
    pub base_font: String,
    pub descendant: CidFont,
}

impl Font {
    /// Identity-H: the string is a sequence of big-endian 2-byte CIDs.
    pub fn decode_cids(text: &[u8]) -> PdfResult<Vec<u32>> {
        if text.len() % 2 != 0 {
            return Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                "CID string has an odd byte count",
            ));
        }
        Ok(text
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as u32)
            .collect())
    }

    /// Advance width for a CID in glyph-space units (1/1000 text space).
    pub fn glyph_width(&self, cid: u32) -> i32 {
        self.descendant.glyph_width(cid)
    }

    /// Resolve and parse the embedded font program.
    pub fn load_program(&self, reader: &mut PdfReader) -> PdfResult<SfntFont> {
        let descriptor = self.descendant.descriptor.resolve(reader)?;
        let stream = descriptor
            .font_file2
            .as_ref()
            .ok_or_else(|| {
                PdfError::with_message(
                    PdfErrorKind::MissingDictKey,
                    "font has no embedded /FontFile2 program",
                )
            })?
            .resolve(reader)?;
        debug!(
            "parsing embedded font program for {} ({} bytes)",
            self.base_font,
            stream.data.len()
        );
        SfntFont::parse(stream.data.clone()).ctx("embedded font program")
    }
}

impl FromObject for Font {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "Font")?;
        let type_name: String = fields.required("Type")?;
        let subtype: String = fields.required("Subtype")?;
        let base_font: String = fields.required("BaseFont")?;
        let encoding: PdfObject = fields.required("Encoding")?;
        let descendants: Vec<CidFont> = fields.required_as_array("DescendantFonts")?;
        fields.ignored("ToUnicode");
        fields.finish()?;

        if type_name != "Font" {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                "`Type` must be `Font`",
            ));
        }
        if subtype != "Type0" {
            return Err(PdfError::with_message(
                PdfErrorKind::Unimplemented,
                format!("font subtype /{}", subtype),
            ));
        }
        match encoding {
            PdfObject::Name(name) if name == "Identity-H" => {}
            _ => {
                return Err(PdfError::with_message(
                    PdfErrorKind::Unimplemented,
                    "encodings other than /Identity-H",
                ))
            }
        }

        let mut descendants = descendants;
        let descendant = match descendants.len() {
            1 => descendants.remove(0),
            count => {
                return Err(PdfError::with_message(
                    PdfErrorKind::IncorrectType,
                    format!("DescendantFonts has {} entries, expected 1", count),
                ))
            }
        };

        Ok(Font {
            base_font,
            descendant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn widths_from(elements: Vec<PdfObject>) -> PdfResult<FontWidths> {
        let object = PdfObject::Array(elements);
        FontWidths::from_object(&object, &mut OptResolver::none(true))
    }

    #[test]
    fn width_runs() {
        let widths = widths_from(vec![
            PdfObject::Integer(5),
            PdfObject::Array(vec![
                PdfObject::Integer(500),
                PdfObject::Integer(600),
                PdfObject::Integer(700),
            ]),
        ])
        .unwrap();
        assert_eq!(widths.width_for_cid(5), Some(500));
        assert_eq!(widths.width_for_cid(6), Some(600));
        assert_eq!(widths.width_for_cid(7), Some(700));
        assert_eq!(widths.width_for_cid(4), None);
        assert_eq!(widths.width_for_cid(8), None);
    }

    #[test]
    fn width_ranges() {
        let widths = widths_from(vec![
            PdfObject::Integer(10),
            PdfObject::Integer(12),
            PdfObject::Integer(450),
        ])
        .unwrap();
        assert_eq!(widths.width_for_cid(10), Some(450));
        assert_eq!(widths.width_for_cid(11), Some(450));
        assert_eq!(widths.width_for_cid(12), Some(450));
        assert_eq!(widths.width_for_cid(13), None);
    }

    #[test]
    fn width_runs_and_ranges_mix() {
        let widths = widths_from(vec![
            PdfObject::Integer(1),
            PdfObject::Array(vec![PdfObject::Integer(100)]),
            PdfObject::Integer(3),
            PdfObject::Integer(4),
            PdfObject::Integer(200),
        ])
        .unwrap();
        assert_eq!(widths.width_for_cid(1), Some(100));
        assert_eq!(widths.width_for_cid(2), None);
        assert_eq!(widths.width_for_cid(3), Some(200));
        assert_eq!(widths.width_for_cid(4), Some(200));
    }

    #[test]
    fn width_array_needs_leading_cid() {
        let err = widths_from(vec![PdfObject::Array(vec![PdfObject::Integer(1)])])
            .unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::IncorrectType);
    }

    #[test]
    fn cid_decoding_is_big_endian_pairs() {
        assert_eq!(
            Font::decode_cids(&[0x00, 0x48, 0x01, 0x02]).unwrap(),
            vec![0x48, 0x0102]
        );
        assert!(Font::decode_cids(&[0x00]).is_err());
    }

    #[test]
    fn type0_requires_identity_encoding() {
        let mut dict = Dict::new();
        dict.push("Type".into(), PdfObject::Name("Font".into()));
        dict.push("Subtype".into(), PdfObject::Name("Type0".into()));
        dict.push("BaseFont".into(), PdfObject::Name("Test".into()));
        dict.push("Encoding".into(), PdfObject::Name("Identity-V".into()));
        dict.push("DescendantFonts".into(), PdfObject::Array(vec![]));
        let object = PdfObject::Dictionary(dict);
        let err = Font::from_object(&object, &mut OptResolver::none(true)).unwrap_err();
        assert_eq!(err.kind(), PdfErrorKind::Unimplemented);
    }
}
