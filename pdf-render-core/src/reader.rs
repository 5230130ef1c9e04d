use std::rc::Rc;

use log::{debug, info, trace};

use crate::catalog::{Catalog, Trailer};
use crate::ctx::Ctx;
use crate::deserialize::FromObject;
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{ObjId, PdfObject};
use crate::parser::parse_object;
use crate::xref::XrefTable;

// ── Header and startxref ──────────────────────────────────────────────────────

/// The first line of the file is `%PDF-1.N` with N between 0 and 7.
fn parse_header(ctx: &mut Ctx) -> PdfResult<u8> {
    ctx.expect("%PDF-1.").ctx("file header")?;
    let version_byte = ctx.peek_and_advance()?;
    if !(b'0'..=b'7').contains(&version_byte) {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidVersion,
            "only PDF versions 1.0 to 1.7 supported",
        ));
    }
    Ok(version_byte - b'0')
}

/// The last line holds `%%EOF`; the two lines before it hold the byte
/// offset of the last xref section and the `startxref` keyword.
fn parse_startxref(ctx: &mut Ctx) -> PdfResult<usize> {
    ctx.seek(ctx.len())?;
    ctx.backscan("%%EOF", 32).ctx("locating %%EOF")?;

    let eof_marker = ctx.offset();
    ctx.seek_line_start()?;
    if ctx.offset() != eof_marker {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidTrailer,
            "EOF marker not aligned to start of line",
        ));
    }

    ctx.shift(-1)?;
    ctx.seek_line_start()?;
    let (offset, digits) = ctx.parse_int(None)?;
    if digits == 0 {
        return Err(PdfError::new(PdfErrorKind::InvalidStartxref));
    }

    ctx.seek_line_start()?;
    ctx.shift(-1)?;
    ctx.seek_line_start()?;
    ctx.expect("startxref").ctx("startxref keyword line")?;

    Ok(offset as usize)
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads an existing PDF from a byte buffer.
///
/// `PdfReader` is the single entry point for dereferencing: it owns the
/// bytes, the cross-reference table, and the cached trailer and catalog.
/// Objects parse on demand and are cached on their xref entries, so
/// resolving the same (id, gen) twice returns the same value.
#[derive(Debug)]
pub struct PdfReader {
    data: Rc<Vec<u8>>,
    version: u8,
    startxref: usize,
    xref: XrefTable,
    trailer: Option<Rc<Trailer>>,
    catalog: Option<Rc<Catalog>>,
}

impl PdfReader {
    /// Parse a PDF from raw bytes: header, `startxref`, and the xref
    /// section headers. Everything else is parsed lazily.
    pub fn from_bytes(data: Vec<u8>) -> PdfResult<Self> {
        let data = Rc::new(data);
        let mut ctx = Ctx::new(&data);

        let version = parse_header(&mut ctx)?;
        info!("file version 1.{}", version);

        let startxref = parse_startxref(&mut ctx)?;
        debug!("startxref: {}", startxref);

        let xref = XrefTable::parse_section(&mut ctx, startxref)
            .ctx("parsing the cross-reference table")?;
        drop(ctx);

        Ok(PdfReader {
            data,
            version,
            startxref,
            xref,
            trailer: None,
            catalog: None,
        })
    }

    /// PDF version minor number (e.g. 7 for a 1.7 file).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// The trailer dictionary, parsed once and cached.
    ///
    /// Located by scanning backward line by line from the end of the file
    /// for a line beginning `trailer`; the dictionary follows on the next
    /// line.
    pub fn trailer(&mut self) -> PdfResult<Rc<Trailer>> {
        if let Some(trailer) = &self.trailer {
            return Ok(Rc::clone(trailer));
        }

        let data = Rc::clone(&self.data);
        let mut ctx = Ctx::new(&data);
        ctx.seek(ctx.len())?;
        ctx.seek_line_start()?;
        while ctx.expect("trailer").is_err() {
            if ctx.offset() == 0 {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidTrailer,
                    "no line beginning `trailer`",
                ));
            }
            ctx.shift(-1)?;
            ctx.seek_line_start()?;
        }
        ctx.seek_next_line()?;

        let dict = parse_object(&mut ctx, &mut OptResolver::some(self), false)
            .ctx("trailer dictionary")?;
        let trailer = Rc::new(
            Trailer::from_object(&dict, &mut OptResolver::some(self))
                .ctx("deserializing the trailer")?,
        );
        self.trailer = Some(Rc::clone(&trailer));
        Ok(trailer)
    }

    /// The document catalog, resolved through the trailer's Root
    /// reference and cached.
    pub fn catalog(&mut self) -> PdfResult<Rc<Catalog>> {
        if let Some(catalog) = &self.catalog {
            return Ok(Rc::clone(catalog));
        }
        let trailer = self.trailer()?;
        let catalog = trailer.root.resolve(self).ctx("resolving the catalog")?;
        self.catalog = Some(Rc::clone(&catalog));
        Ok(catalog)
    }

    /// Resolve `(id, gen)` through the xref table: seek the entry's byte
    /// offset and parse the indirect object there. The parsed object is
    /// cached on the entry.
    pub fn resolve_ref(&mut self, id: ObjId) -> PdfResult<Rc<PdfObject>> {
        let (offset, cached) = {
            let data = Rc::clone(&self.data);
            let mut ctx = Ctx::new(&data);
            let entry = self.xref.entry_mut(&mut ctx, id)?;
            if !entry.in_use {
                return Err(PdfError::with_message(
                    PdfErrorKind::InvalidXrefReference,
                    format!("object {} is free", id),
                ));
            }
            (entry.offset, entry.object.clone())
        };

        if let Some(object) = cached {
            trace!("xref cache hit for {} R", id);
            return Ok(object);
        }

        let object = Rc::new(
            self.parse_at(offset)
                .with_ctx(|| format!("object {} R at offset {}", id, offset))?,
        );

        let data = Rc::clone(&self.data);
        let mut ctx = Ctx::new(&data);
        let entry = self.xref.entry_mut(&mut ctx, id)?;
        entry.object = Some(Rc::clone(&object));
        Ok(object)
    }

    /// Parse one object at an absolute byte offset.
    fn parse_at(&mut self, offset: usize) -> PdfResult<PdfObject> {
        let data = Rc::clone(&self.data);
        let mut ctx = Ctx::new(&data);
        ctx.seek(offset)?;
        parse_object(&mut ctx, &mut OptResolver::some(self), true)
    }
}

// ── Optional resolver ─────────────────────────────────────────────────────────

/// A resolver that may be absent, plus the unwrap-indirect-objects switch.
/// Deserialization paths that never touch the file (content-stream
/// operands, tests) run with `OptResolver::none`.
#[derive(Debug)]
pub struct OptResolver<'r> {
    reader: Option<&'r mut PdfReader>,
    pub unwrap_indirect: bool,
}

impl<'r> OptResolver<'r> {
    pub fn some(reader: &'r mut PdfReader) -> Self {
        OptResolver {
            reader: Some(reader),
            unwrap_indirect: true,
        }
    }

    pub fn none(unwrap_indirect: bool) -> Self {
        OptResolver {
            reader: None,
            unwrap_indirect,
        }
    }

    pub fn is_present(&self) -> bool {
        self.reader.is_some()
    }

    pub fn reader(&mut self) -> Option<&mut PdfReader> {
        self.reader.as_deref_mut()
    }

    /// If the object is an indirect object and unwrapping is on, recurse
    /// on its inner object; if it is an indirect reference and a reader is
    /// present, resolve and recurse; otherwise return it as-is.
    pub fn resolve_object(&mut self, object: &PdfObject) -> PdfResult<PdfObject> {
        match object {
            PdfObject::IndirectObject { inner, .. } if self.unwrap_indirect => {
                trace!("unwrapping indirect object");
                self.resolve_object(inner)
            }
            PdfObject::IndirectRef(id) => {
                if let Some(reader) = self.reader.as_deref_mut() {
                    trace!("resolving indirect reference {} R", id);
                    let resolved = reader.resolve_ref(*id)?;
                    self.resolve_object(&resolved)
                } else {
                    Ok(object.clone())
                }
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_versions() {
        let mut ctx = Ctx::new(b"%PDF-1.5");
        assert_eq!(parse_header(&mut ctx).unwrap(), 5);

        let mut ctx = Ctx::new(b"hello");
        assert_eq!(
            parse_header(&mut ctx).unwrap_err().kind(),
            PdfErrorKind::CtxExpect
        );

        let mut ctx = Ctx::new(b"%PDF-1.f");
        assert_eq!(
            parse_header(&mut ctx).unwrap_err().kind(),
            PdfErrorKind::InvalidVersion
        );
    }

    #[test]
    fn startxref_accepts_valid() {
        let mut ctx = Ctx::new(b"startxref\n4325\n%%EOF");
        assert_eq!(parse_startxref(&mut ctx).unwrap(), 4325);
    }

    #[test]
    fn startxref_rejects_empty_offset() {
        let mut ctx = Ctx::new(b"startxref\n\n%%EOF");
        assert_eq!(
            parse_startxref(&mut ctx).unwrap_err().kind(),
            PdfErrorKind::InvalidStartxref
        );
    }

    #[test]
    fn startxref_rejects_signed_offset() {
        let mut ctx = Ctx::new(b"startxref\n+435\n%%EOF");
        assert_eq!(
            parse_startxref(&mut ctx).unwrap_err().kind(),
            PdfErrorKind::InvalidStartxref
        );
    }

    #[test]
    fn startxref_rejects_wrong_keyword() {
        let mut ctx = Ctx::new(b"notstartxref\n4325\n%%EOF");
        assert_eq!(
            parse_startxref(&mut ctx).unwrap_err().kind(),
            PdfErrorKind::CtxExpect
        );
    }
}
