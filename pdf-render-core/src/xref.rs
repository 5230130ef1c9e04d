use std::rc::Rc;

use log::{debug, trace};

use crate::ctx::Ctx;
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::object::{ObjId, PdfObject};

/// One row of the table. Parsed objects are cached here so every
/// resolution of the same (id, gen) returns the same value.
#[derive(Debug, Clone)]
pub struct XrefEntry {
    pub offset: usize,
    pub generation: u32,
    pub in_use: bool,
    pub object: Option<Rc<PdfObject>>,
}

/// A contiguous run of object numbers. Entry rows are fixed-width
/// (20 bytes) and are materialized lazily on first lookup.
#[derive(Debug)]
struct Subsection {
    start_offset: usize,
    first_object: u32,
    num_entries: u32,
    entries: Vec<Option<XrefEntry>>,
}

/// The cross-reference table: an ordered list of subsections.
#[derive(Debug)]
pub struct XrefTable {
    subsections: Vec<Subsection>,
}

/// Subsection header line: `first_object num_entries`.
fn parse_subsection_header(ctx: &mut Ctx) -> PdfResult<(u64, u64, usize)> {
    let (first_object, digits) = ctx.parse_int(None)?;
    if digits == 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidXref,
            "expected the object number of the first object",
        ));
    }
    ctx.expect(" ")?;

    let (num_objects, digits) = ctx.parse_int(None)?;
    if digits == 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidXref,
            "expected the subsection entry count",
        ));
    }

    ctx.seek_next_line()?;
    Ok((first_object, num_objects, ctx.offset()))
}

/// One 20-byte entry row: 10-digit offset, space, 5-digit generation,
/// space, `n` or `f`, two terminator bytes.
fn parse_entry(ctx: &mut Ctx, entry_offset: usize) -> PdfResult<XrefEntry> {
    ctx.seek(entry_offset)?;
    ctx.seek_line_start()?;
    if ctx.offset() != entry_offset {
        return Err(PdfError::with_message(
            PdfErrorKind::InvalidXref,
            "xref entry not aligned to line start",
        ));
    }

    let (offset, _) = ctx.parse_int(Some(10))?;
    ctx.expect(" ")?;
    let (generation, _) = ctx.parse_int(Some(5))?;
    ctx.expect(" ")?;
    let in_use = match ctx.peek_and_advance()? {
        b'n' => true,
        b'f' => false,
        other => {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidXref,
                format!("entry flag 0x{:02x} is neither `n` nor `f`", other),
            ))
        }
    };

    Ok(XrefEntry {
        offset: offset as usize,
        generation: generation as u32,
        in_use,
        object: None,
    })
}

impl XrefTable {
    /// Parse the section at `xrefstart`: the `xref` keyword, then
    /// subsection headers until one fails to parse (at which point the
    /// trailer follows).
    pub fn parse_section(ctx: &mut Ctx, xrefstart: usize) -> PdfResult<Self> {
        ctx.seek(xrefstart)?;
        ctx.expect("xref").ctx("xref keyword")?;
        ctx.seek(xrefstart)?;
        ctx.seek_next_line()?;

        let mut subsections: Vec<Subsection> = Vec::new();
        loop {
            trace!("parsing xref subsection {}", subsections.len());

            let (first_object, num_objects, start) = match parse_subsection_header(ctx) {
                Ok(header) => header,
                Err(err) => {
                    if subsections.is_empty() {
                        return Err(err.push_ctx("first xref subsection header"));
                    }
                    break;
                }
            };

            debug!(
                "xref subsection {}: start={}, first_object={}, num_objects={}",
                subsections.len(),
                start,
                first_object,
                num_objects
            );

            subsections.push(Subsection {
                start_offset: start,
                first_object: first_object as u32,
                num_entries: num_objects as u32,
                entries: Vec::new(),
            });

            // Hop over the fixed-width entry block to the next header.
            ctx.seek(start + 20 * num_objects as usize - 2)
                .with_ctx(|| {
                    format!(
                        "seeking past subsection at {} with {} entries",
                        start, num_objects
                    )
                })?;
            if ctx.seek_next_line().is_err() {
                break;
            }
        }

        Ok(XrefTable { subsections })
    }

    /// Look up (and lazily parse) the entry covering `id`, checking the
    /// generation number.
    pub fn entry_mut(&mut self, ctx: &mut Ctx, id: ObjId) -> PdfResult<&mut XrefEntry> {
        for subsection in &mut self.subsections {
            let first = subsection.first_object;
            if id.0 < first || id.0 >= first + subsection.num_entries {
                continue;
            }

            if subsection.entries.is_empty() {
                subsection
                    .entries
                    .resize(subsection.num_entries as usize, None);
            }

            let index = (id.0 - first) as usize;
            if subsection.entries[index].is_none() {
                trace!("parsing xref entry for object {}", id.0);
                let entry = parse_entry(ctx, subsection.start_offset + 20 * index)
                    .with_ctx(|| format!("xref entry for object {}", id.0))?;
                subsection.entries[index] = Some(entry);
            }

            let entry = subsection.entries[index].as_mut().unwrap();
            if entry.generation != id.1 as u32 {
                return Err(PdfError::with_message(
                    PdfErrorKind::XrefGenerationMismatch,
                    format!("entry generation {}, requested {}", entry.generation, id.1),
                ));
            }
            return Ok(entry);
        }

        Err(PdfError::with_message(
            PdfErrorKind::InvalidXrefReference,
            format!("object {} not covered by any subsection", id.0),
        ))
    }
}
