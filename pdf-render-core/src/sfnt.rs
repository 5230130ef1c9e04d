//! SFNT (TrueType) font reader: font directory, `head`, `cmap` format 4,
//! `hhea`/`hmtx` metrics, `loca`, and simple `glyf` outlines.

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{PdfError, PdfErrorKind, PdfResult};
use crate::geom::Vec2;
use crate::path::PathBuilder;

// ── Big-endian reader ─────────────────────────────────────────────────────────

struct BeReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BeReader { data, offset: 0 }
    }

    fn at(data: &'a [u8], offset: usize) -> Self {
        BeReader { data, offset }
    }

    fn take(&mut self, n: usize) -> PdfResult<&'a [u8]> {
        let end = self.offset + n;
        if end > self.data.len() {
            return Err(PdfError::new(PdfErrorKind::SfntEof));
        }
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> PdfResult<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> PdfResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> PdfResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> PdfResult<i16> {
        Ok(self.u16()? as i16)
    }

    fn u32(&mut self) -> PdfResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> PdfResult<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

// ── Tables ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct TableRecord {
    checksum: u32,
    offset: usize,
    length: usize,
}

/// The `head` table.
#[derive(Debug, Clone)]
pub struct Head {
    pub units_per_em: u16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub index_to_loc_format: i16,
}

const HEAD_MAGIC: u32 = 0x5f0f3cf5;

/// One point of a simple glyph in font units.
#[derive(Debug, Clone, Copy)]
pub struct GlyphPoint {
    pub on_curve: bool,
    pub x: i32,
    pub y: i32,
}

/// A decoded simple glyph: contours of points plus horizontal metrics.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub contours: Vec<Vec<GlyphPoint>>,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

#[derive(Debug)]
struct CmapFormat4 {
    end_code: Vec<u16>,
    start_code: Vec<u16>,
    id_delta: Vec<u16>,
    id_range_offset: Vec<u16>,
    glyph_index_array: Vec<u16>,
}

/// A parsed font program. Holds the raw bytes plus the decoded directory
/// and metric tables; glyphs decode on demand.
#[derive(Debug)]
pub struct SfntFont {
    data: Vec<u8>,
    tables: HashMap<[u8; 4], TableRecord>,
    pub head: Head,
    num_glyphs: usize,
    loca: Vec<u32>,
    cmap: CmapFormat4,
    /// (advance_width, left_side_bearing) for the long-metric glyphs;
    /// glyphs past the end share the last advance.
    hmtx: Vec<(u16, i16)>,
    pub ascent: i16,
    pub descent: i16,
}

fn table_checksum(data: &[u8], record: &TableRecord, is_head: bool) -> PdfResult<u32> {
    let end = record.offset + record.length;
    if end > data.len() {
        return Err(PdfError::new(PdfErrorKind::SfntEof));
    }

    let mut sum: u32 = 0;
    let mut idx = 0;
    while idx < record.length {
        let mut word: u32 = 0;
        for byte_idx in 0..4 {
            let byte = if idx + byte_idx < record.length {
                // The head checksum is computed with a zeroed
                // checkSumAdjustment field.
                if is_head && (8..12).contains(&(idx + byte_idx)) {
                    0
                } else {
                    data[record.offset + idx + byte_idx]
                }
            } else {
                0
            };
            word = (word << 8) | byte as u32;
        }
        sum = sum.wrapping_add(word);
        idx += 4;
    }
    Ok(sum)
}

impl SfntFont {
    pub fn parse(data: Vec<u8>) -> PdfResult<Self> {
        let mut reader = BeReader::new(&data);

        let scaler_type = reader.u32()?;
        if scaler_type != 0x0001_0000 && scaler_type != u32::from_be_bytes(*b"OTTO") {
            return Err(PdfError::with_message(
                PdfErrorKind::SfntBadMagic,
                format!("scaler type 0x{:08x}", scaler_type),
            ));
        }

        let num_tables = reader.u16()?;
        reader.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = HashMap::new();
        for _ in 0..num_tables {
            let tag: [u8; 4] = reader.take(4)?.try_into().unwrap();
            let checksum = reader.u32()?;
            let offset = reader.u32()? as usize;
            let length = reader.u32()? as usize;
            tables.insert(
                tag,
                TableRecord {
                    checksum,
                    offset,
                    length,
                },
            );
        }

        for (tag, record) in &tables {
            let computed = table_checksum(&data, record, tag == b"head")?;
            if computed != record.checksum {
                return Err(PdfError::with_message(
                    PdfErrorKind::SfntTableChecksum,
                    format!(
                        "table {}: computed 0x{:08x}, stored 0x{:08x}",
                        String::from_utf8_lossy(tag),
                        computed,
                        record.checksum
                    ),
                ));
            }
        }
        debug!("font directory: {} tables, checksums ok", tables.len());

        let find = |tag: &[u8; 4]| -> PdfResult<TableRecord> {
            tables.get(tag).copied().ok_or_else(|| {
                PdfError::with_message(
                    PdfErrorKind::SfntMissingTable,
                    String::from_utf8_lossy(tag).into_owned(),
                )
            })
        };

        let head_record = find(b"head")?;
        let head = parse_head(&data, head_record)?;

        let hhea_record = find(b"hhea")?;
        let (ascent, descent, num_long_metrics) = parse_hhea(&data, hhea_record)?;

        let loca_record = find(b"loca")?;
        find(b"glyf")?;
        let loca = parse_loca(&data, loca_record, head.index_to_loc_format)?;
        let num_glyphs = loca.len().saturating_sub(1);

        let hmtx_record = find(b"hmtx")?;
        let hmtx = parse_hmtx(&data, hmtx_record, num_long_metrics)?;

        let cmap_record = find(b"cmap")?;
        let cmap = parse_cmap(&data, cmap_record)?;

        Ok(SfntFont {
            data,
            tables,
            head,
            num_glyphs,
            loca,
            cmap,
            hmtx,
            ascent,
            descent,
        })
    }

    pub fn num_glyphs(&self) -> usize {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    /// Character (or CID under an identity encoding) to glyph id via the
    /// format-4 subtable. Unmapped characters land on glyph 0.
    pub fn glyph_id_for_cid(&self, cid: u32) -> u16 {
        if cid > 0xffff {
            return 0;
        }
        let c = cid as u16;
        let cmap = &self.cmap;
        for seg in 0..cmap.end_code.len() {
            if cmap.end_code[seg] < c {
                continue;
            }
            if cmap.start_code[seg] > c {
                return 0;
            }
            if cmap.id_range_offset[seg] == 0 {
                return c.wrapping_add(cmap.id_delta[seg]);
            }
            let index = cmap.id_range_offset[seg] as usize / 2 + (c - cmap.start_code[seg]) as usize
                - (cmap.end_code.len() - seg);
            let glyph = match cmap.glyph_index_array.get(index) {
                Some(&g) => g,
                None => return 0,
            };
            if glyph == 0 {
                return 0;
            }
            return glyph.wrapping_add(cmap.id_delta[seg]);
        }
        0
    }

    pub fn advance_width(&self, gid: u16) -> u16 {
        match self.hmtx.get(gid as usize) {
            Some(&(advance, _)) => advance,
            None => self.hmtx.last().map(|&(advance, _)| advance).unwrap_or(0),
        }
    }

    pub fn glyph_for_cid(&self, cid: u32) -> PdfResult<Glyph> {
        self.glyph_for_gid(self.glyph_id_for_cid(cid))
    }

    /// Decode one simple glyph. Compound glyphs are rejected.
    pub fn glyph_for_gid(&self, gid: u16) -> PdfResult<Glyph> {
        if gid as usize >= self.num_glyphs {
            return Err(PdfError::with_message(
                PdfErrorKind::SfntInvalidGid,
                format!("glyph {} of {}", gid, self.num_glyphs),
            ));
        }

        let glyf = self.tables[b"glyf"];
        let start = self.loca[gid as usize] as usize;
        let end = self.loca[gid as usize + 1] as usize;

        let advance_width = self.advance_width(gid);
        let left_side_bearing = self
            .hmtx
            .get(gid as usize)
            .map(|&(_, lsb)| lsb)
            .unwrap_or(0);

        // Equal loca offsets mean a glyph with no outline.
        if start == end {
            return Ok(Glyph {
                contours: Vec::new(),
                x_min: 0,
                y_min: 0,
                x_max: 0,
                y_max: 0,
                advance_width,
                left_side_bearing,
            });
        }

        let mut reader = BeReader::at(&self.data, glyf.offset + start);
        let num_contours = reader.i16()?;
        let x_min = reader.i16()?;
        let y_min = reader.i16()?;
        let x_max = reader.i16()?;
        let y_max = reader.i16()?;

        if num_contours < 0 {
            return Err(PdfError::new(PdfErrorKind::SfntCompoundGlyph));
        }
        trace!("glyph {}: {} contours", gid, num_contours);

        let mut end_pts = Vec::with_capacity(num_contours as usize);
        for _ in 0..num_contours {
            end_pts.push(reader.u16()?);
        }
        let num_points = match end_pts.last() {
            Some(&last) => last as usize + 1,
            None => 0,
        };

        let instruction_len = reader.u16()?;
        reader.skip(instruction_len as usize)?;

        // Flags with run-length repeats.
        const ON_CURVE: u8 = 1 << 0;
        const X_SHORT: u8 = 1 << 1;
        const Y_SHORT: u8 = 1 << 2;
        const REPEAT: u8 = 1 << 3;
        const X_MODIFIER: u8 = 1 << 4;
        const Y_MODIFIER: u8 = 1 << 5;

        let mut flags = Vec::with_capacity(num_points);
        while flags.len() < num_points {
            let flag = reader.u8()?;
            flags.push(flag);
            if flag & REPEAT != 0 {
                let repetitions = reader.u8()?;
                for _ in 0..repetitions {
                    if flags.len() >= num_points {
                        break;
                    }
                    flags.push(flag);
                }
            }
        }

        // Coordinate deltas: short deltas carry their sign in the
        // modifier bit; the modifier on a long delta means "same as
        // previous" (delta zero).
        let mut xs = Vec::with_capacity(num_points);
        for &flag in &flags {
            let delta: i32 = if flag & X_SHORT != 0 {
                let magnitude = reader.u8()? as i32;
                if flag & X_MODIFIER != 0 {
                    magnitude
                } else {
                    -magnitude
                }
            } else if flag & X_MODIFIER != 0 {
                0
            } else {
                reader.i16()? as i32
            };
            xs.push(delta);
        }

        let mut ys = Vec::with_capacity(num_points);
        for &flag in &flags {
            let delta: i32 = if flag & Y_SHORT != 0 {
                let magnitude = reader.u8()? as i32;
                if flag & Y_MODIFIER != 0 {
                    magnitude
                } else {
                    -magnitude
                }
            } else if flag & Y_MODIFIER != 0 {
                0
            } else {
                reader.i16()? as i32
            };
            ys.push(delta);
        }

        let mut contours = Vec::with_capacity(num_contours as usize);
        let mut point_idx = 0usize;
        let mut x = 0i32;
        let mut y = 0i32;
        for &end_pt in &end_pts {
            let mut contour = Vec::new();
            while point_idx <= end_pt as usize {
                x += xs[point_idx];
                y += ys[point_idx];
                contour.push(GlyphPoint {
                    on_curve: flags[point_idx] & ON_CURVE != 0,
                    x,
                    y,
                });
                point_idx += 1;
            }
            contours.push(contour);
        }

        Ok(Glyph {
            contours,
            x_min,
            y_min,
            x_max,
            y_max,
            advance_width,
            left_side_bearing,
        })
    }
}

fn parse_head(data: &[u8], record: TableRecord) -> PdfResult<Head> {
    let mut reader = BeReader::at(data, record.offset);
    reader.skip(4)?; // version
    reader.skip(4)?; // fontRevision
    reader.skip(4)?; // checkSumAdjustment
    let magic = reader.u32()?;
    if magic != HEAD_MAGIC {
        return Err(PdfError::with_message(
            PdfErrorKind::SfntBadHead,
            format!("magic 0x{:08x}", magic),
        ));
    }
    reader.skip(2)?; // flags
    let units_per_em = reader.u16()?;
    reader.i64()?; // created
    reader.i64()?; // modified
    let x_min = reader.i16()?;
    let y_min = reader.i16()?;
    let x_max = reader.i16()?;
    let y_max = reader.i16()?;
    reader.skip(2)?; // macStyle
    reader.skip(2)?; // lowestRecPPEM
    reader.skip(2)?; // fontDirectionHint
    let index_to_loc_format = reader.i16()?;
    let glyph_data_format = reader.i16()?;
    if glyph_data_format != 0 {
        return Err(PdfError::with_message(
            PdfErrorKind::SfntBadHead,
            format!("glyphDataFormat {}", glyph_data_format),
        ));
    }
    if index_to_loc_format != 0 && index_to_loc_format != 1 {
        return Err(PdfError::with_message(
            PdfErrorKind::SfntBadHead,
            format!("indexToLocFormat {}", index_to_loc_format),
        ));
    }

    Ok(Head {
        units_per_em,
        x_min,
        y_min,
        x_max,
        y_max,
        index_to_loc_format,
    })
}

fn parse_hhea(data: &[u8], record: TableRecord) -> PdfResult<(i16, i16, usize)> {
    let mut reader = BeReader::at(data, record.offset);
    let version = reader.u32()?;
    if version != 0x0001_0000 {
        return Err(PdfError::with_message(
            PdfErrorKind::SfntInvalidVersion,
            format!("hhea version 0x{:08x}", version),
        ));
    }
    let ascent = reader.i16()?;
    let descent = reader.i16()?;
    reader.skip(2)?; // lineGap
    reader.skip(2)?; // advanceWidthMax
    reader.skip(2)?; // minLeftSideBearing
    reader.skip(2)?; // minRightSideBearing
    reader.skip(2)?; // xMaxExtent
    reader.skip(2)?; // caretSlopeRise
    reader.skip(2)?; // caretSlopeRun
    reader.skip(2)?; // caretOffset
    for _ in 0..4 {
        let reserved = reader.i16()?;
        if reserved != 0 {
            return Err(PdfError::new(PdfErrorKind::SfntReserved));
        }
    }
    reader.skip(2)?; // metricDataFormat
    let num_long_metrics = reader.u16()? as usize;
    Ok((ascent, descent, num_long_metrics))
}

fn parse_loca(data: &[u8], record: TableRecord, format: i16) -> PdfResult<Vec<u32>> {
    let mut reader = BeReader::at(data, record.offset);
    let mut loca = Vec::new();
    if format == 0 {
        let entries = record.length / 2;
        for _ in 0..entries {
            loca.push(reader.u16()? as u32 * 2);
        }
    } else {
        let entries = record.length / 4;
        for _ in 0..entries {
            loca.push(reader.u32()?);
        }
    }
    Ok(loca)
}

fn parse_hmtx(data: &[u8], record: TableRecord, num_long_metrics: usize) -> PdfResult<Vec<(u16, i16)>> {
    let mut reader = BeReader::at(data, record.offset);
    let mut metrics = Vec::with_capacity(num_long_metrics);
    for _ in 0..num_long_metrics {
        let advance = reader.u16()?;
        let lsb = reader.i16()?;
        metrics.push((advance, lsb));
    }
    Ok(metrics)
}

/// Encoding priority for the cmap subtable: Windows UCS-4, Windows BMP,
/// any Unicode platform, then Windows symbol.
const CMAP_PRIORITY: [(u16, Option<u16>); 4] = [(3, Some(10)), (3, Some(1)), (0, None), (3, Some(0))];

fn parse_cmap(data: &[u8], record: TableRecord) -> PdfResult<CmapFormat4> {
    let mut reader = BeReader::at(data, record.offset);
    reader.skip(2)?; // version
    let num_subtables = reader.u16()?;

    let mut headers = Vec::with_capacity(num_subtables as usize);
    for _ in 0..num_subtables {
        let platform_id = reader.u16()?;
        let encoding_id = reader.u16()?;
        let offset = reader.u32()? as usize;
        headers.push((platform_id, encoding_id, offset));
    }

    let mut selected = None;
    'priority: for (platform, encoding) in CMAP_PRIORITY {
        for &(p, e, offset) in &headers {
            if p == platform && encoding.map_or(true, |wanted| wanted == e) {
                selected = Some(offset);
                break 'priority;
            }
        }
    }
    let subtable_offset = selected.ok_or_else(|| {
        PdfError::with_message(PdfErrorKind::CmapInvalidPlatform, "no unicode subtable")
    })?;

    let mut sub = BeReader::at(data, record.offset + subtable_offset);
    let format = sub.u16()?;
    if format != 4 {
        return Err(PdfError::with_message(
            PdfErrorKind::SfntInvalidVersion,
            format!("cmap subtable format {}", format),
        ));
    }
    let length = sub.u16()? as usize;
    sub.skip(2)?; // language
    let seg_count_x2 = sub.u16()? as usize;
    let seg_count = seg_count_x2 / 2;
    sub.skip(6)?; // searchRange, entrySelector, rangeShift

    let mut end_code = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        end_code.push(sub.u16()?);
    }
    let reserved_pad = sub.u16()?;
    if reserved_pad != 0 {
        return Err(PdfError::new(PdfErrorKind::SfntReserved));
    }
    let mut start_code = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        start_code.push(sub.u16()?);
    }
    let mut id_delta = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_delta.push(sub.u16()?);
    }
    let mut id_range_offset = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_range_offset.push(sub.u16()?);
    }

    // Whatever remains of the subtable is the glyph index array.
    let consumed = 16 + seg_count * 8;
    if length < consumed {
        return Err(PdfError::new(PdfErrorKind::CmapInvalidLength));
    }
    let gia_len = (length - consumed) / 2;
    let mut glyph_index_array = Vec::with_capacity(gia_len);
    for _ in 0..gia_len {
        glyph_index_array.push(sub.u16()?);
    }

    Ok(CmapFormat4 {
        end_code,
        start_code,
        id_delta,
        id_range_offset,
        glyph_index_array,
    })
}

// ── Outline conversion ────────────────────────────────────────────────────────

/// Append a glyph's outline to `path` as quadratic bezier contours,
/// mapping each font-unit point through `transform`. Consecutive
/// off-curve points imply an on-curve midpoint.
pub fn glyph_to_path(glyph: &Glyph, path: &mut PathBuilder, transform: crate::geom::Mat3) {
    for contour in &glyph.contours {
        if contour.is_empty() {
            continue;
        }

        let point = |p: &GlyphPoint| transform.transform(Vec2::new(p.x as f64, p.y as f64));
        let mid = |a: Vec2, b: Vec2| a.lerp(b, 0.5);

        // Pick a starting on-curve point, synthesizing one between the
        // first and last points when both are off-curve.
        let n = contour.len();
        let start_idx = contour.iter().position(|p| p.on_curve);
        let start_point = match start_idx {
            Some(idx) => point(&contour[idx]),
            None => mid(point(&contour[0]), point(&contour[n - 1])),
        };
        path.move_to(start_point);

        let first = start_idx.map(|idx| idx + 1).unwrap_or(0);
        let mut pending_control: Option<Vec2> = None;
        for step in 0..n {
            let p = &contour[(first + step) % n];
            let pos = point(p);
            if p.on_curve {
                match pending_control.take() {
                    Some(control) => path.quad_bezier_to(control, pos),
                    None => path.line_to(pos),
                }
            } else if let Some(control) = pending_control.take() {
                let implied = mid(control, pos);
                path.quad_bezier_to(control, implied);
                pending_control = Some(pos);
            } else {
                pending_control = Some(pos);
            }
        }
        if let Some(control) = pending_control {
            path.quad_bezier_to(control, start_point);
        }
        path.close_contour();
    }
}
