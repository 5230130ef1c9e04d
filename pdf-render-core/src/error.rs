use std::fmt;
use std::panic::Location;

// ── Error kinds ───────────────────────────────────────────────────────────────

/// Every failure the library can produce, grouped by producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfErrorKind {
    // Byte cursor
    CtxEof,
    CtxExpect,
    CtxScanLimit,
    CtxBorrowed,
    CtxNotBorrowed,

    // Codec
    BitstreamEod,
    ZlibInvalidCm,
    ZlibReservedCm,
    ZlibInvalidFcheck,
    ZlibInvalidChecksum,
    DeflateLenComplement,
    DeflateInvalidBlockType,
    DeflateInvalidSymbol,
    DeflateBackrefRange,
    AsciiHexInvalid,
    Ascii85Invalid,

    // PDF grammar and object graph
    InvalidVersion,
    InvalidTrailer,
    InvalidStartxref,
    InvalidXref,
    InvalidXrefReference,
    XrefGenerationMismatch,
    InvalidObject,
    InvalidNumber,
    NumberLimit,
    UnbalancedString,
    NameBadCharCode,
    StreamInvalidLength,
    ObjectNotDict,
    MissingDictKey,
    UnknownKey,
    DuplicateKey,
    IncorrectType,
    InvalidSubtype,
    UnknownFilter,
    UnknownOperator,
    MissingOperand,
    ExcessOperand,
    PageTreeTooDeep,
    Unimplemented,

    // SFNT fonts
    SfntEof,
    SfntBadMagic,
    SfntBadHead,
    SfntMissingTable,
    SfntTableChecksum,
    SfntReserved,
    SfntInvalidVersion,
    SfntInvalidGid,
    SfntCompoundGlyph,
    CmapInvalidPlatform,
    CmapInvalidLength,

    // PostScript calculator functions
    PostscriptSyntax,
    PostscriptInvalidRadix,
    PostscriptStackUnderflow,
    PostscriptTypeMismatch,
    PostscriptUndefinedName,
    PostscriptRangeCheck,
    PostscriptUnmatched,

    // Rendering
    RenderStateUnderflow,
    RenderMissingResource,
    RenderUnsupported,
}

impl PdfErrorKind {
    fn describe(self) -> &'static str {
        use PdfErrorKind::*;
        match self {
            CtxEof => "unexpected end of input",
            CtxExpect => "expected bytes not found",
            CtxScanLimit => "backward scan exceeded its limit",
            CtxBorrowed => "byte context is already borrowed",
            CtxNotBorrowed => "byte context was not borrowed",
            BitstreamEod => "bit stream ended mid-read",
            ZlibInvalidCm => "zlib compression method is not deflate",
            ZlibReservedCm => "zlib compression method 15 is reserved",
            ZlibInvalidFcheck => "zlib header check failed",
            ZlibInvalidChecksum => "adler-32 of decoded data does not match",
            DeflateLenComplement => "stored block length complement mismatch",
            DeflateInvalidBlockType => "deflate block type 3 is invalid",
            DeflateInvalidSymbol => "invalid huffman symbol",
            DeflateBackrefRange => "back-reference outside the output window",
            AsciiHexInvalid => "invalid character in ASCIIHex stream",
            Ascii85Invalid => "invalid character in ASCII85 stream",
            InvalidVersion => "unsupported PDF version",
            InvalidTrailer => "malformed or missing trailer",
            InvalidStartxref => "malformed or missing startxref",
            InvalidXref => "malformed cross-reference table",
            InvalidXrefReference => "object not covered by the xref table",
            XrefGenerationMismatch => "generation number does not match xref entry",
            InvalidObject => "malformed object",
            InvalidNumber => "malformed number",
            NumberLimit => "number exceeds implementation limits",
            UnbalancedString => "unbalanced parentheses in literal string",
            NameBadCharCode => "invalid #-escape in name",
            StreamInvalidLength => "stream Length does not match its data",
            ObjectNotDict => "expected a dictionary",
            MissingDictKey => "required dictionary key is missing",
            UnknownKey => "unknown dictionary key",
            DuplicateKey => "duplicate dictionary key",
            IncorrectType => "object has the wrong type",
            InvalidSubtype => "invalid Type or Subtype value",
            UnknownFilter => "unsupported stream filter",
            UnknownOperator => "unknown content-stream operator",
            MissingOperand => "operator is missing operands",
            ExcessOperand => "operator received excess operands",
            PageTreeTooDeep => "page tree exceeds maximum depth",
            Unimplemented => "feature is not implemented",
            SfntEof => "font program ended unexpectedly",
            SfntBadMagic => "font program has an unknown magic number",
            SfntBadHead => "head table is malformed",
            SfntMissingTable => "required font table is missing",
            SfntTableChecksum => "font table checksum mismatch",
            SfntReserved => "reserved font field has a nonzero value",
            SfntInvalidVersion => "unsupported font table version",
            SfntInvalidGid => "glyph id out of range",
            SfntCompoundGlyph => "compound glyphs are not supported",
            CmapInvalidPlatform => "no usable cmap encoding",
            CmapInvalidLength => "cmap subtable length is inconsistent",
            PostscriptSyntax => "invalid postscript token",
            PostscriptInvalidRadix => "radix number base out of range",
            PostscriptStackUnderflow => "postscript stack underflow",
            PostscriptTypeMismatch => "postscript operand has the wrong type",
            PostscriptUndefinedName => "postscript name is not defined",
            PostscriptRangeCheck => "postscript operand out of range",
            PostscriptUnmatched => "unmatched postscript bracket",
            RenderStateUnderflow => "graphics state stack underflow",
            RenderMissingResource => "resource is not present on the page",
            RenderUnsupported => "rendering feature is not supported",
        }
    }
}

// ── Error chain ───────────────────────────────────────────────────────────────

/// One propagation step: where context was added and, optionally, what the
/// caller wanted to say about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorFrame {
    pub file: &'static str,
    pub line: u32,
    pub message: Option<String>,
}

/// A typed error code plus the chain of context frames collected while the
/// failure propagated toward the entry point. Frames are ordered deepest
/// first.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfError {
    kind: PdfErrorKind,
    frames: Vec<ErrorFrame>,
}

impl PdfError {
    #[track_caller]
    pub fn new(kind: PdfErrorKind) -> Self {
        let loc = Location::caller();
        PdfError {
            kind,
            frames: vec![ErrorFrame {
                file: loc.file(),
                line: loc.line(),
                message: None,
            }],
        }
    }

    #[track_caller]
    pub fn with_message(kind: PdfErrorKind, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        PdfError {
            kind,
            frames: vec![ErrorFrame {
                file: loc.file(),
                line: loc.line(),
                message: Some(message.into()),
            }],
        }
    }

    pub fn kind(&self) -> PdfErrorKind {
        self.kind
    }

    pub fn frames(&self) -> &[ErrorFrame] {
        &self.frames
    }

    /// Append a propagation frame. Consumes and returns self so it composes
    /// with `map_err`.
    #[track_caller]
    pub fn push_ctx(mut self, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        self.frames.push(ErrorFrame {
            file: loc.file(),
            line: loc.line(),
            message: Some(message.into()),
        });
        self
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.describe())?;
        for frame in &self.frames {
            write!(f, "\n  at {}:{}", frame.file, frame.line)?;
            if let Some(msg) = &frame.message {
                write!(f, ": {}", msg)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PdfError {}

pub type PdfResult<T> = Result<T, PdfError>;

/// Context-adding adapters for `PdfResult`, the propagation idiom used
/// throughout the crate: `fallible()?` becomes
/// `fallible().ctx("while doing x")?`.
pub trait ResultExt<T> {
    #[track_caller]
    fn ctx(self, message: &str) -> PdfResult<T>;

    #[track_caller]
    fn with_ctx(self, message: impl FnOnce() -> String) -> PdfResult<T>;
}

impl<T> ResultExt<T> for PdfResult<T> {
    #[track_caller]
    fn ctx(self, message: &str) -> PdfResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.push_ctx(message)),
        }
    }

    #[track_caller]
    fn with_ctx(self, message: impl FnOnce() -> String) -> PdfResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.push_ctx(message())),
        }
    }
}
