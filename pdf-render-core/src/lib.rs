pub mod bmp;
pub mod canvas;
pub mod catalog;
pub mod codec;
pub mod content;
pub mod ctx;
pub mod dcel;
pub mod deserialize;
pub mod error;
pub mod font;
pub mod function;
pub mod geom;
pub mod object;
pub mod page;
pub mod parser;
pub mod path;
pub mod postscript;
pub mod reader;
pub mod render;
pub mod resources;
pub mod sfnt;
pub mod xref;

pub use canvas::{Brush, Canvas, LineCap, LineJoin, Rgba};
pub use catalog::{Catalog, Trailer};
pub use content::{ContentOp, ContentStream, Operator};
pub use dcel::FillRule;
pub use error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
pub use function::Function;
pub use geom::{Mat3, Rect, Vec2};
pub use object::{Dict, Number, ObjId, PdfObject, PdfString, Stream};
pub use page::{Page, PageIter, Pages};
pub use path::{PathBuilder, PathOptions, Segment};
pub use reader::{OptResolver, PdfReader};
pub use render::{render_page, RenderOptions};
pub use resources::Resources;
pub use sfnt::SfntFont;
