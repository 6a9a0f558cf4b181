//! Data model shared by every pipeline stage.
//!
//! Renderers produce [`PdfBlock`]s, the extract stage turns retained blocks
//! into tagged [`TextBlock`]s and the tabularize stage groups those into a
//! [`Table`]. All types are plain serializable values.

mod block;
mod table;
mod text;

pub use block::{sort_reading_order, BBox, BlockKind, PdfBlock};
pub use table::{Row, Table, Value};
pub use text::{FieldTag, Provenance, TextBlock};
