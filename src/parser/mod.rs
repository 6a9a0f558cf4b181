//! PDF rendering into page blocks.

mod backend;
mod layout;
mod renderer;

pub use backend::{LopdfBackend, Operand, Operation, PageId, PageRef, PdfBackend};
pub use layout::{group_spans_into_lines, LayoutAnalyzer, LayoutOptions, TextLine, TextSpan};
pub use renderer::{LopdfRenderer, Renderer};
