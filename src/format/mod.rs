//! Per-issuer extraction pipelines.
//!
//! Every format implements the three-stage [`FormatPipeline`] contract:
//!
//! 1. `filter` keeps the page blocks that carry data rows,
//! 2. `extract` labels their text with [`FieldTag`](crate::model::FieldTag)s,
//! 3. `tabularize` groups and coerces the labels into a [`Table`].
//!
//! Formats are registered once in a [`FormatRegistry`] and shared read-only.
//! The bundled formats are data ([`SpecPipeline`] over a YAML format table),
//! but any type implementing the trait can be registered.
//!
//! # Example
//!
//! ```no_run
//! use freeports::format::{FormatRegistry, Targets};
//!
//! fn main() -> freeports::Result<()> {
//!     let registry = FormatRegistry::with_defaults()?;
//!     let format = registry.resolve(None, Some("https://www.eurizoncapital.com/report.pdf"))?;
//!     println!("{} columns: {:?}", format.id(), format.columns());
//!     Ok(())
//! }
//! ```

mod extract;
mod filter;
pub mod matching;
mod pipeline;
mod registry;
mod spec;
mod tabularize;
mod targets;
pub mod value;

pub use extract::{CompiledField, ExtractRules};
pub use filter::{filter_blocks, font_matches};
pub use matching::{MatchMode, Matcher};
pub use pipeline::SpecPipeline;
pub use registry::FormatRegistry;
pub use spec::{
    AnchorSpec, Band, BodySpec, FieldSpec, FilterSpec, FormatSpec, FormatTable, Locator,
    MissingFieldPolicy, PartialRowPolicy, SectionSpec,
};
pub use tabularize::{TabularizeRules, INSTRUMENT_COLUMN};
pub use targets::Targets;
pub use value::ValueKind;

use regex::Regex;

use crate::error::Result;
use crate::model::{PdfBlock, Table, TextBlock};

/// Three-stage extraction contract implemented by every format.
///
/// Implementations must be pure: the same input blocks always produce the
/// same output, and no stage mutates its input.
pub trait FormatPipeline: Send + Sync {
    /// Format identifier, e.g. `"EURIZON"`.
    fn id(&self) -> &str;

    /// Human readable description.
    fn description(&self) -> &str {
        ""
    }

    /// URL patterns used for format inference, in priority order.
    fn url_patterns(&self) -> &[Regex];

    /// Output columns, in order.
    fn columns(&self) -> Vec<String>;

    /// Keep the blocks judged relevant, stamped with their section.
    fn filter(&self, blocks: &[PdfBlock]) -> Result<Vec<PdfBlock>>;

    /// Label the text of retained blocks.
    fn extract(&self, blocks: &[PdfBlock], targets: &Targets) -> Result<Vec<TextBlock>>;

    /// Group labelled text into typed rows.
    fn tabularize(&self, texts: &[TextBlock]) -> Result<Table>;

    /// Run all three stages.
    fn run(&self, blocks: &[PdfBlock], targets: &Targets) -> Result<Table> {
        let relevant = self.filter(blocks)?;
        log::debug!("{}: {} of {} blocks retained", self.id(), relevant.len(), blocks.len());
        let texts = self.extract(&relevant, targets)?;
        log::debug!("{}: {} text blocks extracted", self.id(), texts.len());
        let table = self.tabularize(&texts)?;
        log::info!("{}: {} rows", self.id(), table.len());
        Ok(table)
    }
}
