//! # freeports
//!
//! Extract holdings tables from issuer-specific PDF financial reports.
//!
//! Every issuer ("format") lays out its reports differently, so extraction
//! is organized as a registry of per-format pipelines sharing one
//! three-stage contract: filter the relevant page blocks, extract labelled
//! text from them, tabularize the labels into typed rows.
//!
//! ## Quick Start
//!
//! ```no_run
//! use freeports::{extract_file, Targets};
//!
//! fn main() -> freeports::Result<()> {
//!     let table = extract_file("report.pdf", "EURIZON", &Targets::default())?;
//!     print!("{}", table.to_csv_string()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Data-driven formats**: anchors, selectors and fields live in a YAML
//!   format table; the bundled one covers the supported issuers
//! - **Fuzzy matching**: anchors and target issuers match on normalized,
//!   similarity-scored text
//! - **Layered configuration**: defaults, config file, environment, command
//!   line and per-job overrides
//! - **Batch mode**: a worker pool over a CSV job list with merged or
//!   per-job output, optionally archived as `.tar.gz`

pub mod batch;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod format;
pub mod job;
pub mod model;
pub mod parser;

// Re-export commonly used types
pub use batch::{BatchReport, BatchRunner, JobFailure, JobOutcome};
pub use config::{Config, ConfigResolver, Layer, OptionKey, Options};
pub use error::{Error, FailureKind, Result, Stage};
pub use extractor::Extractor;
pub use fetch::Fetcher;
pub use format::{FormatPipeline, FormatRegistry, Targets};
pub use job::JobRunner;
pub use model::{BBox, BlockKind, FieldTag, PdfBlock, Provenance, Row, Table, TextBlock, Value};
pub use parser::{LopdfRenderer, Renderer};

use std::path::Path;

/// Extract a table from a PDF file with a bundled format.
///
/// # Example
///
/// ```no_run
/// use freeports::{extract_file, Targets};
///
/// let table = extract_file("report.pdf", "ARCA", &Targets::default()).unwrap();
/// println!("{} rows", table.len());
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P, format: &str, targets: &Targets) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes, format, targets)
}

/// Extract a table from PDF bytes with a bundled format.
pub fn extract_bytes(bytes: &[u8], format: &str, targets: &Targets) -> Result<Table> {
    let registry = FormatRegistry::with_defaults()?;
    let format = registry.resolve(Some(format), None)?;
    Extractor::default().extract(bytes, format.as_ref(), targets)
}

/// Render a PDF into page blocks, as the pipelines see it.
pub fn render_blocks(bytes: &[u8]) -> Result<Vec<PdfBlock>> {
    LopdfRenderer::new().render(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bytes_rejects_garbage() {
        assert!(extract_bytes(b"not a pdf", "EURIZON", &Targets::default()).is_err());
    }

    #[test]
    fn test_extract_bytes_unknown_format() {
        assert!(matches!(
            extract_bytes(b"%PDF-1.4", "NOPE", &Targets::default()),
            Err(Error::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_render_blocks_empty_input() {
        assert!(render_blocks(&[]).is_err());
    }
}
