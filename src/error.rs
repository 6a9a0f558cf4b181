//! Error types for the freeports library.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Layer;
use crate::model::Provenance;

/// Result type alias for freeports operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while resolving configuration or extracting a report.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An option value could not be coerced by one configuration layer.
    #[error("Invalid option {key} from {layer}: {reason}")]
    InvalidOption {
        /// Option name (e.g. `SAVE_PDF`)
        key: String,
        /// Layer the value came from
        layer: Layer,
        /// Why the value was rejected
        reason: String,
    },

    /// The fully layered configuration violates a cross-option rule.
    #[error("Inconsistent configuration: {0}")]
    ConfigurationInconsistent(String),

    /// An explicit format identifier is not registered.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// No format was given and none could be inferred from the URL.
    #[error("Cannot infer format: {0}")]
    FormatInferenceFailed(String),

    /// A required anchor (or section label) was not located in the document.
    #[error("Expected PDF block not found: {anchor}")]
    ExpectedPdfBlockNotFound {
        /// Name of the anchor that matched nothing
        anchor: String,
    },

    /// A required field could not be located inside a retained block.
    #[error("Expected field `{field}` not found in {provenance}")]
    ExpectedTextBlockNotFound {
        /// Output column of the missing field
        field: String,
        /// Source block of the failed lookup
        provenance: Provenance,
    },

    /// Downloading a remote report failed.
    #[error("Download of {url} failed: {reason}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Transport or HTTP status description
        reason: String,
    },

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// The format table is malformed (bad regex, duplicate identifier, ...).
    #[error("Invalid format table: {0}")]
    FormatTable(String),

    /// Error reading or writing CSV data.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing YAML data.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl Error {
    /// Build an [`Error::InvalidOption`].
    pub fn invalid_option(key: impl Into<String>, layer: Layer, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.into(),
            layer,
            reason: reason.into(),
        }
    }

    /// Coarse classification used when a failure is recorded against a batch job.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::InvalidOption { .. } => FailureKind::InvalidOption,
            Error::ConfigurationInconsistent(_) => FailureKind::ConfigurationInconsistent,
            Error::UnknownFormat(_) => FailureKind::UnknownFormat,
            Error::FormatInferenceFailed(_) => FailureKind::FormatInferenceFailed,
            Error::ExpectedPdfBlockNotFound { .. } => FailureKind::ExpectedPdfBlockNotFound,
            Error::ExpectedTextBlockNotFound { .. } => FailureKind::ExpectedTextBlockNotFound,
            Error::Fetch { .. } => FailureKind::Fetch,
            Error::PdfParse(_) | Error::PageOutOfRange(..) => FailureKind::Render,
            Error::Io(_) | Error::Csv(_) => FailureKind::Io,
            Error::Yaml(_) | Error::FormatTable(_) | Error::Other(_) => FailureKind::Other,
        }
    }

    /// The processing stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidOption { .. } | Error::ConfigurationInconsistent(_) | Error::Yaml(_) => {
                Stage::Configuration
            }
            Error::UnknownFormat(_) | Error::FormatInferenceFailed(_) | Error::FormatTable(_) => {
                Stage::FormatResolution
            }
            Error::Fetch { .. } => Stage::Acquire,
            Error::PdfParse(_) | Error::PageOutOfRange(..) => Stage::Render,
            Error::ExpectedPdfBlockNotFound { .. } => Stage::Filter,
            Error::ExpectedTextBlockNotFound { .. } => Stage::Extract,
            Error::Csv(_) => Stage::Output,
            Error::Io(_) | Error::Other(_) => Stage::Io,
        }
    }

    /// Prefix a configuration error's message with the 1-based job it came from.
    pub fn for_job(self, job: usize) -> Self {
        match self {
            Error::InvalidOption { key, layer, reason } => Error::InvalidOption {
                key,
                layer,
                reason: format!("job {}: {}", job, reason),
            },
            Error::ConfigurationInconsistent(msg) => {
                Error::ConfigurationInconsistent(format!("job {}: {}", job, msg))
            }
            other => other,
        }
    }

    /// Whether the error is a configuration error that must stop the run before extraction.
    pub fn is_configuration(&self) -> bool {
        self.stage() == Stage::Configuration
    }
}

/// Serializable failure classification, see [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidOption,
    ConfigurationInconsistent,
    UnknownFormat,
    FormatInferenceFailed,
    ExpectedPdfBlockNotFound,
    ExpectedTextBlockNotFound,
    Fetch,
    Render,
    Io,
    Other,
}

/// Processing stage named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configuration,
    FormatResolution,
    Acquire,
    Render,
    Filter,
    Extract,
    Tabularize,
    Output,
    Io,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::FormatResolution => "format resolution",
            Stage::Acquire => "acquire",
            Stage::Render => "render",
            Stage::Filter => "filter",
            Stage::Extract => "extract",
            Stage::Tabularize => "tabularize",
            Stage::Output => "output",
            Stage::Io => "I/O",
        };
        f.write_str(name)
    }
}
