//! Running one configured extraction end to end.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::Extractor;
use crate::fetch::{file_name_from_url, Fetcher};
use crate::format::{FormatPipeline, FormatRegistry, Targets};
use crate::model::Table;

/// Acquires a document, resolves its format and extracts its table.
///
/// Shared read-only between batch workers.
#[derive(Clone)]
pub struct JobRunner {
    registry: Arc<FormatRegistry>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
    targets: Arc<Targets>,
}

impl JobRunner {
    pub fn new(registry: Arc<FormatRegistry>, fetcher: Arc<dyn Fetcher>, extractor: Extractor) -> Self {
        Self {
            registry,
            fetcher,
            extractor,
            targets: Arc::new(Targets::default()),
        }
    }

    /// Restrict extraction to these issuers.
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = Arc::new(targets);
        self
    }

    /// Use a different extractor (e.g. single-threaded inside batch workers).
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Load the document bytes.
    ///
    /// A configured PDF that exists is read from disk. Otherwise the URL is
    /// downloaded and, when `save_pdf` is set, written to the PDF path (or
    /// to the URL's file name).
    pub fn acquire(&self, config: &Config) -> Result<Vec<u8>> {
        let local = config.pdf.as_ref().filter(|p| p.is_file());
        match (local, config.url.as_deref()) {
            (Some(path), _) => {
                log::debug!("Reading {}", path.display());
                Ok(std::fs::read(path)?)
            }
            (None, Some(url)) => {
                let bytes = self.fetcher.fetch(url)?;
                if let Some(path) = download_path(config) {
                    std::fs::write(&path, &bytes)?;
                    log::debug!("Saved {} to {}", url, path.display());
                }
                Ok(bytes)
            }
            (None, None) => match &config.pdf {
                Some(path) => Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                ))),
                None => Err(Error::ConfigurationInconsistent(
                    "either a URL or a PDF path is required".into(),
                )),
            },
        }
    }

    /// Pick the format for a configuration.
    pub fn resolve_format(&self, config: &Config) -> Result<Arc<dyn FormatPipeline>> {
        self.registry
            .resolve(config.format.as_deref(), config.url.as_deref())
    }

    /// Run one extraction. The returned table is tagged with the format id.
    pub fn run(&self, config: &Config) -> Result<Table> {
        let format = self.resolve_format(config)?;
        let bytes = self.acquire(config)?;
        log::debug!("Extracting {} ({} bytes)", format.id(), bytes.len());
        self.extractor.extract(&bytes, format.as_ref(), &self.targets)
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("registry", &self.registry)
            .field("extractor", &self.extractor)
            .field("targets", &self.targets.len())
            .finish()
    }
}

/// Where a downloaded document is kept: the PDF path, else the URL's file
/// name. `None` when nothing is downloaded or `save_pdf` is off.
pub fn download_path(config: &Config) -> Option<PathBuf> {
    if !config.save_pdf || config.pdf.as_ref().is_some_and(|p| p.is_file()) {
        return None;
    }
    let url = config.url.as_deref()?;
    config
        .pdf
        .clone()
        .or_else(|| file_name_from_url(url).map(PathBuf::from))
}

/// Human readable identity of a job: its URL, else its PDF path.
pub fn job_identity(config: &Config) -> String {
    match (&config.url, &config.pdf) {
        (Some(url), _) => url.clone(),
        (None, Some(pdf)) => pdf.display().to_string(),
        (None, None) => "<no input>".to_string(),
    }
}
