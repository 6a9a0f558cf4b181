//! Registry of format pipelines.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::pipeline::SpecPipeline;
use super::spec::FormatTable;
use super::FormatPipeline;
use crate::error::{Error, Result};

/// Format table compiled into the binary.
const BUNDLED_FORMATS: &str = include_str!("../../data/formats.yaml");

/// Ordered mapping from format identifier to pipeline.
///
/// Identifiers are matched case-insensitively. URL inference tries the
/// formats in registration order and, inside a format, its patterns in
/// declaration order; the first pattern that matches anywhere in the URL wins.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn FormatPipeline>>,
    by_id: HashMap<String, usize>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the bundled formats.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.load_yaml(BUNDLED_FORMATS)?;
        Ok(registry)
    }

    /// Register a pipeline. A pipeline whose id is already registered replaces
    /// the previous one in place, keeping its inference priority.
    pub fn register(&mut self, format: Arc<dyn FormatPipeline>) {
        let key = format.id().to_uppercase();
        match self.by_id.get(&key) {
            Some(&idx) => {
                log::info!("Format {} redefined", format.id());
                self.formats[idx] = format;
            }
            None => {
                self.by_id.insert(key, self.formats.len());
                self.formats.push(format);
            }
        }
    }

    /// Register every format of a YAML format table, in table order.
    pub fn load_yaml(&mut self, yaml: &str) -> Result<()> {
        let table: FormatTable = serde_yaml::from_str(yaml)?;
        for spec in table.formats {
            self.register(Arc::new(SpecPipeline::new(spec)?));
        }
        Ok(())
    }

    /// Register every format of a YAML format table file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let yaml = std::fs::read_to_string(path)?;
        self.load_yaml(&yaml)
    }

    /// Get a format by identifier.
    pub fn get(&self, id: &str) -> Option<Arc<dyn FormatPipeline>> {
        self.by_id
            .get(&id.to_uppercase())
            .map(|&idx| self.formats[idx].clone())
    }

    /// Whether an identifier is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(&id.to_uppercase())
    }

    /// Registered identifiers, in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.formats.iter().map(|f| f.id()).collect()
    }

    /// Registered pipelines, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FormatPipeline>> {
        self.formats.iter()
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Infer the format of a URL.
    pub fn infer(&self, url: &str) -> Option<Arc<dyn FormatPipeline>> {
        self.formats
            .iter()
            .find(|f| f.url_patterns().iter().any(|re| re.is_match(url)))
            .cloned()
    }

    /// Pick the format for a document.
    ///
    /// An explicit identifier always wins; if it disagrees with the format
    /// inferred from the URL a warning is logged.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        url: Option<&str>,
    ) -> Result<Arc<dyn FormatPipeline>> {
        match (explicit, url) {
            (Some(id), url) => {
                let format = self
                    .get(id)
                    .ok_or_else(|| Error::UnknownFormat(id.to_string()))?;
                if let Some(inferred) = url.and_then(|u| self.infer(u)) {
                    if inferred.id() != format.id() {
                        log::warn!(
                            "Format {} selected but URL suggests {}, using {}",
                            format.id(),
                            inferred.id(),
                            format.id()
                        );
                    }
                }
                Ok(format)
            }
            (None, Some(url)) => {
                let format = self.infer(url).ok_or_else(|| {
                    Error::FormatInferenceFailed(format!("no format pattern matches {}", url))
                })?;
                log::info!("Format {} inferred from URL", format.id());
                Ok(format)
            }
            (None, None) => Err(Error::FormatInferenceFailed(
                "no format given and no URL to infer it from".into(),
            )),
        }
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.ids())
            .finish()
    }
}
