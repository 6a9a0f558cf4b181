//! Format pipeline driven by a [`FormatSpec`].

use regex::Regex;

use super::extract::ExtractRules;
use super::filter::filter_blocks;
use super::spec::FormatSpec;
use super::tabularize::TabularizeRules;
use super::targets::Targets;
use super::FormatPipeline;
use crate::error::{Error, Result};
use crate::model::{PdfBlock, Table, TextBlock};

/// A [`FormatPipeline`] whose three stages are configured by data.
#[derive(Debug, Clone)]
pub struct SpecPipeline {
    spec: FormatSpec,
    url_patterns: Vec<Regex>,
    extract: ExtractRules,
    tabularize: TabularizeRules,
}

impl SpecPipeline {
    /// Compile a format spec; fails on invalid regexes or an empty field list.
    pub fn new(spec: FormatSpec) -> Result<Self> {
        if spec.id.trim().is_empty() {
            return Err(Error::FormatTable("format with empty id".into()));
        }
        if spec.fields.is_empty() {
            return Err(Error::FormatTable(format!("format `{}` has no fields", spec.id)));
        }
        let url_patterns = spec
            .url_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::FormatTable(format!("format `{}`: invalid URL pattern: {}", spec.id, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let extract = ExtractRules::compile(&spec)?;
        let tabularize = TabularizeRules::from_spec(&spec);
        Ok(Self {
            spec,
            url_patterns,
            extract,
            tabularize,
        })
    }

    /// The underlying spec.
    pub fn spec(&self) -> &FormatSpec {
        &self.spec
    }
}

impl FormatPipeline for SpecPipeline {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn url_patterns(&self) -> &[Regex] {
        &self.url_patterns
    }

    fn columns(&self) -> Vec<String> {
        self.tabularize.column_names()
    }

    fn filter(&self, blocks: &[PdfBlock]) -> Result<Vec<PdfBlock>> {
        filter_blocks(&self.spec.filter, &self.spec.delimiter, blocks)
    }

    fn extract(&self, blocks: &[PdfBlock], targets: &Targets) -> Result<Vec<TextBlock>> {
        self.extract.extract(blocks, targets)
    }

    fn tabularize(&self, texts: &[TextBlock]) -> Result<Table> {
        self.tabularize.tabularize(texts)
    }
}
