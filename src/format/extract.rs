//! Text extraction: label the content of retained blocks.

use regex::Regex;

use super::matching::Matcher;
use super::spec::{FieldSpec, FormatSpec, Locator, MissingFieldPolicy};
use super::targets::Targets;
use crate::error::{Error, Result};
use crate::model::{FieldTag, PdfBlock, Provenance, TextBlock};

/// A locator with its regex compiled.
#[derive(Debug, Clone)]
enum CompiledLocator {
    Cell(i32),
    Chars { start: usize, end: Option<usize> },
    Regex { re: Regex, cell: Option<i32> },
    Constant(String),
    Section,
    Page,
}

/// A field definition ready to run against blocks.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub spec: FieldSpec,
    locator: CompiledLocator,
}

impl CompiledField {
    /// Compile a field definition; fails on an invalid regex.
    pub fn compile(spec: &FieldSpec) -> Result<Self> {
        let locator = match &spec.locate {
            Locator::Cell { index } => CompiledLocator::Cell(*index),
            Locator::Chars { start, end } => CompiledLocator::Chars {
                start: *start,
                end: *end,
            },
            Locator::Regex { pattern, cell } => {
                let re = Regex::new(pattern).map_err(|e| {
                    Error::FormatTable(format!("field `{}`: invalid regex: {}", spec.name, e))
                })?;
                CompiledLocator::Regex { re, cell: *cell }
            }
            Locator::Constant { value } => CompiledLocator::Constant(value.clone()),
            Locator::Section => CompiledLocator::Section,
            Locator::Page => CompiledLocator::Page,
        };
        Ok(Self {
            spec: spec.clone(),
            locator,
        })
    }

    /// Locate this field's text inside `block`; empty results count as absent.
    pub fn locate(&self, block: &PdfBlock, delimiter: &str) -> Option<String> {
        let found = match &self.locator {
            CompiledLocator::Cell(index) => cell_at(block, delimiter, *index).map(str::to_string),
            CompiledLocator::Chars { start, end } => {
                let chars = block.content.chars().skip(*start);
                let text: String = match end {
                    Some(end) => chars.take(end.saturating_sub(*start)).collect(),
                    None => chars.collect(),
                };
                Some(text)
            }
            CompiledLocator::Regex { re, cell } => {
                let haystack = match cell {
                    Some(index) => cell_at(block, delimiter, *index)?,
                    None => block.content.as_str(),
                };
                let caps = re.captures(haystack)?;
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
            }
            CompiledLocator::Constant(value) => Some(value.clone()),
            CompiledLocator::Section => block.section.clone(),
            CompiledLocator::Page => Some(block.page.to_string()),
        }?;
        let trimmed = found.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn cell_at<'a>(block: &'a PdfBlock, delimiter: &str, index: i32) -> Option<&'a str> {
    let cells = block.cells(delimiter);
    let idx = if index < 0 {
        cells.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    cells.get(idx).copied()
}

/// Field locators and policies of one format.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    pub fields: Vec<CompiledField>,
    pub delimiter: String,
    pub on_missing_field: MissingFieldPolicy,
    pub target_match: Matcher,
}

impl ExtractRules {
    /// Compile the extract rules of a format.
    pub fn compile(spec: &FormatSpec) -> Result<Self> {
        let fields = spec
            .fields
            .iter()
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fields,
            delimiter: spec.delimiter.clone(),
            on_missing_field: spec.on_missing_field,
            target_match: spec.target_match,
        })
    }

    /// Field holding the issuer name, if the format has one.
    fn issuer_field(&self) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.spec.tag == FieldTag::Issuer)
    }

    /// Target matching the issuer of `block`. Formats without an issuer
    /// field match against the whole block.
    fn block_target<'t>(&self, block: &PdfBlock, targets: &'t Targets) -> Option<&'t str> {
        match self.issuer_field() {
            Some(field) => {
                let issuer = field.locate(block, &self.delimiter)?;
                targets.find_match(&issuer, &self.target_match)
            }
            None => targets.find_match(&block.content, &self.target_match),
        }
    }

    /// Label the retained blocks.
    ///
    /// With a non-empty target list only blocks whose issuer matches a
    /// target are kept, and the issuer is replaced by the canonical target
    /// name.
    pub fn extract(&self, blocks: &[PdfBlock], targets: &Targets) -> Result<Vec<TextBlock>> {
        let mut out = Vec::new();
        let mut skipped = 0usize;

        'blocks: for (ordinal, block) in blocks.iter().enumerate() {
            let target = if targets.is_empty() {
                None
            } else {
                match self.block_target(block, targets) {
                    Some(name) => Some(name),
                    None => continue,
                }
            };

            let provenance = Provenance::new(block.page, ordinal, block.bbox);
            let mut labelled = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                let text = match (field.spec.tag, target) {
                    (FieldTag::Issuer, Some(name)) => Some(name.to_string()),
                    _ => field.locate(block, &self.delimiter),
                };
                match text {
                    Some(text) => labelled.push(TextBlock::new(
                        field.spec.tag,
                        field.spec.name.clone(),
                        &text,
                        provenance,
                    )),
                    None if field.spec.required => {
                        let err = Error::ExpectedTextBlockNotFound {
                            field: field.spec.name.clone(),
                            provenance,
                        };
                        match self.on_missing_field {
                            MissingFieldPolicy::Abort => return Err(err),
                            MissingFieldPolicy::Skip => {
                                log::warn!("{}, block skipped", err);
                                skipped += 1;
                                continue 'blocks;
                            }
                        }
                    }
                    None => {}
                }
            }
            out.extend(labelled);
        }

        if skipped > 0 {
            log::info!("{} blocks skipped for missing fields", skipped);
        }
        Ok(out)
    }
}
