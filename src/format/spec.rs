//! Declarative format definitions.
//!
//! A format table is a YAML document listing one [`FormatSpec`] per issuer
//! layout. Anchors, thresholds, selectors and field locators are all data;
//! [`SpecPipeline`](super::SpecPipeline) turns a spec into a runnable pipeline.

use serde::{Deserialize, Serialize};

use super::matching::{MatchMode, Matcher};
use super::value::ValueKind;
use crate::model::FieldTag;

/// Top-level format table document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatTable {
    pub formats: Vec<FormatSpec>,
}

/// One issuer layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatSpec {
    /// Format identifier, e.g. `EURIZON`
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// URL regexes used for format inference, tried in order
    #[serde(default)]
    pub url_patterns: Vec<String>,
    pub filter: FilterSpec,
    /// Cell delimiter inside a block's content
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub on_missing_field: MissingFieldPolicy,
    #[serde(default)]
    pub on_partial_row: PartialRowPolicy,
    /// How target names are matched against block content
    #[serde(default)]
    pub target_match: Matcher,
    /// Append an `Instrument` column (`bond` / `equity`)
    #[serde(default)]
    pub instrument_column: bool,
}

fn default_delimiter() -> String {
    "\t".to_string()
}

/// Block selection rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    /// A page is relevant only if at least one anchor hits on it
    pub anchors: Vec<AnchorSpec>,
    /// Section label selector (e.g. sub-fund name)
    #[serde(default)]
    pub section: Option<SectionSpec>,
    #[serde(default)]
    pub body: BodySpec,
}

/// A text landmark that marks a page as relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorSpec {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default = "default_anchor_threshold")]
    pub threshold: f64,
    /// Fail the document when no block matches this anchor
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub y_range: Band,
}

fn default_anchor_threshold() -> f64 {
    0.85
}

fn default_true() -> bool {
    true
}

impl AnchorSpec {
    /// Matcher for this anchor's mode and threshold.
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.mode, self.threshold)
    }
}

/// Selector for the section label in force on a relevant page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub y_range: Band,
    #[serde(default)]
    pub required: bool,
}

/// Selector for the blocks carrying data rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodySpec {
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub y_range: Band,
    /// Minimum number of delimiter-separated cells
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,
}

fn default_min_cells() -> usize {
    1
}

impl Default for BodySpec {
    fn default() -> Self {
        Self {
            font: None,
            y_range: Band::default(),
            min_cells: default_min_cells(),
        }
    }
}

/// Vertical band in top-down page coordinates; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Band {
    #[serde(default)]
    pub top: Option<f32>,
    #[serde(default)]
    pub bottom: Option<f32>,
}

impl Band {
    pub fn new(top: Option<f32>, bottom: Option<f32>) -> Self {
        Self { top, bottom }
    }

    /// Whether `y` lies inside the band, edges included.
    pub fn contains(&self, y: f32) -> bool {
        self.top.map_or(true, |t| y >= t) && self.bottom.map_or(true, |b| y <= b)
    }
}

/// One output column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Column name in the output CSV
    pub name: String,
    pub tag: FieldTag,
    pub locate: Locator,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default = "default_true")]
    pub required: bool,
}

/// Where a field's text is found inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Cell at `index` after delimiter splitting; negative counts from the end
    Cell { index: i32 },
    /// Fixed character offsets into the content, `end` exclusive
    Chars {
        start: usize,
        #[serde(default)]
        end: Option<usize>,
    },
    /// First capture group (or whole match) of `pattern`, optionally on one cell
    Regex {
        pattern: String,
        #[serde(default)]
        cell: Option<i32>,
    },
    /// Fixed value
    Constant { value: String },
    /// Section label stamped by the filter stage
    Section,
    /// Page number of the block
    Page,
}

/// What to do with a block whose required field cannot be located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Drop the block and log a warning
    Skip,
    /// Fail the document
    #[default]
    Abort,
}

/// What to do with a row whose cells are missing or unparsable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialRowPolicy {
    /// Drop the row and log a warning
    #[default]
    Reject,
    /// Keep the row with empty cells
    FillNull,
}
