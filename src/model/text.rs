//! Semantically tagged text units.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::BBox;

/// Fixed vocabulary of field tags shared by every format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Issuer,
    Isin,
    Quantity,
    MarketValue,
    AcquisitionCost,
    Currency,
    NetAssetsShare,
    InterestRate,
    Maturity,
    Section,
    Page,
    ExclusionFlag,
    Instrument,
}

impl FieldTag {
    /// Snake-case name used in format tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTag::Issuer => "issuer",
            FieldTag::Isin => "isin",
            FieldTag::Quantity => "quantity",
            FieldTag::MarketValue => "market_value",
            FieldTag::AcquisitionCost => "acquisition_cost",
            FieldTag::Currency => "currency",
            FieldTag::NetAssetsShare => "net_assets_share",
            FieldTag::InterestRate => "interest_rate",
            FieldTag::Maturity => "maturity",
            FieldTag::Section => "section",
            FieldTag::Page => "page",
            FieldTag::ExclusionFlag => "exclusion_flag",
            FieldTag::Instrument => "instrument",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Page number (1-based)
    pub page: u32,
    /// Ordinal of the source block among the filtered blocks
    pub block: usize,
    /// Bounding box of the source block
    pub bbox: BBox,
}

impl Provenance {
    pub fn new(page: u32, block: usize, bbox: BBox) -> Self {
        Self { page, block, bbox }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {}, block {} at ({:.1}, {:.1})",
            self.page, self.block, self.bbox.x0, self.bbox.y0
        )
    }
}

/// A labelled text unit extracted from a [`PdfBlock`](super::PdfBlock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Semantic tag
    pub tag: FieldTag,
    /// Output column the text belongs to
    pub field: String,
    /// Normalized text (trimmed, inner whitespace collapsed)
    pub text: String,
    /// Source of the text
    pub provenance: Provenance,
}

impl TextBlock {
    /// Create a text block, collapsing whitespace in `text`.
    pub fn new(
        tag: FieldTag,
        field: impl Into<String>,
        text: &str,
        provenance: Provenance,
    ) -> Self {
        Self {
            tag,
            field: field.into(),
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_block_normalizes_whitespace() {
        let tb = TextBlock::new(
            FieldTag::Issuer,
            "Issuer",
            "  ENI \n  SPA ",
            Provenance::new(1, 0, BBox::default()),
        );
        assert_eq!(tb.text, "ENI SPA");
    }

    #[test]
    fn test_field_tag_serde_name() {
        let json = serde_json::to_string(&FieldTag::MarketValue).unwrap();
        assert_eq!(json, "\"market_value\"");
        assert_eq!(FieldTag::MarketValue.to_string(), "market_value");
    }
}
