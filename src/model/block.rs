//! Raw page-level content blocks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page points, origin at the top-left corner.
///
/// `y0` is the top edge and `y1` the bottom edge, so `y0 <= y1` for
/// well-formed boxes and larger `y` means further down the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Create a bounding box from its four edges.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box width.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Box height.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Vertical centre, used for band selection.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }
}

/// Kind of content a block carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// A single run of text
    #[default]
    Text,
    /// A row of delimiter-separated cells
    Table,
    /// A painted image; `content` is empty or the XObject name
    Image,
}

/// One content unit from a page.
///
/// Blocks are produced by a renderer and never mutated afterwards: the
/// filter stage returns new values (see [`PdfBlock::with_section`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfBlock {
    /// Page number (1-based)
    pub page: u32,
    /// Position on the page
    pub bbox: BBox,
    /// Full raw text of the block
    pub content: String,
    /// Block kind
    pub kind: BlockKind,
    /// Dominant font (base font name) of the block, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Section label in force, stamped by the filter stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl PdfBlock {
    /// Create a text block.
    pub fn text(page: u32, bbox: BBox, content: impl Into<String>) -> Self {
        Self {
            page,
            bbox,
            content: content.into(),
            kind: BlockKind::Text,
            font: None,
            section: None,
        }
    }

    /// Create a table-row block from its cells, joined by `delimiter`.
    pub fn table_row<S: AsRef<str>>(page: u32, bbox: BBox, cells: &[S], delimiter: &str) -> Self {
        let content = cells
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(delimiter);
        Self {
            kind: BlockKind::Table,
            ..Self::text(page, bbox, content)
        }
    }

    /// Set the font name.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    /// Set the block kind.
    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        self
    }

    /// Return a copy stamped with the given section label.
    pub fn with_section(&self, section: Option<&str>) -> Self {
        Self {
            section: section.map(str::to_string),
            ..self.clone()
        }
    }

    /// Split the content into trimmed cells.
    pub fn cells(&self, delimiter: &str) -> Vec<&str> {
        if delimiter.is_empty() {
            return vec![self.content.trim()];
        }
        self.content.split(delimiter).map(str::trim).collect()
    }

    /// Whether the block carries no visible text.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Reading-order comparison: page, then top-to-bottom, then left-to-right.
    pub fn reading_order(&self, other: &Self) -> Ordering {
        self.page
            .cmp(&other.page)
            .then_with(|| self.bbox.y0.total_cmp(&other.bbox.y0))
            .then_with(|| self.bbox.x0.total_cmp(&other.bbox.x0))
    }
}

/// Sort blocks into reading order. The sort is stable.
pub fn sort_reading_order(blocks: &mut [PdfBlock]) {
    blocks.sort_by(|a, b| a.reading_order(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_split_and_trim() {
        let block = PdfBlock::text(1, BBox::default(), "ENI SPA \t 1.000\tEUR ");
        assert_eq!(block.cells("\t"), vec!["ENI SPA", "1.000", "EUR"]);
        assert_eq!(block.cells(""), vec!["ENI SPA \t 1.000\tEUR"]);
    }

    #[test]
    fn test_table_row() {
        let block = PdfBlock::table_row(2, BBox::default(), &["a", "b"], "\t");
        assert_eq!(block.kind, BlockKind::Table);
        assert_eq!(block.content, "a\tb");
    }

    #[test]
    fn test_with_section_is_copy() {
        let block = PdfBlock::text(1, BBox::default(), "x");
        let stamped = block.with_section(Some("Equity Fund"));
        assert_eq!(block.section, None);
        assert_eq!(stamped.section.as_deref(), Some("Equity Fund"));
    }

    #[test]
    fn test_reading_order() {
        let mut blocks = vec![
            PdfBlock::text(2, BBox::new(0.0, 10.0, 5.0, 20.0), "p2"),
            PdfBlock::text(1, BBox::new(50.0, 100.0, 60.0, 110.0), "right"),
            PdfBlock::text(1, BBox::new(0.0, 100.0, 10.0, 110.0), "left"),
            PdfBlock::text(1, BBox::new(0.0, 10.0, 10.0, 20.0), "top"),
        ];
        sort_reading_order(&mut blocks);
        let order: Vec<_> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(order, vec!["top", "left", "right", "p2"]);
    }

    #[test]
    fn test_reading_order_with_nan() {
        let mut blocks = vec![
            PdfBlock::text(1, BBox::new(0.0, f32::NAN, 10.0, 20.0), "broken"),
            PdfBlock::text(1, BBox::new(0.0, 30.0, 10.0, 40.0), "b"),
            PdfBlock::text(1, BBox::new(0.0, 10.0, 10.0, 20.0), "a"),
        ];
        sort_reading_order(&mut blocks);
        let order: Vec<_> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "broken"]);
    }

    #[test]
    fn test_bbox_geometry() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.center_y(), 40.0);
    }
}
