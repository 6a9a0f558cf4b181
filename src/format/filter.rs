//! Block filtering: keep the blocks that carry data rows.

use std::collections::HashSet;

use super::matching::{normalize_string, Matcher};
use super::spec::{AnchorSpec, Band, FilterSpec};
use crate::error::{Error, Result};
use crate::model::{BlockKind, PdfBlock};

/// Compare a block font against a selector, ignoring case and any subset
/// prefix (`ABCDEF+Helvetica` matches `Helvetica`).
pub fn font_matches(block_font: Option<&str>, wanted: &str) -> bool {
    match block_font {
        Some(font) => {
            strip_subset_prefix(font).eq_ignore_ascii_case(strip_subset_prefix(wanted))
        }
        None => false,
    }
}

fn strip_subset_prefix(font: &str) -> &str {
    match font.split_once('+') {
        Some((prefix, rest))
            if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => font,
    }
}

fn selector_matches(block: &PdfBlock, font: Option<&str>, band: &Band) -> bool {
    font.map_or(true, |f| font_matches(block.font.as_deref(), f))
        && band.contains(block.bbox.center_y())
}

struct CompiledAnchor<'a> {
    spec: &'a AnchorSpec,
    needle: String,
    matcher: Matcher,
}

impl CompiledAnchor<'_> {
    fn hits(&self, block: &PdfBlock, normalized: &str) -> bool {
        selector_matches(block, self.spec.font.as_deref(), &self.spec.y_range)
            && self.matcher.matches_normalized(normalized, &self.needle)
    }
}

/// Run the filter stage over a document's blocks.
///
/// Pages are visited in reading order. A page where no anchor hits
/// contributes nothing; on a relevant page the section label is located and
/// every body block is returned stamped with it. Section labels carry over
/// to later pages that do not repeat them.
pub fn filter_blocks(
    spec: &FilterSpec,
    delimiter: &str,
    blocks: &[PdfBlock],
) -> Result<Vec<PdfBlock>> {
    let mut sorted: Vec<&PdfBlock> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.reading_order(b));

    let anchors: Vec<CompiledAnchor<'_>> = spec
        .anchors
        .iter()
        .filter_map(|a| {
            let needle = normalize_string(&a.text);
            if needle.is_empty() {
                log::warn!("Anchor `{}` has empty text and never matches", a.name);
                return None;
            }
            Some(CompiledAnchor {
                spec: a,
                needle,
                matcher: a.matcher(),
            })
        })
        .collect();
    let mut hit_counts = vec![0usize; anchors.len()];

    let mut retained = Vec::new();
    let mut section: Option<String> = None;

    for page in split_pages(&sorted) {
        let page_no = page[0].page;
        let mut anchor_blocks = HashSet::new();
        for (i, block) in page.iter().enumerate() {
            if block.kind == BlockKind::Image {
                continue;
            }
            let normalized = normalize_string(&block.content);
            for (a, anchor) in anchors.iter().enumerate() {
                if anchor.hits(block, &normalized) {
                    hit_counts[a] += 1;
                    anchor_blocks.insert(i);
                }
            }
        }
        if anchor_blocks.is_empty() {
            log::trace!("Page {} has no anchor, skipped", page_no);
            continue;
        }

        let mut section_blocks = HashSet::new();
        if let Some(section_spec) = &spec.section {
            let labels: Vec<&str> = page
                .iter()
                .enumerate()
                .filter(|(i, b)| {
                    !anchor_blocks.contains(i)
                        && !b.is_blank()
                        && b.kind != BlockKind::Image
                        && selector_matches(
                            b,
                            section_spec.font.as_deref(),
                            &section_spec.y_range,
                        )
                })
                .map(|(i, b)| {
                    section_blocks.insert(i);
                    b.content.trim()
                })
                .collect();
            if !labels.is_empty() {
                section = Some(labels.join(" "));
            } else if section_spec.required {
                return Err(Error::ExpectedPdfBlockNotFound {
                    anchor: format!("section label on page {}", page_no),
                });
            }
        }

        let before = retained.len();
        for (i, block) in page.iter().enumerate() {
            if anchor_blocks.contains(&i) || section_blocks.contains(&i) {
                continue;
            }
            if block.is_blank() || block.kind == BlockKind::Image {
                continue;
            }
            if !selector_matches(block, spec.body.font.as_deref(), &spec.body.y_range) {
                continue;
            }
            if spec.body.min_cells > 1 && count_cells(block, delimiter) < spec.body.min_cells {
                continue;
            }
            retained.push(block.with_section(section.as_deref()));
        }
        log::debug!(
            "Page {}: {} body blocks retained (section {:?})",
            page_no,
            retained.len() - before,
            section
        );
    }

    for (anchor, count) in anchors.iter().zip(&hit_counts) {
        if *count == 0 && anchor.spec.required {
            return Err(Error::ExpectedPdfBlockNotFound {
                anchor: anchor.spec.name.clone(),
            });
        }
    }

    Ok(retained)
}

/// Split a reading-ordered slice into per-page runs.
fn split_pages<'a, 'b>(blocks: &'b [&'a PdfBlock]) -> Vec<&'b [&'a PdfBlock]> {
    let mut pages = Vec::new();
    let mut start = 0;
    for i in 1..=blocks.len() {
        if i == blocks.len() || blocks[i].page != blocks[start].page {
            if i > start {
                pages.push(&blocks[start..i]);
            }
            start = i;
        }
    }
    pages
}

fn count_cells(block: &PdfBlock, delimiter: &str) -> usize {
    block.cells(delimiter).iter().filter(|c| !c.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::matching::MatchMode;
    use crate::format::spec::{BodySpec, SectionSpec};
    use crate::model::BBox;

    fn block(page: u32, y: f32, font: &str, content: &str) -> PdfBlock {
        PdfBlock::text(page, BBox::new(10.0, y, 200.0, y + 8.0), content).with_font(font)
    }

    fn anchor(required: bool) -> AnchorSpec {
        AnchorSpec {
            name: "holdings".into(),
            text: "Portfolio as at".into(),
            mode: MatchMode::Contains,
            threshold: 0.85,
            required,
            font: Some("Header-Bold".into()),
            y_range: Band::default(),
        }
    }

    fn spec() -> FilterSpec {
        FilterSpec {
            anchors: vec![anchor(true)],
            section: Some(SectionSpec {
                font: Some("Section".into()),
                y_range: Band::new(None, Some(40.0)),
                required: false,
            }),
            body: BodySpec {
                font: Some("Body".into()),
                ..BodySpec::default()
            },
        }
    }

    fn document() -> Vec<PdfBlock> {
        vec![
            block(1, 20.0, "Body", "cover page text"),
            block(2, 10.0, "Section", "Equity Europe"),
            block(2, 50.0, "Header-Bold", "Securities Portfolio as at 31/12/2024"),
            block(2, 100.0, "Body", "ENI SPA\t1.000\t12.345,00"),
            block(2, 80.0, "ABCDEF+Body", "ENEL SPA\t500\t3.000,00"),
            block(2, 120.0, "Footer", "page 2"),
            block(3, 50.0, "Header-Bold", "Portfolio as at (continued)"),
            block(3, 100.0, "Body", "STELLANTIS\t10\t100,00"),
        ]
    }

    #[test]
    fn test_filter_keeps_body_of_anchored_pages() {
        let kept = filter_blocks(&spec(), "\t", &document()).unwrap();
        let contents: Vec<_> = kept.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["ENEL SPA\t500\t3.000,00", "ENI SPA\t1.000\t12.345,00", "STELLANTIS\t10\t100,00"]
        );
        // section carried over to page 3
        assert!(kept.iter().all(|b| b.section.as_deref() == Some("Equity Europe")));
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let blocks = document();
        let copy = blocks.clone();
        let _ = filter_blocks(&spec(), "\t", &blocks).unwrap();
        assert_eq!(blocks, copy);
    }

    #[test]
    fn test_required_anchor_missing() {
        let blocks = vec![block(1, 100.0, "Body", "ENI SPA\t1")];
        let err = filter_blocks(&spec(), "\t", &blocks).unwrap_err();
        assert!(matches!(err, Error::ExpectedPdfBlockNotFound { ref anchor } if anchor == "holdings"));

        let mut optional = spec();
        optional.anchors = vec![anchor(false)];
        assert!(filter_blocks(&optional, "\t", &blocks).unwrap().is_empty());
    }

    #[test]
    fn test_required_section_missing() {
        let mut spec = spec();
        if let Some(section) = spec.section.as_mut() {
            section.required = true;
        }
        let blocks = vec![
            block(1, 50.0, "Header-Bold", "Portfolio as at"),
            block(1, 100.0, "Body", "ENI SPA\t1"),
        ];
        let err = filter_blocks(&spec, "\t", &blocks).unwrap_err();
        assert!(err.to_string().contains("section label on page 1"));
    }

    #[test]
    fn test_min_cells() {
        let mut spec = spec();
        spec.body.min_cells = 3;
        let blocks = vec![
            block(1, 50.0, "Header-Bold", "Portfolio as at"),
            block(1, 100.0, "Body", "Total\t13.345,00"),
            block(1, 110.0, "Body", "ENI SPA\t1.000\t12.345,00"),
        ];
        let kept = filter_blocks(&spec, "\t", &blocks).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].content.starts_with("ENI"));
    }

    #[test]
    fn test_font_matches() {
        assert!(font_matches(Some("ABCDEF+ArialMT"), "arialmt"));
        assert!(!font_matches(Some("ArialMT-Bold"), "ArialMT"));
        assert!(!font_matches(None, "ArialMT"));
        // not a subset tag
        assert!(!font_matches(Some("Ab+ArialMT"), "ArialMT"));
    }
}
