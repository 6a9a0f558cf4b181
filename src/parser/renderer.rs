//! Page rendering: PDF bytes to [`PdfBlock`]s.

use std::ops::RangeInclusive;

use rayon::prelude::*;

use super::backend::{LopdfBackend, PdfBackend};
use super::layout::{LayoutAnalyzer, LayoutOptions};
use crate::error::{Error, Result};
use crate::extractor::partition_pages;
use crate::model::PdfBlock;

/// Turns PDF bytes into page blocks.
///
/// Implementations are shared across worker threads, so they hold no
/// per-document state: every call starts from the raw bytes.
pub trait Renderer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, bytes: &[u8]) -> Result<u32>;

    /// Render an inclusive, 1-based page range in reading order.
    fn render_range(&self, bytes: &[u8], pages: RangeInclusive<u32>) -> Result<Vec<PdfBlock>>;

    /// Render the whole document.
    fn render(&self, bytes: &[u8]) -> Result<Vec<PdfBlock>> {
        let count = self.page_count(bytes)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.render_range(bytes, 1..=count)
    }

    /// Render the whole document as up to `parts` page ranges on the current
    /// rayon pool, concatenated in page order.
    fn render_split(&self, bytes: &[u8], parts: usize) -> Result<Vec<PdfBlock>> {
        let ranges = partition_pages(self.page_count(bytes)?, parts);
        let parts = ranges
            .par_iter()
            .map(|range| self.render_range(bytes, range.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.into_iter().flatten().collect())
    }
}

/// [`Renderer`] interpreting content streams with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfRenderer {
    options: LayoutOptions,
}

impl LopdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom layout options.
    pub fn with_options(mut self, options: LayoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }
}

impl LopdfRenderer {
    fn render_pages<B: PdfBackend>(
        &self,
        backend: &B,
        pages: RangeInclusive<u32>,
    ) -> Result<Vec<PdfBlock>> {
        let total = backend.pages().len() as u32;
        if *pages.start() == 0 || *pages.end() > total {
            return Err(Error::PageOutOfRange(*pages.end(), total));
        }

        let analyzer = LayoutAnalyzer::new(backend, self.options);
        let mut blocks = Vec::new();
        for page in pages {
            blocks.extend(analyzer.page_blocks(page)?);
        }
        Ok(blocks)
    }
}

impl Renderer for LopdfRenderer {
    fn page_count(&self, bytes: &[u8]) -> Result<u32> {
        Ok(LopdfBackend::load_bytes(bytes)?.page_count())
    }

    fn render_range(&self, bytes: &[u8], pages: RangeInclusive<u32>) -> Result<Vec<PdfBlock>> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        self.render_pages(&backend, pages)
    }

    fn render(&self, bytes: &[u8]) -> Result<Vec<PdfBlock>> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        match backend.page_count() {
            0 => Ok(Vec::new()),
            count => self.render_pages(&backend, 1..=count),
        }
    }

    // One parse, shared by every range.
    fn render_split(&self, bytes: &[u8], parts: usize) -> Result<Vec<PdfBlock>> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        let ranges = partition_pages(backend.page_count(), parts);
        let parts = ranges
            .par_iter()
            .map(|range| self.render_pages(&backend, range.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.into_iter().flatten().collect())
    }
}
