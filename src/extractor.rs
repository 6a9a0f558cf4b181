//! Single-document extraction.
//!
//! Renders a PDF into blocks, optionally across several page ranges in
//! parallel, and drives the blocks through a format's pipeline.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::format::{FormatPipeline, Targets};
use crate::model::{PdfBlock, Table};
use crate::parser::{LopdfRenderer, Renderer};

/// Split pages `1..=count` into at most `parts` contiguous ranges of
/// near-equal size, in page order.
pub fn partition_pages(count: u32, parts: usize) -> Vec<RangeInclusive<u32>> {
    if count == 0 {
        return Vec::new();
    }
    let parts = (parts.max(1) as u32).min(count);
    let base = count / parts;
    let extra = count % parts;

    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = 1;
    for i in 0..parts {
        let len = base + u32::from(i < extra);
        ranges.push(start..=start + len - 1);
        start += len;
    }
    ranges
}

/// Runs one document through render and a format pipeline.
#[derive(Clone)]
pub struct Extractor {
    renderer: Arc<dyn Renderer>,
    workers: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Arc::new(LopdfRenderer::new()))
    }
}

impl Extractor {
    /// Create an extractor rendering on the calling thread.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            workers: 1,
        }
    }

    /// Render page ranges on `workers` threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Render every page; the result is identical for any worker count.
    pub fn render(&self, bytes: &[u8]) -> Result<Vec<PdfBlock>> {
        if self.workers <= 1 {
            return self.renderer.render(bytes);
        }

        log::debug!("Rendering on {} threads", self.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Other(format!("cannot start render pool: {}", e)))?;
        pool.install(|| self.renderer.render_split(bytes, self.workers))
    }

    /// Render a document and run it through `format`.
    pub fn extract(
        &self,
        bytes: &[u8],
        format: &dyn FormatPipeline,
        targets: &Targets,
    ) -> Result<Table> {
        let blocks = self.render(bytes)?;
        log::debug!("{} blocks rendered", blocks.len());
        format.run(&blocks, targets)
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    /// Renders one block per page, naming the page.
    struct PageNames(u32);

    impl Renderer for PageNames {
        fn page_count(&self, _bytes: &[u8]) -> Result<u32> {
            Ok(self.0)
        }

        fn render_range(&self, _bytes: &[u8], pages: RangeInclusive<u32>) -> Result<Vec<PdfBlock>> {
            Ok(pages
                .map(|p| PdfBlock::text(p, BBox::new(0.0, 0.0, 1.0, 1.0), format!("page {}", p)))
                .collect())
        }
    }

    #[test]
    fn test_partition_pages() {
        assert_eq!(partition_pages(10, 3), vec![1..=4, 5..=7, 8..=10]);
        assert_eq!(partition_pages(2, 8), vec![1..=1, 2..=2]);
        assert_eq!(partition_pages(5, 0), vec![1..=5]);
        assert!(partition_pages(0, 4).is_empty());
    }

    #[test]
    fn test_parallel_render_preserves_page_order() {
        let renderer: Arc<dyn Renderer> = Arc::new(PageNames(23));
        let sequential = Extractor::new(renderer.clone()).render(b"").unwrap();
        let parallel = Extractor::new(renderer).with_workers(4).render(b"").unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 23);
        assert_eq!(parallel[22].content, "page 23");
    }
}
