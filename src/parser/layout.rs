//! Layout analysis: turn content-stream text into line blocks.
//!
//! Text is collected as positioned spans while interpreting the page's
//! content stream, spans sharing a baseline are grouped into lines, and each
//! line becomes one [`PdfBlock`]. Horizontal gaps wider than
//! [`LayoutOptions::cell_gap`] font sizes split a line into tab-separated
//! cells so table rows keep their column structure.

use std::collections::HashMap;

use super::backend::{Operand, PageId, PdfBackend};
use crate::error::{Error, Result};
use crate::model::{BBox, BlockKind, PdfBlock};

/// Average glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Tuning knobs for line and cell detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Gap, in multiples of the font size, that separates two cells
    pub cell_gap: f32,
    /// Baseline tolerance, in multiples of the font size, for spans on one line
    pub line_tolerance: f32,
    /// Emit image blocks for painted XObjects
    pub images: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            cell_gap: 1.2,
            line_tolerance: 0.3,
            images: true,
        }
    }
}

impl LayoutOptions {
    /// Set the cell gap.
    pub fn with_cell_gap(mut self, gap: f32) -> Self {
        self.cell_gap = gap;
        self
    }

    /// Enable or disable image blocks.
    pub fn with_images(mut self, images: bool) -> Self {
        self.images = images;
        self
    }
}

/// A text span with position and style information (PDF user space, y up).
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    pub font_size: f32,
    /// Base font name (e.g., "Helvetica-Bold")
    pub font_name: String,
}

impl TextSpan {
    /// Create a span, estimating its width from the character count.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let width = text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name,
        }
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Spans sharing a baseline, sorted left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    /// Baseline
    pub y: f32,
}

impl TextLine {
    /// Create a line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.total_cmp(&b.x));
        let y = spans.first().map(|s| s.y).unwrap_or(0.0);
        Self { spans, y }
    }

    /// Line text: wide gaps become `\t`, small gaps a space.
    pub fn text(&self, cell_gap: f32) -> String {
        let mut result = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - prev.right();
                let size = span.font_size.max(prev.font_size).max(1.0);
                if gap > cell_gap * size {
                    let trimmed = result.trim_end().len();
                    result.truncate(trimmed);
                    result.push('\t');
                } else if gap > size * AVG_GLYPH_WIDTH * 0.2
                    && !result.ends_with(&[' ', '\t'][..])
                    && !span.text.starts_with(' ')
                {
                    result.push(' ');
                }
            }
            if result.ends_with('\t') {
                result.push_str(span.text.trim_start());
            } else {
                result.push_str(&span.text);
            }
        }
        result
    }

    /// Font covering most characters of the line.
    pub fn dominant_font(&self) -> Option<&str> {
        let mut weights: HashMap<&str, usize> = HashMap::new();
        for span in &self.spans {
            *weights.entry(span.font_name.as_str()).or_insert(0) += span.text.chars().count();
        }
        let best = weights.values().copied().max()?;
        // ties resolve to the leftmost span's font
        self.spans
            .iter()
            .map(|s| s.font_name.as_str())
            .find(|f| weights.get(f) == Some(&best))
    }

    /// Convert to a block, flipping y to top-down coordinates.
    pub fn to_block(&self, page: u32, page_height: f32, cell_gap: f32) -> PdfBlock {
        let size = self
            .spans
            .iter()
            .map(|s| s.font_size)
            .fold(0.0_f32, f32::max);
        let x0 = self.spans.first().map(|s| s.x).unwrap_or(0.0);
        let x1 = self.spans.iter().map(TextSpan::right).fold(x0, f32::max);
        let top = page_height - (self.y + size * 0.8);
        let bottom = page_height - (self.y - size * 0.2);

        let content = self.text(cell_gap);
        let kind = if content.contains('\t') {
            BlockKind::Table
        } else {
            BlockKind::Text
        };
        let mut block = PdfBlock::text(page, BBox::new(x0, top, x1, bottom), content).with_kind(kind);
        if let Some(font) = self.dominant_font() {
            block = block.with_font(font);
        }
        block
    }
}

/// Group spans into lines, top to bottom.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>, tolerance: f32) -> Vec<TextLine> {
    // PDF y grows upwards, so higher baselines come first
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let same_line = current_y
            .map(|y| (span.y - y).abs() <= span.font_size.max(1.0) * tolerance)
            .unwrap_or(false);
        if !same_line && !current.is_empty() {
            lines.push(TextLine::from_spans(std::mem::take(&mut current)));
        }
        if !same_line {
            current_y = Some(span.y);
        }
        current.push(span);
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }
    lines
}

/// Painted image position (PDF user space, y up).
#[derive(Debug, Clone)]
pub struct ImageSpan {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Content-stream interpreter over a [`PdfBackend`].
pub struct LayoutAnalyzer<'a, B: PdfBackend> {
    backend: &'a B,
    options: LayoutOptions,
}

impl<'a, B: PdfBackend> LayoutAnalyzer<'a, B> {
    pub fn new(backend: &'a B, options: LayoutOptions) -> Self {
        Self { backend, options }
    }

    /// Render one page (1-based) into line blocks in reading order,
    /// followed by image blocks.
    pub fn page_blocks(&self, page_num: u32) -> Result<Vec<PdfBlock>> {
        let page = self
            .backend
            .page(page_num)
            .ok_or_else(|| Error::PageOutOfRange(page_num, self.backend.pages().len() as u32))?;
        let (spans, images) = self.page_spans(page.id)?;

        let mut blocks: Vec<PdfBlock> =
            group_spans_into_lines(spans, self.options.line_tolerance)
                .iter()
                .filter(|l| !l.spans.is_empty())
                .map(|l| l.to_block(page_num, page.height, self.options.cell_gap))
                .filter(|b| !b.is_blank())
                .collect();

        if self.options.images {
            for img in images {
                let bbox = BBox::new(
                    img.x,
                    page.height - (img.y + img.height),
                    img.x + img.width,
                    page.height - img.y,
                );
                blocks.push(PdfBlock::text(page_num, bbox, img.name).with_kind(BlockKind::Image));
            }
        }
        log::trace!("Page {}: {} blocks", page_num, blocks.len());
        Ok(blocks)
    }

    /// Interpret a page's content stream into text spans and image placements.
    pub fn page_spans(&self, page: PageId) -> Result<(Vec<TextSpan>, Vec<ImageSpan>)> {
        let fonts = self.backend.fonts(page)?;
        let ops = self.backend.operations(page)?;

        let mut spans = Vec::new();
        let mut images = Vec::new();
        let mut state = TextState::default();
        let mut ctm_stack: Vec<Matrix> = Vec::new();
        let mut ctm = Matrix::identity();

        for op in ops {
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => ctm = ctm_stack.pop().unwrap_or_else(Matrix::identity),
                "cm" => {
                    if let [a, b, c, d, e, f] = op.numbers()[..] {
                        ctm = Matrix { a, b, c, d, e, f }.multiply(&ctm);
                    }
                }
                "BT" => {
                    state.in_text = true;
                    state.tm = Matrix::identity();
                    state.line = Matrix::identity();
                }
                "ET" => state.in_text = false,
                "Tf" => {
                    if let Some(name) = op.operands.first().and_then(Operand::as_name) {
                        state.font_resource = name.to_vec();
                        state.font_name = fonts
                            .base_name(name)
                            .map(str::to_string)
                            .unwrap_or_else(|| String::from_utf8_lossy(name).into_owned());
                    }
                    if let Some(size) = op.operands.get(1).and_then(Operand::as_number) {
                        state.font_size = size;
                    }
                }
                "TL" => {
                    if let Some(leading) = op.operands.first().and_then(Operand::as_number) {
                        state.leading = leading;
                    }
                }
                "Td" => {
                    if let [tx, ty] = op.numbers()[..] {
                        state.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = op.numbers()[..] {
                        state.leading = -ty;
                        state.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let [a, b, c, d, e, f] = op.numbers()[..] {
                        state.tm = Matrix { a, b, c, d, e, f };
                        state.line = state.tm;
                    }
                }
                "T*" => state.next_line(),
                "Tj" | "'" | "\"" => {
                    if op.operator != "Tj" {
                        state.next_line();
                    }
                    let idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Operand::Bytes(bytes)) = op.operands.get(idx) {
                        let text = fonts.decode(&state.font_resource, bytes);
                        state.show(text, &ctm, &mut spans);
                    }
                }
                "TJ" => {
                    if let Some(Operand::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Operand::Bytes(bytes) => {
                                    let text = fonts.decode(&state.font_resource, bytes);
                                    state.show(text, &ctm, &mut spans);
                                }
                                // negative adjustments move right
                                Operand::Number(adj) => state.kern(*adj),
                                _ => {}
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(Operand::as_name) {
                        images.push(ImageSpan {
                            name: String::from_utf8_lossy(name).into_owned(),
                            x: ctm.e,
                            y: ctm.f,
                            width: ctm.a.abs(),
                            height: ctm.d.abs(),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok((spans, images))
    }
}

/// Affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self × other`
    fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Text state tracked across operators.
struct TextState {
    in_text: bool,
    tm: Matrix,
    line: Matrix,
    font_resource: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            in_text: false,
            tm: Matrix::identity(),
            line: Matrix::identity(),
            font_resource: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line = Matrix {
            e: tx,
            f: ty,
            ..Matrix::identity()
        }
        .multiply(&self.line);
        self.tm = self.line;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    /// Advance along the baseline by `dx` text-space units.
    fn advance(&mut self, dx: f32) {
        self.tm = Matrix {
            e: dx,
            ..Matrix::identity()
        }
        .multiply(&self.tm);
    }

    fn kern(&mut self, adjustment: f32) {
        self.advance(-adjustment / 1000.0 * self.font_size);
    }

    fn show(&mut self, text: String, ctm: &Matrix, spans: &mut Vec<TextSpan>) {
        if !self.in_text || text.is_empty() {
            return;
        }
        let chars = text.chars().count() as f32;
        let render = self.tm.multiply(ctm);
        let (x, y) = render.apply(0.0, 0.0);
        let size = self.font_size * render.vertical_scale();
        if !text.trim().is_empty() {
            spans.push(TextSpan::new(text, x, y, size, self.font_name.clone()));
        }
        self.advance(chars * self.font_size * AVG_GLYPH_WIDTH);
    }
}
