//! Document access for the layout pass.
//!
//! [`PdfBackend`] hides the PDF library behind the few queries the layout
//! interpreter makes: the page list with its sizes, the fonts a page refers
//! to and the operations of its content stream.

use std::collections::HashMap;

use lopdf::{Document as LopdfDocument, Encoding, Object};

use crate::error::{Error, Result};

/// Page object identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// Page size (A4 portrait) assumed when a page has no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (595.0, 842.0);

/// One page of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRef {
    /// 1-based page number
    pub number: u32,
    pub id: PageId,
    /// Width in points
    pub width: f32,
    /// Height in points
    pub height: f32,
}

/// A content-stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f32),
    Name(Vec<u8>),
    /// String operand, still encoded
    Bytes(Vec<u8>),
    Array(Vec<Operand>),
    Other,
}

impl Operand {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl From<&Object> for Operand {
    fn from(obj: &Object) -> Self {
        match obj {
            Object::Integer(i) => Operand::Number(*i as f32),
            Object::Real(r) => Operand::Number(*r),
            Object::Name(n) => Operand::Name(n.clone()),
            Object::String(b, _) => Operand::Bytes(b.clone()),
            Object::Array(items) => Operand::Array(items.iter().map(Operand::from).collect()),
            _ => Operand::Other,
        }
    }
}

/// A content-stream operator with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Operand>,
}

impl Operation {
    /// The numeric operands, in order.
    pub fn numbers(&self) -> Vec<f32> {
        self.operands.iter().filter_map(Operand::as_number).collect()
    }
}

/// A font resource of a page.
struct PageFont<'a> {
    base_name: String,
    encoding: Option<Encoding<'a>>,
}

/// The font resources of one page, resolved once for all its text.
#[derive(Default)]
pub struct PageFonts<'a> {
    fonts: HashMap<Vec<u8>, PageFont<'a>>,
}

impl<'a> PageFonts<'a> {
    /// Fonts known by base name only; their text decodes with [`decode_fallback`].
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, String)>,
    {
        let fonts = names
            .into_iter()
            .map(|(resource, base_name)| {
                (
                    resource,
                    PageFont {
                        base_name,
                        encoding: None,
                    },
                )
            })
            .collect();
        Self { fonts }
    }

    /// Base font name of resource `font`.
    pub fn base_name(&self, font: &[u8]) -> Option<&str> {
        self.fonts.get(font).map(|f| f.base_name.as_str())
    }

    /// Decode a shown string with the encoding of resource `font`.
    pub fn decode(&self, font: &[u8], bytes: &[u8]) -> String {
        self.fonts
            .get(font)
            .and_then(|f| f.encoding.as_ref())
            .and_then(|enc| LopdfDocument::decode_text(enc, bytes).ok())
            .unwrap_or_else(|| decode_fallback(bytes))
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Read access to a PDF document.
pub trait PdfBackend {
    /// Pages in document order.
    fn pages(&self) -> &[PageRef];

    /// Look up a page by its 1-based number.
    fn page(&self, number: u32) -> Option<PageRef> {
        let pages = self.pages();
        pages
            .binary_search_by_key(&number, |p| p.number)
            .ok()
            .map(|i| pages[i])
    }

    /// Font resources of a page.
    fn fonts(&self, page: PageId) -> Result<PageFonts<'_>>;

    /// Operations of a page's content stream. A page without content has none.
    fn operations(&self, page: PageId) -> Result<Vec<Operation>>;
}

/// Decode string bytes without font information: UTF-16BE with a BOM,
/// UTF-8, else Latin-1.
pub fn decode_fallback(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// [`PdfBackend`] over an in-memory `lopdf::Document`.
///
/// The document is parsed once; it can be shared between threads rendering
/// different pages.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: Vec<PageRef>,
}

impl LopdfBackend {
    /// Parse a document from its bytes. Encrypted documents are refused.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::PdfParse("document is encrypted".into()),
            _ => Error::from(e),
        })?;
        let mut backend = Self {
            doc,
            pages: Vec::new(),
        };
        let pages = backend
            .doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| {
                let (width, height) = backend.media_box(id);
                PageRef {
                    number,
                    id,
                    width,
                    height,
                }
            })
            .collect();
        backend.pages = pages;
        Ok(backend)
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn media_box(&self, page: PageId) -> (f32, f32) {
        let corners = self
            .doc
            .get_dictionary(page)
            .ok()
            .and_then(|d| d.get(b"MediaBox").ok())
            .and_then(|o| self.resolve(o))
            .and_then(|o| o.as_array().ok())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| Operand::from(i).as_number())
                    .collect::<Vec<_>>()
            });

        match corners.as_deref() {
            Some([x0, y0, x1, y1]) => ((x1 - x0).abs(), (y1 - y0).abs()),
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(r) => self.doc.get_object(*r).ok(),
            other => Some(other),
        }
    }

    fn stream_bytes(&self, obj: &Object) -> Option<Vec<u8>> {
        match self.resolve(obj)? {
            Object::Stream(s) => Some(s.decompressed_content().unwrap_or_else(|_| s.content.clone())),
            _ => None,
        }
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>> {
        let dict = self
            .doc
            .get_dictionary(page)
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let Ok(contents) = dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match self.resolve(contents) {
            Some(Object::Array(parts)) => {
                let mut content = Vec::new();
                for part in parts {
                    if let Some(bytes) = self.stream_bytes(part) {
                        content.extend_from_slice(&bytes);
                        content.push(b'\n');
                    }
                }
                Ok(content)
            }
            Some(Object::Stream(_)) => self
                .stream_bytes(contents)
                .ok_or_else(|| Error::PdfParse("unreadable content stream".into())),
            _ => Err(Error::PdfParse(format!(
                "page {} {} has an invalid content stream",
                page.0, page.1
            ))),
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> &[PageRef] {
        &self.pages
    }

    fn fonts(&self, page: PageId) -> Result<PageFonts<'_>> {
        let fonts = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let fonts = fonts
            .into_iter()
            .map(|(resource, dict)| {
                let base_name = dict
                    .get(b"BaseFont")
                    .and_then(|o| o.as_name())
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&resource).into_owned());
                let encoding = dict.get_font_encoding(&self.doc).ok();
                (
                    resource,
                    PageFont {
                        base_name,
                        encoding,
                    },
                )
            })
            .collect();
        Ok(PageFonts { fonts })
    }

    fn operations(&self, page: PageId) -> Result<Vec<Operation>> {
        let content = self.page_content(page)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let decoded = lopdf::content::Content::decode(&content)
            .map_err(|e| Error::PdfParse(format!("page {}: {}", page.0, e)))?;
        Ok(decoded
            .operations
            .into_iter()
            .map(|op| Operation {
                operands: op.operands.iter().map(Operand::from).collect(),
                operator: op.operator,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fallback() {
        assert_eq!(decode_fallback(b"ENEL SPA"), "ENEL SPA");
        // 0xE9 is Latin-1 'é'
        assert_eq!(decode_fallback(&[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9]), "Société");
        assert_eq!(decode_fallback(&[0xFE, 0xFF, 0x00, 0x45, 0x00, 0x55, 0x00, 0x52]), "EUR");
    }

    #[test]
    fn test_operand_from_object() {
        assert_eq!(Operand::from(&Object::Integer(42)).as_number(), Some(42.0));
        assert_eq!(Operand::from(&Object::Real(2.5)).as_number(), Some(2.5));
        assert_eq!(
            Operand::from(&Object::Name(b"F1".to_vec())).as_name(),
            Some(&b"F1"[..])
        );
        assert_eq!(Operand::from(&Object::Null), Operand::Other);
    }

    #[test]
    fn test_operation_numbers() {
        let op = Operation {
            operator: "Tf".into(),
            operands: vec![Operand::Name(b"F1".to_vec()), Operand::Number(9.0)],
        };
        assert_eq!(op.numbers(), vec![9.0]);
    }

    #[test]
    fn test_page_fonts_from_names() {
        let fonts = PageFonts::from_names([(b"F1".to_vec(), "Frutiger-Light".to_string())]);
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts.base_name(b"F1"), Some("Frutiger-Light"));
        assert_eq!(fonts.base_name(b"F2"), None);
        assert_eq!(fonts.decode(b"F1", b"ENEL"), "ENEL");
        assert_eq!(fonts.decode(b"F9", b"ENI"), "ENI");
    }

    #[test]
    fn test_load_garbage_fails() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"not a pdf"),
            Err(Error::PdfParse(_)) | Err(Error::Io(_))
        ));
    }
}
