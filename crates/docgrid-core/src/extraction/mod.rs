pub mod pdftotext;
pub mod table;

use crate::error::DocgridError;

/// Share of replacement characters above which a page's text layer is treated as garbage.
pub const DEGRADED_THRESHOLD: f64 = 0.30;

/// Content extracted from a single page of a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
    /// The text layer was present but unusable; `lines` is empty.
    pub degraded: bool,
}

impl PageContent {
    /// Build a page from raw text, flagging it when the text is mostly U+FFFD.
    pub fn from_text(page_number: usize, text: &str) -> PageContent {
        if is_degraded_text(text) {
            return PageContent {
                page_number,
                lines: Vec::new(),
                degraded: true,
            };
        }
        PageContent {
            page_number,
            lines: text.lines().map(|l| l.to_string()).collect(),
            degraded: false,
        }
    }
}

fn is_degraded_text(text: &str) -> bool {
    let mut total = 0usize;
    let mut garbage = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c == char::REPLACEMENT_CHARACTER {
            garbage += 1;
        }
    }
    total > 0 && (garbage as f64) / (total as f64) > DEGRADED_THRESHOLD
}

/// A finite, one-shot sequence of pages in increasing page order.
///
/// The page count is known before any page is consumed.
pub struct PageStream {
    page_count: usize,
    pages: Box<dyn Iterator<Item = PageContent> + Send>,
}

impl PageStream {
    pub fn new(page_count: usize, pages: Box<dyn Iterator<Item = PageContent> + Send>) -> Self {
        PageStream { page_count, pages }
    }

    /// Wrap already materialized pages.
    pub fn from_pages(pages: Vec<PageContent>) -> Self {
        PageStream {
            page_count: pages.len(),
            pages: Box::new(pages.into_iter()),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl Iterator for PageStream {
    type Item = PageContent;

    fn next(&mut self) -> Option<PageContent> {
        self.pages.next()
    }
}

impl std::fmt::Debug for PageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("page_count", &self.page_count)
            .finish_non_exhaustive()
    }
}

/// Trait for PDF text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract text from PDF bytes as a lazy page sequence.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<PageStream, DocgridError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Reject byte buffers that are not PDFs before handing them to a backend.
pub fn ensure_pdf_header(pdf_bytes: &[u8]) -> Result<(), DocgridError> {
    // Some producers put junk before the header; the format allows it within the first KiB.
    let window = &pdf_bytes[..pdf_bytes.len().min(1024)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(DocgridError::UnreadablePdf {
            reason: "missing %PDF- header".into(),
        })
    }
}
