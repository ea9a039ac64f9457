use crate::error::DocgridError;
use crate::extraction::{ensure_pdf_header, PageContent, PageStream, PdfExtractor};
use std::io::Write;
use std::process::Command;
use tracing::debug;

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -layout` to preserve whitespace alignment of tables.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<PageStream, DocgridError> {
        ensure_pdf_header(pdf_bytes)?;

        // pdftotext only reads from a path; the file lives until extraction returns.
        let mut tmpfile =
            tempfile::NamedTempFile::new().map_err(|e| DocgridError::Extraction(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| DocgridError::Extraction(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(tmpfile.path())
            .arg("-") // output to stdout
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DocgridError::PdftotextNotFound
                } else {
                    DocgridError::Extraction(format!("pdftotext failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("pdftotext exited with code {}", output.status.code().unwrap_or(-1))
            } else {
                stderr
            };
            return Err(DocgridError::UnreadablePdf { reason });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let pages = FormFeedPages::new(text);
        debug!(pages = pages.page_count(), "pdftotext produced text layer");
        Ok(PageStream::new(pages.page_count(), Box::new(pages)))
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Splits pdftotext output on form feeds, one page at a time.
pub struct FormFeedPages {
    text: String,
    pos: usize,
    next_page: usize,
    page_count: usize,
}

impl FormFeedPages {
    pub fn new(text: String) -> Self {
        // pdftotext terminates every page, including the last, with \x0c.
        let feeds = text.matches('\x0c').count();
        let page_count = if text.is_empty() {
            0
        } else if text.ends_with('\x0c') {
            feeds
        } else {
            feeds + 1
        };
        FormFeedPages {
            text,
            pos: 0,
            next_page: 1,
            page_count,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl Iterator for FormFeedPages {
    type Item = PageContent;

    fn next(&mut self) -> Option<PageContent> {
        if self.next_page > self.page_count {
            return None;
        }
        let rest = &self.text[self.pos..];
        let end = rest.find('\x0c').unwrap_or(rest.len());
        let page = PageContent::from_text(self.next_page, &rest[..end]);
        self.pos = (self.pos + end + 1).min(self.text.len());
        self.next_page += 1;
        Some(page)
    }
}
