//! PDF reader wrapper for PDFium

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Reject anything that does not carry a PDF header before PDFium gets involved
pub(crate) fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// PDF reader using PDFium.
///
/// All page text is pulled out when the document is opened, so the reader
/// holds no PDFium handles afterwards and can be moved across threads.
pub struct PdfReader {
    page_count: u32,
    page_texts: Vec<String>,
}

impl PdfReader {
    /// Open a PDF from bytes
    pub fn open_bytes(data: &[u8], password: Option<&str>) -> Result<Self> {
        check_pdf_header(data)?;

        let pdfium = create_pdfium()?;

        let document = pdfium
            .load_pdf_from_byte_slice(data, password)
            .map_err(Self::map_pdfium_error)?;

        let page_count = document.pages().len() as u32;
        let page_texts = Self::extract_all_page_texts(&document)?;

        Ok(Self {
            page_count,
            page_texts,
        })
    }

    fn extract_all_page_texts(document: &PdfDocument) -> Result<Vec<String>> {
        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);

        for index in 0..pages.len() {
            let page = pages.get(index).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", index + 1, e),
            })?;

            // Image-only pages have no text layer; they contribute nothing
            let text = match page.text() {
                Ok(text_obj) => text_obj.all(),
                Err(e) => {
                    tracing::debug!(page = index + 1, error = %e, "page has no text layer");
                    String::new()
                }
            };
            texts.push(text);
        }

        Ok(texts)
    }

    /// Map PDFium errors to our error type
    fn map_pdfium_error(err: PdfiumError) -> Error {
        match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::PasswordRequired
            }
            _ => Error::Pdfium {
                reason: format!("{}", err),
            },
        }
    }

    /// Get the number of pages
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Extract text from a specific page (1-indexed)
    pub fn extract_page_text(&self, page_num: u32) -> Result<String> {
        if page_num < 1 || page_num > self.page_count {
            return Err(Error::PageOutOfBounds {
                page: page_num,
                total: self.page_count,
            });
        }

        Ok(self.page_texts[(page_num - 1) as usize].clone())
    }

    /// Extract text from all pages
    pub fn extract_all_text(&self) -> Result<Vec<(u32, String)>> {
        let mut results = Vec::new();
        for page_num in 1..=self.page_count {
            let text = self.extract_page_text(page_num)?;
            results.push((page_num, text));
        }
        Ok(results)
    }

    /// Whole-document text in page order, pages separated by a newline
    pub fn full_text(&self) -> String {
        join_pages(&self.page_texts)
    }
}

/// Concatenate page texts in order
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns PDF bytes into plain text
pub trait TextExtractor: Send + Sync {
    /// Extract the text of every page, concatenated in page order
    fn extract(&self, data: &[u8], password: Option<&str>) -> Result<String>;
}

/// [`TextExtractor`] backed by PDFium
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumExtractor;

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, data: &[u8], password: Option<&str>) -> Result<String> {
        Ok(PdfReader::open_bytes(data, password)?.full_text())
    }
}
