//! PDF processing layer
//!
//! Text extraction using PDFium.

mod reader;

pub use reader::{join_pages, PdfReader, PdfiumExtractor, TextExtractor};
pub(crate) use reader::check_pdf_header;
