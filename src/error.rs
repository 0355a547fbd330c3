//! Error types for the contract review server

use serde::Serialize;
use thiserror::Error;

/// Result type alias for the contract review server
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure category reported alongside every per-document error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The PDF source could not be located or fetched
    Source,
    /// The PDF could not be read or contained no usable text layer
    Extraction,
    /// The completion service could not be reached or refused the request
    Service,
    /// The completion service replied with malformed or non-conforming JSON
    Schema,
}

/// Error types for the contract review server
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// No credential was supplied for the completion service
    #[error("No API key configured for the completion service")]
    MissingCredential,

    /// HTTP request error (network, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The completion service answered with a non-success status
    #[error("Completion service returned {status}: {body}")]
    ServiceStatus { status: u16, body: String },

    /// The completion service answered without a usable message
    #[error("Completion service error: {reason}")]
    Service { reason: String },

    /// The reply was not valid JSON or did not match the analysis schema
    #[error("Invalid analysis reply: {reason}\nraw reply:\n{raw}")]
    Schema { reason: String, raw: String },
}

impl Error {
    /// Category of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PdfNotFound { .. }
            | Error::SourceResolution { .. }
            | Error::Base64Decode(_)
            | Error::Io(_)
            | Error::PathAccessDenied { .. }
            | Error::SsrfBlocked { .. }
            | Error::DownloadTooLarge { .. } => ErrorKind::Source,
            Error::InvalidPdf { .. }
            | Error::PasswordRequired
            | Error::PageOutOfBounds { .. }
            | Error::Pdfium { .. } => ErrorKind::Extraction,
            Error::MissingCredential
            | Error::HttpRequest(_)
            | Error::ServiceStatus { .. }
            | Error::Service { .. } => ErrorKind::Service,
            Error::Schema { .. } => ErrorKind::Schema,
        }
    }

    /// Return a message safe to send to clients.
    /// Local paths, library internals and response bodies are omitted, except
    /// for schema failures where the raw reply is needed to diagnose the model.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::MissingCredential => "No API key provided".to_string(),
            Error::HttpRequest(e) if e.is_timeout() => {
                "Completion service request timed out".to_string()
            }
            Error::HttpRequest(_) => "Completion service request failed".to_string(),
            Error::ServiceStatus { status, .. } => match status {
                401 | 403 => format!("Completion service rejected the API key ({})", status),
                429 => "Completion service rate limit exceeded (429)".to_string(),
                _ => format!("Completion service returned status {}", status),
            },
            Error::Service { reason } => format!("Completion service error: {}", reason),
            Error::Schema { reason, raw } => {
                format!("Could not parse analysis: {}\nRaw reply:\n{}", reason, raw)
            }
        }
    }
}
