//! Contract Review MCP Server Library
//!
//! This crate provides MCP tools for reviewing contract PDFs:
//! - `analyze_contracts`: Extract each contract's text, analyze it with a
//!   chat-completion model and render a summary report
//! - `extract_text`: Extract text content from PDFs
//! - `list_contracts`: List PDF files in a directory

pub mod analysis;
pub mod config;
pub mod error;
pub mod pdf;
pub mod report;
pub mod review;
pub mod server;
pub mod source;

pub use analysis::{ContractAnalysis, ContractAnalyzer};
pub use config::{AnalyzerConfig, ServerConfig};
pub use error::{Error, ErrorKind, Result};
pub use report::render_report;
pub use review::{ContractReviewer, DocumentReview};
pub use server::{
    run_server, run_server_with_config, AnalyzeContractsParams, ContractServer,
    ExtractTextParams, ListContractsParams, ListContractsResult,
};
pub use source::PdfSource;
