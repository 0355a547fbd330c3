//! MCP Server implementation using rmcp

use crate::analysis::ContractAnalyzer;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::pdf::{PdfReader, PdfiumExtractor, TextExtractor};
use crate::review::{ContractReviewer, DocumentReview};
use crate::source::{PdfSource, SourceResolver};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Contract review MCP Server
#[derive(Clone)]
pub struct ContractServer {
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
    resolver: Arc<SourceResolver>,
    reviewer: Arc<ContractReviewer>,
}

// ============================================================================
// Request/Response types for analyze_contracts
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeContractsParams {
    /// Contract PDFs to analyze, processed in order
    pub sources: Vec<PdfSource>,
    /// API key for the completion service (defaults to the server's configured key)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Include the extracted contract text in each result
    #[serde(default)]
    pub include_text: bool,
}

// ============================================================================
// Request/Response types for extract_text
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractTextParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PageContent {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractTextResult {
    pub source: String,
    pub page_count: u32,
    pub pages: Vec<PageContent>,
    /// All pages concatenated in order; this is what gets analyzed
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for list_contracts
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListContractsParams {
    /// Directory to search for PDF files
    pub directory: String,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "lease*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ContractFileInfo {
    /// Full path to the PDF file
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListContractsResult {
    pub directory: String,
    pub files: Vec<ContractFileInfo>,
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl ContractServer {
    /// Create a server that extracts text with PDFium
    pub fn with_config(config: ServerConfig) -> crate::error::Result<Self> {
        Self::with_extractor(config, Arc::new(PdfiumExtractor))
    }

    /// Create a server with a custom text extractor
    pub fn with_extractor(
        config: ServerConfig,
        extractor: Arc<dyn TextExtractor>,
    ) -> crate::error::Result<Self> {
        let analyzer = ContractAnalyzer::from_config(&config.analyzer)?;
        let resolver = Arc::new(SourceResolver::new(&config)?);
        let reviewer = ContractReviewer::new(Arc::clone(&resolver), extractor, analyzer);
        Ok(Self {
            tool_router: Self::tool_router(),
            resolver,
            reviewer: Arc::new(reviewer),
            config: Arc::new(config),
        })
    }

    /// Analyze contract PDFs with the completion service
    #[tool(
        description = "Analyze contract PDFs and produce a summary report for each: parties, deadlines, payment terms, renewal dates, risk clauses, missing or unfavorable clauses, and recommendations.

Each document is processed independently; a failure on one document is reported in its own result and does not stop the others.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn analyze_contracts(
        &self,
        Parameters(params): Parameters<AnalyzeContractsParams>,
    ) -> String {
        let results = self.process_analyze_contracts(&params).await;
        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract text content from PDF files
    #[tool(
        description = "Extract the text of contract PDFs, page by page and as the single concatenated text that analyze_contracts sends for analysis.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn extract_text(&self, Parameters(params): Parameters<ExtractTextParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_text(source, params.password.clone())
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        source = %source.display_name(),
                        error = %e,
                        "extract_text failed"
                    );
                    ExtractTextResult {
                        source: source.display_name(),
                        page_count: 0,
                        pages: vec![],
                        text: String::new(),
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List contract PDFs in a directory
    #[tool(
        description = "List PDF files in a directory, to find contracts before analyzing them.

Returns the full path (usable as a {\"path\": ...} source), filename, size in bytes and last modified time of each file. Supports recursive search and glob pattern filtering."
    )]
    async fn list_contracts(&self, Parameters(params): Parameters<ListContractsParams>) -> String {
        let result = self.process_list_contracts(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_contracts failed");
            ListContractsResult {
                directory: params.directory.clone(),
                files: vec![],
                total_count: 0,
                error: Some(e.client_message()),
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl ContractServer {
    /// The tool call's key wins over the configured one; blank keys count as absent
    fn credential<'a>(&'a self, params: &'a AnalyzeContractsParams) -> Option<&'a str> {
        let non_blank = |key: &'a String| Some(key.trim()).filter(|k| !k.is_empty());
        params
            .api_key
            .as_ref()
            .and_then(non_blank)
            .or_else(|| self.config.api_key.as_ref().and_then(non_blank))
    }

    /// Review every source in order; each failure stays on its own result
    pub async fn process_analyze_contracts(
        &self,
        params: &AnalyzeContractsParams,
    ) -> Vec<DocumentReview> {
        self.reviewer
            .review_batch(
                &params.sources,
                params.password.as_deref(),
                self.credential(params),
                params.include_text,
            )
            .await
    }

    async fn process_extract_text(
        &self,
        source: &PdfSource,
        password: Option<String>,
    ) -> crate::error::Result<ExtractTextResult> {
        let data = self.resolver.resolve(source).await?;

        // Move CPU-heavy PDF work to blocking thread pool
        let reader = tokio::task::spawn_blocking(move || {
            PdfReader::open_bytes(&data, password.as_deref())
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let pages: Vec<PageContent> = reader
            .extract_all_text()?
            .into_iter()
            .map(|(page, text)| PageContent { page, text })
            .collect();

        Ok(ExtractTextResult {
            source: source.display_name(),
            page_count: reader.page_count(),
            pages,
            text: reader.full_text(),
            error: None,
        })
    }

    pub fn process_list_contracts(
        &self,
        params: &ListContractsParams,
    ) -> crate::error::Result<ListContractsResult> {
        let dir_path = self.resolver.check_path_access(&params.directory)?;

        if !dir_path.exists() {
            return Err(Error::PdfNotFound {
                path: params.directory.clone(),
            });
        }
        if !dir_path.is_dir() {
            return Err(Error::SourceResolution {
                reason: format!("{} is not a directory", params.directory),
            });
        }

        let pattern = match params.pattern.as_deref() {
            Some(p) => Some(glob::Pattern::new(p).map_err(|e| Error::SourceResolution {
                reason: format!("Invalid pattern {:?}: {}", p, e),
            })?),
            None => None,
        };

        let mut files = collect_pdfs(&dir_path, params.recursive, pattern.as_ref())?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(ListContractsResult {
            directory: params.directory.clone(),
            total_count: files.len() as u32,
            files,
            error: None,
        })
    }
}

/// Walk `root` (and subdirectories when `recursive`) for `.pdf` files.
/// Unreadable subdirectories are skipped; an unreadable root is an error.
fn collect_pdfs(
    root: &Path,
    recursive: bool,
    pattern: Option<&glob::Pattern>,
) -> crate::error::Result<Vec<ContractFileInfo>> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(Error::Io(e)),
            Err(_) => continue,
        };

        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
                continue;
            }

            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if pattern.is_some_and(|p| !p.matches(&name)) {
                continue;
            }

            let metadata = std::fs::metadata(&path).ok();
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

            files.push(ContractFileInfo {
                path: path.to_string_lossy().to_string(),
                name,
                size: metadata.map(|m| m.len()).unwrap_or(0),
                modified,
            });
        }
    }

    Ok(files)
}

#[tool_handler]
impl ServerHandler for ContractServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Contract review server: analyze_contracts extracts the text of PDF contracts and \
                 summarizes parties, deadlines, payment terms, renewal dates, risk clauses, \
                 missing clauses and recommendations. extract_text and list_contracts help \
                 inspect and find documents."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration taken from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::from_env()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    if config.api_key.is_none() {
        tracing::warn!("no API key configured; analyze_contracts calls must pass api_key");
    }
    tracing::debug!(?config, "server configuration");

    let server = ContractServer::with_config(config)?;

    tracing::info!("Contract review server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
