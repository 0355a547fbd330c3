//! Per-document review pipeline: resolve, extract, analyze, render
//!
//! Documents are handled strictly one after another. Whatever goes wrong
//! with one document is recorded on that document's [`DocumentReview`] and
//! the batch moves on.

use crate::analysis::{CompletionBackend, ContractAnalysis, ContractAnalyzer, OpenAiClient};
use crate::error::{Error, ErrorKind, Result};
use crate::pdf::TextExtractor;
use crate::report::render_report;
use crate::source::{PdfSource, SourceResolver};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of reviewing one document
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct DocumentReview {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ContractAnalysis>,
    /// Rendered seven-section report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// Extracted contract text, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReview {
    /// Record a failure; the full error is logged, the client sees the safe message
    pub fn failed(source: String, err: &Error) -> Self {
        tracing::warn!(
            source = %source,
            kind = ?err.kind(),
            error = %err,
            "contract review failed"
        );
        Self {
            error: Some(format!("{}: {}", source, err.client_message())),
            error_kind: Some(err.kind()),
            source,
            analysis: None,
            report: None,
            text: None,
        }
    }

    fn succeeded(source: String, reviewed: ReviewedContract, include_text: bool) -> Self {
        let report = render_report(&source, &reviewed.analysis);
        Self {
            source,
            report: Some(report),
            analysis: Some(reviewed.analysis),
            text: include_text.then_some(reviewed.text),
            error_kind: None,
            error: None,
        }
    }

    /// Build the review for `source` from its pipeline outcome
    pub fn from_outcome(
        source: String,
        outcome: Result<ReviewedContract>,
        include_text: bool,
    ) -> Self {
        match outcome {
            Ok(reviewed) => Self::succeeded(source, reviewed, include_text),
            Err(e) => Self::failed(source, &e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Extracted text together with its analysis
pub struct ReviewedContract {
    pub text: String,
    pub analysis: ContractAnalysis,
}

/// Runs documents through resolution, extraction and analysis
pub struct ContractReviewer<B = OpenAiClient> {
    resolver: Arc<SourceResolver>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: ContractAnalyzer<B>,
}

impl<B: CompletionBackend> ContractReviewer<B> {
    pub fn new(
        resolver: Arc<SourceResolver>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: ContractAnalyzer<B>,
    ) -> Self {
        Self {
            resolver,
            extractor,
            analyzer,
        }
    }

    /// Extract text on the blocking pool; PDF work is CPU-bound
    pub async fn extract(&self, data: Vec<u8>, password: Option<String>) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&data, password.as_deref()))
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })?
    }

    /// Resolve, extract and analyze one document
    pub async fn review(
        &self,
        source: &PdfSource,
        password: Option<String>,
        credential: &str,
    ) -> Result<ReviewedContract> {
        let data = self.resolver.resolve(source).await?;
        let text = self.extract(data, password).await?;
        if text.trim().is_empty() {
            tracing::warn!(
                source = %source.display_name(),
                "no extractable text; the PDF may be scanned images"
            );
        }

        let analysis = self.analyzer.analyze(&text, credential).await?;
        tracing::info!(
            source = %source.display_name(),
            parties = analysis.parties().len(),
            "contract analyzed"
        );

        Ok(ReviewedContract { text, analysis })
    }

    /// Review every source in order, isolating failures per document.
    ///
    /// Without a credential every source fails with
    /// [`Error::MissingCredential`] and nothing is resolved or sent.
    pub async fn review_batch(
        &self,
        sources: &[PdfSource],
        password: Option<&str>,
        credential: Option<&str>,
        include_text: bool,
    ) -> Vec<DocumentReview> {
        let Some(credential) = credential else {
            return sources
                .iter()
                .map(|source| {
                    DocumentReview::failed(source.display_name(), &Error::MissingCredential)
                })
                .collect();
        };

        tracing::info!(documents = sources.len(), "analyzing contracts");
        let mut results = Vec::with_capacity(sources.len());

        for source in sources {
            let outcome = self
                .review(source, password.map(str::to_string), credential)
                .await;
            results.push(DocumentReview::from_outcome(
                source.display_name(),
                outcome,
                include_text,
            ));
        }

        results
    }
}
