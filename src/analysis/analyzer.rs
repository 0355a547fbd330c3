//! Contract analysis: prompt, one completion call, reply validation

use super::client::{ChatMessage, ChatRequest, CompletionBackend, OpenAiClient};
use super::model::ContractAnalysis;
use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};

/// Turns contract text into a [`ContractAnalysis`] through a completion backend
pub struct ContractAnalyzer<B = OpenAiClient> {
    backend: B,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ContractAnalyzer<OpenAiClient> {
    /// Analyzer talking to the OpenAI-compatible API described by `config`
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let backend = OpenAiClient::new(&config.api_base, config.request_timeout)?;
        Ok(Self::with_backend(backend, config))
    }
}

impl<B: CompletionBackend> ContractAnalyzer<B> {
    pub fn with_backend(backend: B, config: &AnalyzerConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The request sent for `contract_text`
    pub fn build_request(&self, contract_text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_user_prompt(contract_text)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Analyze one contract.
    ///
    /// Issues exactly one request; failures are returned as-is and never
    /// retried. The text is sent untruncated.
    pub async fn analyze(&self, contract_text: &str, credential: &str) -> Result<ContractAnalysis> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(Error::MissingCredential);
        }

        let request = self.build_request(contract_text);
        tracing::info!(
            model = %self.model,
            text_chars = contract_text.chars().count(),
            "requesting contract analysis"
        );

        let reply = self.backend.complete(&request, credential).await?;
        tracing::debug!(reply_chars = reply.chars().count(), "analysis reply received");

        ContractAnalysis::from_reply(&reply)
    }
}
