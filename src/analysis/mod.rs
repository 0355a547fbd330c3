//! Contract analysis through a chat-completion service
//!
//! The flow for one document is: build the fixed prompt pair, send one
//! request, strip code fences from the reply, parse and validate the JSON
//! into a [`ContractAnalysis`].

mod analyzer;
mod client;
mod fence;
mod model;
mod prompt;

pub use analyzer::ContractAnalyzer;
pub use client::{ChatMessage, ChatRequest, CompletionBackend, OpenAiClient};
pub use fence::strip_code_fences;
pub use model::ContractAnalysis;
pub use prompt::{build_user_prompt, SCHEMA_EXAMPLE, SYSTEM_PROMPT};
