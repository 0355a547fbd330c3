//! Server and analyzer configuration

use std::fmt;
use std::time::Duration;

/// Default OpenAI-compatible API root
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
/// Sampling temperature; low to favor factual extraction
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Upper bound on reply length in tokens
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Settings for the outbound chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// API root; `/chat/completions` is appended
    pub api_base: String,
    /// Model identifier sent with every request
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout; `None` leaves the HTTP client's behavior untouched
    pub request_timeout: Option<Duration>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: None,
        }
    }
}

/// Security, source and analyzer configuration for the server
#[derive(Clone)]
pub struct ServerConfig {
    /// Directories that path sources and listings are confined to (empty: no restriction)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Credential used when a tool call does not carry its own
    pub api_key: Option<String>,
    pub analyzer: AnalyzerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            api_key: None,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

// The credential is never printed
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("resource_dirs", &self.resource_dirs)
            .field("allow_private_urls", &self.allow_private_urls)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("analyzer", &self.analyzer)
            .finish()
    }
}

impl ServerConfig {
    /// Build a configuration from `CONTRACT_REVIEW_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset or blank keys keep their defaults; values that fail to parse are
    /// reported and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        config.api_key = get("CONTRACT_REVIEW_API_KEY").or_else(|| get("OPENAI_API_KEY"));

        if let Some(base) = get("CONTRACT_REVIEW_API_BASE") {
            config.analyzer.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("CONTRACT_REVIEW_MODEL") {
            config.analyzer.model = model;
        }
        if let Some(secs) = get("CONTRACT_REVIEW_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    config.analyzer.request_timeout = Some(Duration::from_secs(secs))
                }
                _ => tracing::warn!(value = %secs, "ignoring invalid CONTRACT_REVIEW_TIMEOUT_SECS"),
            }
        }
        if let Some(dirs) = get("CONTRACT_REVIEW_RESOURCE_DIRS") {
            config.resource_dirs = std::env::split_paths(&dirs)
                .map(|p| p.to_string_lossy().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(flag) = get("CONTRACT_REVIEW_ALLOW_PRIVATE_URLS") {
            match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.allow_private_urls = true,
                "0" | "false" | "no" => config.allow_private_urls = false,
                _ => tracing::warn!(
                    value = %flag,
                    "ignoring invalid CONTRACT_REVIEW_ALLOW_PRIVATE_URLS"
                ),
            }
        }
        if let Some(bytes) = get("CONTRACT_REVIEW_MAX_DOWNLOAD_BYTES") {
            match bytes.parse::<u64>() {
                Ok(bytes) => config.max_download_bytes = bytes,
                Err(_) => tracing::warn!(
                    value = %bytes,
                    "ignoring invalid CONTRACT_REVIEW_MAX_DOWNLOAD_BYTES"
                ),
            }
        }

        config
    }
}
