//! Where contract PDFs come from

pub mod resolver;

pub use resolver::SourceResolver;

use rmcp::schemars::JsonSchema;
use serde::Serialize;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download PDF from
    Url {
        /// URL of the PDF file
        url: String,
    },
}

impl PdfSource {
    /// Name used for this source in results and logs
    pub fn display_name(&self) -> String {
        match self {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::Url { url } => url.clone(),
        }
    }
}

// Errors name the accepted keys
impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value.as_object().ok_or_else(|| {
            D::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"url\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    _ => "null",
                }
            ))
        })?;

        for key in ["path", "base64", "url"] {
            let Some(v) = obj.get(key) else { continue };
            let s = v
                .as_str()
                .ok_or_else(|| D::Error::custom(format!("\"{}\" must be a string", key)))?
                .to_string();
            return Ok(match key {
                "path" => PdfSource::Path { path: s },
                "base64" => PdfSource::Base64 { base64: s },
                _ => PdfSource::Url { url: s },
            });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(D::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"url\", but got keys: {:?}",
            keys
        )))
    }
}
