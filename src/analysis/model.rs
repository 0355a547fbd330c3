//! The structured contract summary and its schema validation

use super::fence::strip_code_fences;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Structured summary of one contract.
///
/// Built once from the model's reply and read-only afterwards. Every list
/// field defaults to empty and `payment_terms` to an empty string when the
/// reply omits the key or sets it to `null`; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct ContractAnalysis {
    parties: Vec<String>,
    deadlines: Vec<String>,
    payment_terms: String,
    renewal_dates: Vec<String>,
    risk_clauses: Vec<String>,
    missing_unfavorable_clauses: Vec<String>,
    recommendations: Vec<String>,
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Null => "null",
        serde_json::Value::Object(_) => "an object",
    }
}

impl ContractAnalysis {
    /// Parse a raw completion reply: strip code fences, parse JSON, validate.
    ///
    /// Every failure is an [`Error::Schema`] carrying the stripped text.
    pub fn from_reply(reply: &str) -> Result<Self> {
        let payload = strip_code_fences(reply);
        let schema_error = |reason: String| Error::Schema {
            reason,
            raw: payload.to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| schema_error(format!("reply is not valid JSON: {}", e)))?;

        let mut object = match value {
            serde_json::Value::Object(object) => object,
            other => {
                return Err(schema_error(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        // An explicit null means the same as an omitted key
        object.retain(|_, v| !v.is_null());

        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| schema_error(format!("reply does not match the analysis schema: {}", e)))
    }

    pub fn parties(&self) -> &[String] {
        &self.parties
    }

    pub fn deadlines(&self) -> &[String] {
        &self.deadlines
    }

    pub fn payment_terms(&self) -> &str {
        &self.payment_terms
    }

    pub fn renewal_dates(&self) -> &[String] {
        &self.renewal_dates
    }

    pub fn risk_clauses(&self) -> &[String] {
        &self.risk_clauses
    }

    pub fn missing_unfavorable_clauses(&self) -> &[String] {
        &self.missing_unfavorable_clauses
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}
