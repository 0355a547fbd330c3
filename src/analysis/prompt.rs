//! Fixed instructions sent with every analysis request

/// System instruction
pub const SYSTEM_PROMPT: &str = "You are an expert legal contract analyzer. \
You read contracts carefully and report only what the text supports.";

/// Literal example of the reply shape the model must follow
pub const SCHEMA_EXAMPLE: &str = r#"{
  "parties": ["Party name", "..."],
  "deadlines": ["Deadline date or description", "..."],
  "payment_terms": "Summary of the payment terms",
  "renewal_dates": ["Renewal date", "..."],
  "risk_clauses": ["Description of a risky clause", "..."],
  "missing_unfavorable_clauses": ["Missing or unfavorable clause", "..."],
  "recommendations": ["Item to review manually", "..."]
}"#;

/// Build the user instruction; the contract text is embedded verbatim
pub fn build_user_prompt(contract_text: &str) -> String {
    format!(
        "Analyze the following contract.\n\n\
         Contract:\n{contract_text}\n\n\
         Respond with strictly JSON and nothing else: a single object with exactly these keys, \
         shaped like this example:\n{SCHEMA_EXAMPLE}\n\n\
         Use an empty list, or an empty string for payment_terms, when the contract says nothing \
         about a field."
    )
}
