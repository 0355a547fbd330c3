//! Plain-text rendering of a contract analysis

use crate::analysis::ContractAnalysis;
use std::fmt::Write;

/// Shown in place of a section with no content
pub const PLACEHOLDER: &str = "N/A";

enum SectionBody<'a> {
    List(&'a [String]),
    Text(&'a str),
}

fn sections(analysis: &ContractAnalysis) -> [(&'static str, SectionBody<'_>); 7] {
    [
        ("Parties Involved", SectionBody::List(analysis.parties())),
        ("Deadlines", SectionBody::List(analysis.deadlines())),
        ("Payment Terms", SectionBody::Text(analysis.payment_terms())),
        ("Renewal Dates", SectionBody::List(analysis.renewal_dates())),
        (
            "Critical Risk Clauses",
            SectionBody::List(analysis.risk_clauses()),
        ),
        (
            "Missing/Unfavorable Clauses",
            SectionBody::List(analysis.missing_unfavorable_clauses()),
        ),
        (
            "Recommendations",
            SectionBody::List(analysis.recommendations()),
        ),
    ]
}

/// Render the seven report sections as Markdown, headed by the document name
pub fn render_report(document: &str, analysis: &ContractAnalysis) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "# Contract Analysis: {}", document);

    for (title, body) in sections(analysis) {
        let _ = writeln!(out, "\n## {}", title);
        match body {
            SectionBody::List(items) if !items.is_empty() => {
                for item in items {
                    let _ = writeln!(out, "- {}", item);
                }
            }
            SectionBody::Text(text) if !text.trim().is_empty() => {
                let _ = writeln!(out, "{}", text.trim());
            }
            _ => {
                let _ = writeln!(out, "{}", PLACEHOLDER);
            }
        }
    }

    out
}
