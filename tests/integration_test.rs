//! Integration tests for the contract review server

use base64::Engine;
use contract_review_mcp::analysis::{ContractAnalyzer, SYSTEM_PROMPT};
use contract_review_mcp::pdf::{PdfReader, TextExtractor};
use contract_review_mcp::{
    render_report, AnalyzeContractsParams, AnalyzerConfig, ContractAnalysis, ContractServer,
    Error, ErrorKind, PdfSource, ServerConfig,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ============================================================================
// Fake chat-completion service
// ============================================================================

struct RecordedRequest {
    head: String,
    body: Value,
}

struct FakeCompletionService {
    api_base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeCompletionService {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            api_base: self.api_base.clone(),
            ..AnalyzerConfig::default()
        }
    }
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

/// Serve `responses` in order, repeating the last one once they run out
async fn spawn_fake_service(responses: Vec<(u16, String)>) -> FakeCompletionService {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    tokio::spawn(async move {
        let mut served = 0usize;
        while let Ok((mut stream, _)) = listener.accept().await {
            let request = read_request(&mut stream).await;
            recorded.lock().unwrap().push(request);

            let (status, body) = &responses[served.min(responses.len() - 1)];
            served += 1;
            let response = format!(
                "HTTP/1.1 {} Fake\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    FakeCompletionService {
        api_base: format!("http://{}/v1", addr),
        requests,
    }
}

async fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.expect("read body");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buf[head_end..head_end + length]).unwrap_or(Value::Null);
    RecordedRequest { head, body }
}

const EXAMPLE_REPLY: &str = r#"{"parties":["Party A","Party B"],"deadlines":[],"payment_terms":"Monthly payments","renewal_dates":[],"risk_clauses":[],"missing_unfavorable_clauses":[],"recommendations":[]}"#;

const EXAMPLE_CONTRACT: &str =
    "Party A and Party B agree to a 12-month term, payment due monthly.";

// ============================================================================
// Analyzer against the HTTP service
// ============================================================================

#[tokio::test]
async fn test_analyze_round_trip() {
    let service = spawn_fake_service(vec![(200, completion_body(EXAMPLE_REPLY))]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let analysis = analyzer
        .analyze(EXAMPLE_CONTRACT, "sk-integration")
        .await
        .unwrap();
    assert_eq!(analysis.parties(), ["Party A", "Party B"]);
    assert_eq!(analysis.payment_terms(), "Monthly payments");
    assert!(analysis.deadlines().is_empty());

    let requests = service.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.head.starts_with("POST /v1/chat/completions "));
    assert!(request
        .head
        .to_ascii_lowercase()
        .contains("authorization: bearer sk-integration"));

    assert_eq!(request.body["model"], "gpt-4-turbo-preview");
    assert_eq!(request.body["max_tokens"], 1500);
    let temperature = request.body["temperature"].as_f64().unwrap();
    assert!((temperature - 0.2).abs() < 1e-6);

    let messages = request.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], SYSTEM_PROMPT);
    assert_eq!(messages[1]["role"], "user");
    assert!(messages[1]["content"]
        .as_str()
        .unwrap()
        .contains(EXAMPLE_CONTRACT));
}

#[tokio::test]
async fn test_fenced_reply_with_missing_keys() {
    let reply = "```json\n{\"parties\": [\"Lessor\", \"Lessee\"], \"renewal_dates\": null}\n```";
    let service = spawn_fake_service(vec![(200, completion_body(reply))]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let analysis = analyzer.analyze("lease text", "sk-test").await.unwrap();
    assert_eq!(analysis.parties(), ["Lessor", "Lessee"]);
    assert!(analysis.renewal_dates().is_empty());
    assert_eq!(analysis.payment_terms(), "");
}

#[tokio::test]
async fn test_non_json_reply_is_schema_error_with_raw_text() {
    let reply = "I'm sorry, but I can't analyze this document.";
    let service = spawn_fake_service(vec![(200, completion_body(reply))]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let err = analyzer.analyze("text", "sk-test").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.client_message().contains(reply));
}

#[tokio::test]
async fn test_wrong_field_type_is_schema_error() {
    let reply = r#"{"parties": "Party A"}"#;
    let service = spawn_fake_service(vec![(200, completion_body(reply))]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let err = analyzer.analyze("text", "sk-test").await.unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
}

#[tokio::test]
async fn test_rejected_key_is_service_error() {
    let body = r#"{"error":{"message":"Incorrect API key provided: sk-bad","type":"invalid_request_error"}}"#;
    let service = spawn_fake_service(vec![(401, body.to_string())]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let err = analyzer.analyze("text", "sk-bad").await.unwrap_err();
    assert!(matches!(err, Error::ServiceStatus { status: 401, .. }));
    assert_eq!(err.kind(), ErrorKind::Service);
    let message = err.client_message();
    assert!(message.contains("401"));
    assert!(!message.contains("sk-bad"));
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn test_rate_limit_not_retried() {
    let service = spawn_fake_service(vec![(429, "{}".to_string())]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let err = analyzer.analyze("text", "sk-test").await.unwrap_err();
    assert!(err.client_message().contains("rate limit"));
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn test_empty_choices_is_service_error() {
    let service = spawn_fake_service(vec![(200, r#"{"choices": []}"#.to_string())]).await;
    let analyzer = ContractAnalyzer::from_config(&service.analyzer_config()).unwrap();

    let err = analyzer.analyze("text", "sk-test").await.unwrap_err();
    assert!(matches!(err, Error::Service { .. }));
}

#[tokio::test]
async fn test_unreachable_service() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let analyzer = ContractAnalyzer::from_config(&AnalyzerConfig {
        api_base: format!("http://{}/v1", addr),
        ..AnalyzerConfig::default()
    })
    .unwrap();

    let err = analyzer.analyze("text", "sk-test").await.unwrap_err();
    assert!(matches!(err, Error::HttpRequest(_)));
    assert_eq!(err.kind(), ErrorKind::Service);
}

// ============================================================================
// Report rendering
// ============================================================================

#[test]
fn test_worked_example_report() {
    let analysis = ContractAnalysis::from_reply(EXAMPLE_REPLY).unwrap();
    let report = render_report("contract.pdf", &analysis);

    let expected = "\
# Contract Analysis: contract.pdf

## Parties Involved
- Party A
- Party B

## Deadlines
N/A

## Payment Terms
Monthly payments

## Renewal Dates
N/A

## Critical Risk Clauses
N/A

## Missing/Unfavorable Clauses
N/A

## Recommendations
N/A
";
    assert_eq!(report, expected);
}

// ============================================================================
// Server batches
// ============================================================================

/// Reads everything after the `%PDF-` header as the contract text
struct HeaderStrippingExtractor;

impl TextExtractor for HeaderStrippingExtractor {
    fn extract(&self, data: &[u8], _password: Option<&str>) -> contract_review_mcp::Result<String> {
        let body = data.strip_prefix(b"%PDF-").unwrap_or(data);
        Ok(String::from_utf8_lossy(body).to_string())
    }
}

fn base64_source(data: &[u8]) -> PdfSource {
    PdfSource::Base64 {
        base64: base64::engine::general_purpose::STANDARD.encode(data),
    }
}

fn server_for(service: &FakeCompletionService, api_key: Option<&str>) -> ContractServer {
    let config = ServerConfig {
        api_key: api_key.map(str::to_string),
        analyzer: service.analyzer_config(),
        ..ServerConfig::default()
    };
    ContractServer::with_extractor(config, Arc::new(HeaderStrippingExtractor)).unwrap()
}

#[tokio::test]
async fn test_batch_isolates_bad_document() {
    let service = spawn_fake_service(vec![(200, completion_body(EXAMPLE_REPLY))]).await;
    let server = server_for(&service, Some("sk-config"));

    let params = AnalyzeContractsParams {
        sources: vec![
            base64_source(b"%PDF-Party A hires Party B."),
            base64_source(b"Hello World"),
            base64_source(b"%PDF-Party A leases from Party B."),
        ],
        api_key: None,
        password: None,
        include_text: true,
    };

    let results = server.process_analyze_contracts(&params).await;
    assert_eq!(results.len(), 3);

    assert!(results[0].is_success());
    assert_eq!(results[0].text.as_deref(), Some("Party A hires Party B."));
    assert!(results[0]
        .report
        .as_ref()
        .unwrap()
        .contains("## Parties Involved\n- Party A\n- Party B\n"));

    assert!(!results[1].is_success());
    assert_eq!(results[1].error_kind, Some(ErrorKind::Extraction));
    assert!(results[1].analysis.is_none());

    assert!(results[2].is_success());
    assert_eq!(
        results[2].text.as_deref(),
        Some("Party A leases from Party B.")
    );

    // Only the two readable documents reached the service, in order
    let requests = service.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("hires"));
    assert!(requests[1].body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("leases"));
}

#[tokio::test]
async fn test_batch_continues_after_service_failure() {
    let service = spawn_fake_service(vec![
        (500, r#"{"error":"overloaded"}"#.to_string()),
        (200, completion_body(EXAMPLE_REPLY)),
    ])
    .await;
    let server = server_for(&service, None);

    let params = AnalyzeContractsParams {
        sources: vec![
            base64_source(b"%PDF-first contract"),
            base64_source(b"%PDF-second contract"),
        ],
        api_key: Some("sk-call".to_string()),
        password: None,
        include_text: false,
    };

    let results = server.process_analyze_contracts(&params).await;
    assert_eq!(results[0].error_kind, Some(ErrorKind::Service));
    assert!(results[0].error.as_ref().unwrap().contains("500"));
    assert!(results[1].is_success());
    assert!(results[1].text.is_none());

    let requests = service.requests.lock().unwrap();
    assert!(requests
        .iter()
        .all(|r| r.head.to_ascii_lowercase().contains("bearer sk-call")));
}

#[tokio::test]
async fn test_batch_without_credential_makes_no_requests() {
    let service = spawn_fake_service(vec![(200, completion_body(EXAMPLE_REPLY))]).await;
    let server = server_for(&service, None);

    let params = AnalyzeContractsParams {
        sources: vec![base64_source(b"%PDF-text")],
        api_key: None,
        password: None,
        include_text: false,
    };

    let results = server.process_analyze_contracts(&params).await;
    assert_eq!(results[0].error_kind, Some(ErrorKind::Service));
    assert_eq!(service.request_count(), 0);
}

// ============================================================================
// PDFium extraction
// ============================================================================

/// Build a small uncompressed PDF with one Helvetica text line per page
fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages.len())
                .map(|i| format!("{} 0 R", 4 + 2 * i))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = out.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{:010} 00000 n \n", offset));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.extend_from_slice(tail.as_bytes());
    out
}

#[test]
#[ignore = "requires libpdfium"]
fn test_extract_single_page_contract() {
    let pdf = text_pdf(&["Party A agrees to pay Party B monthly."]);
    let reader = PdfReader::open_bytes(&pdf, None).expect("Failed to open generated PDF");

    assert_eq!(reader.page_count(), 1);
    assert!(reader.full_text().contains("Party A agrees to pay Party B"));
}

#[test]
#[ignore = "requires libpdfium"]
fn test_pages_joined_in_order() {
    let pdf = text_pdf(&["First page terms", "Second page signatures"]);
    let reader = PdfReader::open_bytes(&pdf, None).expect("Failed to open generated PDF");

    assert_eq!(reader.page_count(), 2);
    let pages = reader.extract_all_text().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].0, 1);
    assert!(pages[1].1.contains("Second page"));

    let text = reader.full_text();
    let first = text.find("First page").unwrap();
    let second = text.find("Second page").unwrap();
    assert!(first < second);
    assert!(text[first..second].contains('\n'));
}

#[test]
#[ignore = "requires libpdfium"]
fn test_page_out_of_bounds() {
    let pdf = text_pdf(&["Only page"]);
    let reader = PdfReader::open_bytes(&pdf, None).unwrap();

    assert!(matches!(
        reader.extract_page_text(9999),
        Err(Error::PageOutOfBounds { page: 9999, total: 1 })
    ));
}

#[tokio::test]
#[ignore = "requires libpdfium"]
async fn test_server_analyzes_real_pdf() {
    let service = spawn_fake_service(vec![(200, completion_body(EXAMPLE_REPLY))]).await;
    let server = ContractServer::with_config(ServerConfig {
        api_key: Some("sk-test".to_string()),
        analyzer: service.analyzer_config(),
        ..ServerConfig::default()
    })
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.pdf");
    std::fs::write(&path, text_pdf(&[EXAMPLE_CONTRACT])).unwrap();

    let params = AnalyzeContractsParams {
        sources: vec![PdfSource::Path {
            path: path.to_string_lossy().to_string(),
        }],
        api_key: None,
        password: None,
        include_text: true,
    };

    let results = server.process_analyze_contracts(&params).await;
    assert!(results[0].is_success(), "{:?}", results[0].error);
    assert!(results[0].text.as_ref().unwrap().contains("12-month term"));
}

#[test]
fn test_open_invalid_pdf_bytes() {
    let result = PdfReader::open_bytes(b"not a valid PDF file", None);
    assert!(matches!(result, Err(Error::InvalidPdf { .. })));
}
