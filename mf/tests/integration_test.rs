//! Integration tests for Mapforge
//!
//! These tests drive the pipeline end to end against scripted clients and a
//! local stand-in for the Chat Completions endpoint.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use mapforge::config::{Config, ResolvedLlmConfig};
use mapforge::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
use mapforge::pipeline::{Pipeline, PipelineConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const METADATA: &str = "source_table|source_field|data_type|description\n\
                        acbs_loan|loan_id|NUMBER|loan identifier\n\
                        cap_product_info|cap_product_id|VARCHAR(20)|product code\n\
                        acbs_loan|maturity_dt|DATE|maturity date\n\
                        acbs_loan|loan_id|VARCHAR(10)|later duplicate\n";

const RULES: &str = "acbs_field|cap_field|target_field|transformation_logic\n\
                     loan_id|cap_product_id|loan_identifier|prefer acbs, fallback to cap\n\
                     maturity_dt|N/A|maturity_date|format as ISO date\n";

fn write_inputs(dir: &Path) -> PipelineConfig {
    fs::write(dir.join("metadata.csv"), METADATA).expect("write metadata");
    fs::write(dir.join("mapping_rules.csv"), RULES).expect("write rules");

    let mut config = PipelineConfig::from_config(&Config::default()).expect("default config");
    config.metadata_path = dir.join("metadata.csv");
    config.rules_path = dir.join("mapping_rules.csv");
    config.output_path = dir.join("data").join("ai_generated_mapping.csv");
    config
}

fn field_of(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("Source Field: "))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("")
}

/// Answers by source field and records every prompt it sees
struct ScriptedClient {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.prompt().unwrap_or_default().to_string();
        self.prompts.lock().unwrap().push(prompt.clone());

        match field_of(&prompt) {
            "loan_id" => Ok(CompletionResponse::text("COALESCE(a.loan_id, c.cap_product_id)")),
            "cap_product_id" => Err(LlmError::Timeout(std::time::Duration::from_secs(300))),
            "maturity_dt" => Ok(CompletionResponse::text("CAST(a.maturity_dt AS DATE)")),
            other => Err(LlmError::InvalidResponse(format!("unexpected field {}", other))),
        }
    }
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_writes_one_row_per_candidate() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_inputs(temp_dir.path());
    let output = config.output_path.clone();
    let client = Arc::new(ScriptedClient::new());

    let summary = Pipeline::new(config, client.clone()).run().await.expect("run succeeds");

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.synthesized, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures_by_kind.get("transport"), Some(&1));

    let written = fs::read_to_string(&output).expect("output exists");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(
        lines,
        vec![
            "source_table,source_field,target_field,business_rule,sql_logic",
            "acbs_loan,loan_id,loan_identifier,\"prefer acbs, fallback to cap\",\"COALESCE(a.loan_id, c.cap_product_id)\"",
            "cap_product_info,cap_product_id,loan_identifier,\"prefer acbs, fallback to cap\",",
            "acbs_loan,maturity_dt,maturity_date,format as ISO date,CAST(a.maturity_dt AS DATE)",
        ]
    );
}

#[tokio::test]
async fn test_pipeline_prompts_use_first_metadata_row() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_inputs(temp_dir.path());
    let client = Arc::new(ScriptedClient::new());

    Pipeline::new(config, client.clone()).run().await.expect("run succeeds");

    let prompts = client.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("Source Field: loan_id (NUMBER)"));
    assert!(prompts[0].contains("Description: loan identifier"));
    assert!(!prompts[0].contains("later duplicate"));
    assert!(prompts[1].contains("Source Table: cap_product_info"));
    assert!(prompts.iter().all(|p| p.contains("a.loan_id = c.cap_product_id")));
}

#[tokio::test]
async fn test_pipeline_failure_reason_column() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = write_inputs(temp_dir.path());
    config.include_failure_reason = true;
    config.output_delimiter = b'|';
    let output = config.output_path.clone();

    Pipeline::new(config, Arc::new(ScriptedClient::new()))
        .run()
        .await
        .expect("run succeeds");

    let written = fs::read_to_string(&output).expect("output exists");
    let lines: Vec<&str> = written.lines().collect();
    assert!(lines[0].ends_with("|sql_logic|synthesis_error"));
    assert!(lines[1].ends_with("|"));
    assert!(lines[2].contains("||transport error"));
}

#[tokio::test]
async fn test_pipeline_parallel_matches_sequential() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_inputs(temp_dir.path());

    let sequential = Pipeline::new(config.clone(), Arc::new(ScriptedClient::new()))
        .run()
        .await
        .expect("sequential run");
    let sequential_output = fs::read_to_string(&config.output_path).expect("output exists");

    let mut parallel_config = config.clone();
    parallel_config.synthesis.max_in_flight = 8;
    let parallel = Pipeline::new(parallel_config, Arc::new(ScriptedClient::new()))
        .run()
        .await
        .expect("parallel run");
    let parallel_output = fs::read_to_string(&config.output_path).expect("output exists");

    assert_eq!(sequential.synthesized, parallel.synthesized);
    assert_eq!(sequential_output, parallel_output);
}

// =============================================================================
// Wire Tests
// =============================================================================

/// Serve canned Chat Completions replies; unauthorized for cap_product_id
async fn spawn_completions_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let body_start = loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };

                let head = String::from_utf8_lossy(&buf[..body_start]).to_lowercase();
                let length: usize = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                while buf.len() < body_start + length {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let body = String::from_utf8_lossy(&buf[body_start..]).to_string();

                let (status, payload) = if body.contains("Source Field: cap_product_id (") {
                    ("401 Unauthorized", r#"{"error":{"message":"invalid api key"}}"#.to_string())
                } else {
                    (
                        "200 OK",
                        serde_json::json!({
                            "choices": [{
                                "message": {"content": " COALESCE(a.loan_id, c.cap_product_id) "},
                                "finish_reason": "stop"
                            }],
                            "usage": {"prompt_tokens": 120, "completion_tokens": 12}
                        })
                        .to_string(),
                    )
                };

                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let base_url = spawn_completions_stub().await;
    let client = create_client(&ResolvedLlmConfig {
        provider: "openai".to_string(),
        model: "gpt-4".to_string(),
        api_key: "sk-test".to_string(),
        base_url,
        max_tokens: 50,
        timeout_ms: 5_000,
        max_retries: 0,
    })
    .expect("client");

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_inputs(temp_dir.path());
    let summary = Pipeline::new(config, client).run().await.expect("run succeeds");

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.synthesized, 2);
    assert_eq!(summary.failures_by_kind.get("authentication"), Some(&1));
    assert_eq!(summary.usage.input_tokens, 240);
    assert_eq!(summary.usage.output_tokens, 24);
    assert_eq!(summary.rows[0].sql_logic(), Some("COALESCE(a.loan_id, c.cap_product_id)"));
    assert!(summary.rows[1].sql_logic().is_none());
}
