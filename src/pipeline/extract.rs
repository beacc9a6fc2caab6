//! Extraction: send page images to the Gemini `generateContent` API and parse
//! the schema-constrained JSON answer into a [`ContractData`].
//!
//! The credential is supplied per call and sent as the `x-goog-api-key`
//! header; nothing is cached between calls.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx and transport timeouts are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) is applied inside a single extraction
//! call; 4xx answers other than 429 (bad key, bad request) fail immediately.
//! A document whose extraction still fails is not retried by the queue.

use crate::config::QueueConfig;
use crate::contract::ContractData;
use crate::error::{ItemError, KksError};
use crate::pipeline::encode::PageImage;
use crate::pipeline::postprocess;
use crate::prompts::{response_schema, EXTRACTION_PROMPT};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Turns page images into one structured record.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract a record from `pages`, authenticating with `credential`.
    async fn extract(&self, pages: &[PageImage], credential: &str)
        -> Result<ContractData, ItemError>;
}

/// [`Extractor`] backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_base: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl GeminiExtractor {
    pub fn new(config: &QueueConfig) -> Result<Self, KksError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| KksError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    /// One HTTP round trip.
    async fn call_once(&self, body: &Value, credential: &str) -> Result<String, CallError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Timeout
                } else {
                    CallError::Retryable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {}: {}", status, truncate(&text, 200));
            return Err(if is_retryable_status(status) {
                CallError::Retryable(detail)
            } else {
                CallError::Fatal(detail)
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CallError::Retryable(format!("response body: {e}")))?;

        response_text(parsed).map_err(CallError::Invalid)
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(
        &self,
        pages: &[PageImage],
        credential: &str,
    ) -> Result<ContractData, ItemError> {
        let start = Instant::now();
        let body = build_request_body(pages, self.temperature);
        let mut last_err = CallError::Retryable("no attempt made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Extraction retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.call_once(&body, credential).await {
                Ok(text) => {
                    debug!(
                        "Extraction answered in {:?} ({} chars, {} pages)",
                        start.elapsed(),
                        text.len(),
                        pages.len()
                    );
                    return postprocess::parse_contract(&text);
                }
                Err(CallError::Invalid(e)) => return Err(e),
                Err(CallError::Fatal(detail)) => {
                    return Err(ItemError::ExtractionFailed {
                        retries: attempt,
                        detail,
                    })
                }
                Err(e) => {
                    warn!("Extraction attempt {} failed: {}", attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(match last_err {
            CallError::Timeout => ItemError::ExtractionTimeout {
                secs: self.timeout_secs,
            },
            other => ItemError::ExtractionFailed {
                retries: self.max_retries,
                detail: other.to_string(),
            },
        })
    }
}

/// Why a single round trip failed.
#[derive(Debug)]
enum CallError {
    Timeout,
    Retryable(String),
    Fatal(String),
    Invalid(ItemError),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Timeout => f.write_str("request timed out"),
            CallError::Retryable(s) | CallError::Fatal(s) => f.write_str(s),
            CallError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry `attempt` (1-based): `base`, doubled per attempt,
/// saturating at `u64::MAX`.
pub(crate) fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Build the `generateContent` request: inline JPEG parts in page order,
/// then the instruction, with JSON output constrained by the schema.
pub fn build_request_body(pages: &[PageImage], temperature: f32) -> Value {
    let mut parts: Vec<Value> = pages
        .iter()
        .map(|p| {
            json!({
                "inlineData": { "mimeType": p.mime_type, "data": p.data }
            })
        })
        .collect();
    parts.push(json!({ "text": EXTRACTION_PROMPT }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
            "temperature": temperature,
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn response_text(resp: GenerateContentResponse) -> Result<String, ItemError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ItemError::InvalidResponse {
            detail: format!("No response from model ({reason})"),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ItemError::InvalidResponse {
            detail: format!(
                "No response from model (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
