//! Reasoning engine contract and the OpenAI-compatible HTTP implementation.
//!
//! The reasoning engine receives the extracted text plus schema and profile
//! context and returns an **untrusted** structured payload. Nothing in its
//! response is believed until the normalizer has validated it — the types
//! here only mirror the wire shape (output items, content blocks, token
//! log-probabilities) closely enough to carry it to normalization intact.
//!
//! Implementations may retry or time out internally, but must never return
//! a partially-consumed stream: the contract is one complete response or an
//! error.

use crate::config::PipelineConfig;
use crate::error::OrderExtractError;
use crate::layout::LayoutResult;
use crate::profile::CustomerProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default endpoint for the OpenAI-compatible responses API.
pub const DEFAULT_REASONING_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Normalized inputs for one reasoning call. Owned by a single in-flight
/// request.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    /// Text produced by the extraction chain (possibly empty — extraction
    /// failure is soft and the reasoning stage still runs).
    pub text: String,

    /// Caller-supplied filename.
    pub raw_filename: String,

    /// Resolved customer profile (shared, read-only).
    pub profile: Arc<CustomerProfile>,

    /// Literal schema description injected into the prompt.
    pub schema_literal: String,

    /// Machine-readable schema for the `response_format` constraint.
    pub json_schema: Value,

    /// Active customer form, when the caller knows it.
    pub form_id: Option<String>,

    /// Structural hints from the layout analyzer.
    pub layout: Option<LayoutResult>,
}

/// Raw response from a reasoning engine: ordered output items, each holding
/// content blocks. Mirrors the responses-API wire shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawReasoningResponse {
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputItem {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBlock {
    /// Block discriminator; only `output_text` blocks carry payload text.
    #[serde(rename = "type")]
    pub kind: String,

    pub text: String,

    /// Token log-probability report, when the API was asked for one.
    pub logprobs: Option<LogprobReport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogprobReport {
    /// One entry per emitted token.
    pub content: Vec<TokenLogprob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLogprob {
    /// Candidate log-probabilities, highest first.
    pub top_logprobs: Vec<TopLogprob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopLogprob {
    pub logprob: f64,
}

impl RawReasoningResponse {
    /// Concatenated text of every `output_text` block, in order.
    pub fn output_text(&self) -> String {
        let mut chunks: Vec<&str> = Vec::new();
        for item in &self.output {
            for block in &item.content {
                if block.kind == "output_text" {
                    chunks.push(&block.text);
                }
            }
        }
        chunks.concat()
    }
}

/// Contract for reasoning engines.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Run one extraction over the request and return the raw payload.
    async fn extract_order(
        &self,
        request: &ReasoningRequest,
    ) -> Result<RawReasoningResponse, OrderExtractError>;
}

/// Reasoning engine speaking the OpenAI-compatible responses API.
#[derive(Debug)]
pub struct OpenAiReasoningEngine {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: usize,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiReasoningEngine {
    /// Build an engine from the pipeline config plus an API key.
    pub fn new(config: &PipelineConfig, api_key: impl Into<String>) -> Result<Self, OrderExtractError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(OrderExtractError::InvalidConfig(
                "reasoning engine requires an API key".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| OrderExtractError::Internal(format!("reasoning client: {e}")))?;
        Ok(Self {
            endpoint: config
                .reasoning_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_REASONING_ENDPOINT.to_string()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.api_timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiReasoningEngine {
    async fn extract_order(
        &self,
        request: &ReasoningRequest,
    ) -> Result<RawReasoningResponse, OrderExtractError> {
        let system_message = crate::prompts::SYSTEM_PROMPT;
        let user_message = crate::prompts::build_user_message(request);

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
            "logprobs": true,
            "input": [
                {"role": "system", "content": system_message},
                {"role": "user", "content": user_message},
            ],
            "response_format": {"type": "json_schema", "json_schema": request.json_schema.clone()},
        });

        debug!(
            model = %self.model,
            chars = request.text.len(),
            profile = %request.profile.id,
            "submitting reasoning request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrderExtractError::UpstreamTimeout {
                        service: "reasoning".into(),
                        secs: self.timeout_secs,
                    }
                } else {
                    OrderExtractError::ReasoningFailed {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "reasoning API returned an error");
            return Err(OrderExtractError::ReasoningFailed {
                detail: format!("HTTP {status}: {}", detail.chars().take(500).collect::<String>()),
            });
        }

        response
            .json::<RawReasoningResponse>()
            .await
            .map_err(|e| OrderExtractError::ReasoningFailed {
                detail: format!("unreadable response body: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: &str, text: &str) -> ContentBlock {
        ContentBlock {
            kind: kind.to_string(),
            text: text.to_string(),
            logprobs: None,
        }
    }

    #[test]
    fn output_text_joins_only_text_blocks_in_order() {
        let response = RawReasoningResponse {
            output: vec![
                OutputItem {
                    content: vec![block("reasoning", "ignored"), block("output_text", "{\"a\":")],
                },
                OutputItem {
                    content: vec![block("output_text", "1}")],
                },
            ],
        };
        assert_eq!(response.output_text(), "{\"a\":1}");
    }

    #[test]
    fn wire_response_deserializes_with_logprobs() {
        let response: RawReasoningResponse = serde_json::from_value(json!({
            "output": [{
                "content": [{
                    "type": "output_text",
                    "text": "{}",
                    "logprobs": {"content": [{"top_logprobs": [{"logprob": -0.25}]}]}
                }]
            }]
        }))
        .unwrap();
        let report = response.output[0].content[0].logprobs.as_ref().unwrap();
        assert_eq!(report.content[0].top_logprobs[0].logprob, -0.25);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let config = PipelineConfig::default();
        let err = OpenAiReasoningEngine::new(&config, "  ").unwrap_err();
        assert!(matches!(err, OrderExtractError::InvalidConfig(_)));
    }
}
