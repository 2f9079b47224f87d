//! OCR escalation engine backed by a remote recognition service.
//!
//! The service receives the whole document (base64 in a JSON body) and
//! renders + recognises it server-side, returning per-page text with
//! optional layout fragments and a recognition confidence. Keeping the
//! rendering remote means this crate never links a rasteriser; the
//! trade-off is a real network deadline, which is why the engine carries
//! its own (larger) timeout and why its failures map to the
//! upstream-timeout variant the chain records distinctly.
//!
//! Priority 50: strictly a fallback. The chain only reaches this engine
//! when the local text layer under-delivered or the request forced OCR.

use super::{Capability, ExtractionContext, ExtractionEngine, ExtractionResult, PageText};
use crate::error::OrderExtractError;
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const OCR_CAPABILITIES: &[Capability] = &[Capability::Ocr, Capability::Vision, Capability::Text];

/// Configuration for [`RemoteOcrEngine`].
#[derive(Debug, Clone)]
pub struct RemoteOcrConfig {
    /// Full URL of the OCR endpoint.
    pub endpoint: String,
    /// Bearer token.
    pub api_key: String,
    /// Request deadline in seconds.
    pub timeout_secs: u64,
    /// Rendering DPI hint forwarded to the service.
    pub render_dpi: u32,
}

/// OCR-capable engine calling a remote recognition HTTP service.
#[derive(Debug)]
pub struct RemoteOcrEngine {
    config: RemoteOcrConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OcrRequestBody<'a> {
    filename: &'a str,
    /// Base64-encoded source document.
    document: String,
    render_dpi: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OcrResponseBody {
    pages: Vec<OcrResponsePage>,
    provider: Option<String>,
    errors: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OcrResponsePage {
    page: u32,
    text: String,
    layout: Vec<Value>,
    confidence: Option<f64>,
}

impl RemoteOcrEngine {
    /// Build an engine. Fails fast on an empty endpoint or key so a
    /// misconfigured deployment surfaces at startup, not mid-request.
    pub fn new(config: RemoteOcrConfig) -> Result<Self, OrderExtractError> {
        if config.endpoint.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(OrderExtractError::InvalidConfig(
                "remote OCR requires both an endpoint and an API key".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OrderExtractError::Internal(format!("OCR client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ExtractionEngine for RemoteOcrEngine {
    fn name(&self) -> &str {
        "remote_ocr"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn capabilities(&self) -> &[Capability] {
        OCR_CAPABILITIES
    }

    async fn extract(
        &self,
        source: &Path,
        context: &ExtractionContext,
    ) -> Result<ExtractionResult, OrderExtractError> {
        let bytes = tokio::fs::read(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OrderExtractError::FileNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                OrderExtractError::Io(e)
            }
        })?;

        let body = OcrRequestBody {
            filename: &context.raw_filename,
            document: base64::engine::general_purpose::STANDARD.encode(&bytes),
            render_dpi: self.config.render_dpi,
        };

        debug!(
            endpoint = %self.config.endpoint,
            bytes = bytes.len(),
            "submitting document to OCR service"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrderExtractError::UpstreamTimeout {
                        service: "ocr".into(),
                        secs: self.config.timeout_secs,
                    }
                } else {
                    OrderExtractError::OcrFailed {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OrderExtractError::OcrFailed {
                detail: format!("HTTP {status}: {}", truncate(&detail, 200)),
            });
        }

        let payload: Value = response.json().await.map_err(|e| OrderExtractError::OcrFailed {
            detail: format!("unreadable response body: {e}"),
        })?;
        // Some deployments nest the result under "data".
        let body_value = match payload.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => payload,
        };
        let parsed: OcrResponseBody =
            serde_json::from_value(body_value).map_err(|e| OrderExtractError::OcrFailed {
                detail: format!("unexpected response shape: {e}"),
            })?;

        for error in &parsed.errors {
            warn!(engine = self.name(), error = %error, "OCR service reported a page failure");
        }

        let mut pages: Vec<PageText> = parsed
            .pages
            .into_iter()
            .map(|page| {
                let mut page_text = PageText::new(page.page, page.text);
                page_text.layout = page.layout;
                if let Some(confidence) = page.confidence {
                    page_text
                        .metadata
                        .insert("confidence".to_string(), Value::from(confidence));
                }
                page_text
            })
            .collect();
        pages.sort_by_key(|page| page.page_number);

        let mut result = ExtractionResult::from_pages(pages, self.name());
        if let Some(provider) = parsed.provider {
            result
                .metadata
                .insert("ocr_provider".to_string(), Value::from(provider));
        }
        result.errors.extend(
            parsed
                .errors
                .into_iter()
                .map(|error| format!("{}: {error}", self.name())),
        );
        Ok(result)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misconfiguration_fails_at_construction() {
        let err = RemoteOcrEngine::new(RemoteOcrConfig {
            endpoint: String::new(),
            api_key: "key".into(),
            timeout_secs: 120,
            render_dpi: 200,
        })
        .unwrap_err();
        assert!(matches!(err, OrderExtractError::InvalidConfig(_)));
    }

    #[test]
    fn engine_declares_ocr_capability() {
        let engine = RemoteOcrEngine::new(RemoteOcrConfig {
            endpoint: "https://ocr.internal/recognize".into(),
            api_key: "key".into(),
            timeout_secs: 120,
            render_dpi: 200,
        })
        .unwrap();
        assert!(engine.has_capability(Capability::Ocr));
        assert_eq!(engine.priority(), 50);
    }

    #[test]
    fn response_pages_parse_with_defaults() {
        let parsed: OcrResponseBody = serde_json::from_value(serde_json::json!({
            "pages": [{"page": 1, "text": "hello"}],
            "provider": "acme-ocr"
        }))
        .unwrap();
        assert_eq!(parsed.pages.len(), 1);
        assert_eq!(parsed.pages[0].text, "hello");
        assert!(parsed.pages[0].confidence.is_none());
    }
}
