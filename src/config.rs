//! Configuration for the order-extraction pipeline.
//!
//! All tunable behaviour lives in one [`PipelineConfig`] struct, built via
//! its [`PipelineConfigBuilder`] and injected into the pipeline, the
//! extraction chain, and the normalizer. Keeping every knob in one place
//! avoids hidden module-level state and makes test substitution trivial:
//! construct a config once at process start and pass it by reference.

use crate::error::OrderExtractError;
use serde::{Deserialize, Serialize};

/// Configuration for an ingestion run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2order::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .min_characters(40)
///     .min_alpha_ratio(0.3)
///     .model("gpt-4o-2025-09-01")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum trimmed character count for extracted text to pass the
    /// quality gate. Default: 20.
    ///
    /// Order forms are dense; a text layer shorter than this is almost
    /// always a scan with no embedded text, and the chain should escalate
    /// to OCR rather than feed the reasoning engine a fragment.
    pub min_characters: usize,

    /// Minimum ratio of alphanumeric characters to total trimmed length.
    /// Range: 0.0–1.0. Default: 0.25.
    ///
    /// Broken text layers decode to punctuation soup or box-drawing junk.
    /// A low alphanumeric ratio catches those even when they are long
    /// enough to pass the length check.
    pub min_alpha_ratio: f64,

    /// Name of the active output schema in the registry. Default: "order_v1".
    pub schema_name: String,

    /// Reasoning model identifier. Default: "gpt-4o-2025-09-01".
    pub model: String,

    /// Sampling temperature for the reasoning call. Default: 0.0.
    ///
    /// Extraction is transcription, not generation; anything above zero
    /// trades accuracy for variance.
    pub temperature: f32,

    /// Maximum tokens the reasoning engine may generate. Default: 4096.
    ///
    /// Orders with many lines produce large JSON payloads; setting this too
    /// low truncates the payload mid-object and fails validation.
    pub max_output_tokens: usize,

    /// Per-reasoning-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Per-OCR-call timeout in seconds. Default: 120.
    ///
    /// OCR renders every page server-side before recognition, so its
    /// deadline is decoupled from (and larger than) the reasoning deadline.
    pub ocr_timeout_secs: u64,

    /// Rendering DPI hint forwarded to the OCR service. Default: 200.
    pub ocr_render_dpi: u32,

    /// Override for the reasoning API endpoint. `None` uses the engine's
    /// built-in default.
    pub reasoning_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_characters: 20,
            min_alpha_ratio: 0.25,
            schema_name: "order_v1".to_string(),
            model: "gpt-4o-2025-09-01".to_string(),
            temperature: 0.0,
            max_output_tokens: 4096,
            api_timeout_secs: 60,
            ocr_timeout_secs: 120,
            ocr_render_dpi: 200,
            reasoning_endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn min_characters(mut self, n: usize) -> Self {
        self.config.min_characters = n;
        self
    }

    pub fn min_alpha_ratio(mut self, ratio: f64) -> Self {
        self.config.min_alpha_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.config.schema_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_render_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_render_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn reasoning_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.reasoning_endpoint = Some(endpoint.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, OrderExtractError> {
        let c = &self.config;
        if c.schema_name.trim().is_empty() {
            return Err(OrderExtractError::InvalidConfig(
                "schema_name must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.min_alpha_ratio) {
            return Err(OrderExtractError::InvalidConfig(format!(
                "min_alpha_ratio must be within 0.0–1.0, got {}",
                c.min_alpha_ratio
            )));
        }
        if c.max_output_tokens == 0 {
            return Err(OrderExtractError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.schema_name, "order_v1");
        assert_eq!(config.min_characters, 20);
        assert!(config.temperature == 0.0);
    }

    #[test]
    fn alpha_ratio_is_clamped() {
        let config = PipelineConfig::builder().min_alpha_ratio(3.5).build().unwrap();
        assert!(config.min_alpha_ratio <= 1.0);
    }

    #[test]
    fn empty_schema_name_is_rejected() {
        let err = PipelineConfig::builder().schema_name("  ").build().unwrap_err();
        assert!(err.to_string().contains("schema_name"));
    }
}
