//! The ingestion pipeline: one request lifecycle from document to order.
//!
//! ## Stage Flow
//!
//! ```text
//! Idle ─▶ ResolvingProfile ─▶ Extracting ─▶ AnalyzingLayout ─▶ Reasoning ─▶ Normalizing ─▶ Done
//!                                                                  │             │
//!                                                                  └──── Failed ◀┘
//! ```
//!
//! Stages run strictly sequentially with no backward transitions and no
//! per-stage retries. Failure semantics differ by side of the reasoning
//! boundary: extraction problems were already absorbed into advisory
//! errors by the chain and never fail the request, while anything from the
//! reasoning call onward propagates verbatim to the caller (logged with
//! its stage first).

use crate::config::PipelineConfig;
use crate::engine::chain::ExtractionChain;
use crate::engine::{coerce_flag_str, ExtractionContext};
use crate::error::OrderExtractError;
use crate::layout::{LayoutAnalyzer, NullLayoutAnalyzer};
use crate::normalize::normalize_response;
use crate::order::OrderExtractionResult;
use crate::profile::ProfileRepository;
use crate::reasoning::{ReasoningEngine, ReasoningRequest};
use crate::schema::SchemaRegistry;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Linear request lifecycle stages, used for logging and failure context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    ResolvingProfile,
    Extracting,
    AnalyzingLayout,
    Reasoning,
    Normalizing,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::ResolvingProfile => "resolving_profile",
            PipelineStage::Extracting => "extracting",
            PipelineStage::AnalyzingLayout => "analyzing_layout",
            PipelineStage::Reasoning => "reasoning",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Coordinates the end-to-end ingestion flow.
///
/// Collaborators are injected at construction; the layout analyzer, the
/// profile repository, and the schema registry default to no-op/empty
/// implementations so a minimal pipeline needs only an extraction chain
/// and a reasoning engine.
pub struct IngestionPipeline {
    chain: ExtractionChain,
    reasoning: Arc<dyn ReasoningEngine>,
    layout: Arc<dyn LayoutAnalyzer>,
    profiles: Arc<ProfileRepository>,
    schemas: Arc<SchemaRegistry>,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(
        chain: ExtractionChain,
        reasoning: Arc<dyn ReasoningEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chain,
            reasoning,
            layout: Arc::new(NullLayoutAnalyzer),
            profiles: Arc::new(ProfileRepository::default()),
            schemas: Arc::new(SchemaRegistry::default()),
            config,
        }
    }

    pub fn with_layout_analyzer(mut self, layout: Arc<dyn LayoutAnalyzer>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_profile_repository(mut self, profiles: Arc<ProfileRepository>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_schema_registry(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Run the full ingestion flow for one document.
    ///
    /// # Errors
    ///
    /// Only failures from the reasoning stage onward (and input problems
    /// while reading the source) return `Err`; extraction-layer failures
    /// surface as advisory errors inside the result's provenance, not here.
    pub async fn run(
        &self,
        source: &Path,
        raw_filename: &str,
        customer_profile_id: Option<&str>,
        form_id: Option<&str>,
    ) -> Result<OrderExtractionResult, OrderExtractError> {
        let mut stage = PipelineStage::Idle;
        info!(filename = raw_filename, profile = ?customer_profile_id, "ingestion started");

        // ── Stage 1: Resolve profile ─────────────────────────────────────
        stage = self.advance(stage, PipelineStage::ResolvingProfile);
        let profile = self.profiles.load(customer_profile_id);

        // ── Stage 2: Build extraction context ────────────────────────────
        let mut context = ExtractionContext::new(raw_filename, profile.id.clone());
        context.force_ocr = profile_forces_ocr(&profile.metadata);

        // ── Stage 3: Extraction chain (never fails) ──────────────────────
        stage = self.advance(stage, PipelineStage::Extracting);
        let extraction = self.chain.extract(source, &context).await;
        if !extraction.errors.is_empty() {
            debug!(
                advisories = extraction.errors.len(),
                "extraction finished with advisory errors"
            );
        }

        // ── Stage 4: Layout analysis ─────────────────────────────────────
        stage = self.advance(stage, PipelineStage::AnalyzingLayout);
        let layout = match self.layout.analyze(source, &extraction, &context).await {
            Ok(layout) => Some(layout),
            Err(err) => {
                // Layout is an enhancement; a failing analyzer degrades to
                // "no layout" the same way an absent one does.
                debug!(error = %err, "layout analyzer failed, continuing without hints");
                None
            }
        };

        // ── Stage 5: Resolve schema ──────────────────────────────────────
        let schema_name = &self.config.schema_name;
        let schema_literal = self.schemas.literal(schema_name)?.to_string();
        let json_schema = self.schemas.json_schema(schema_name)?.clone();

        // ── Stage 6: Build reasoning request ─────────────────────────────
        let request = ReasoningRequest {
            text: extraction.combined_text.clone(),
            raw_filename: raw_filename.to_string(),
            profile: Arc::clone(&profile),
            schema_literal,
            json_schema,
            form_id: form_id.map(str::to_string),
            layout,
        };

        // ── Stage 7: Reasoning + normalization ───────────────────────────
        stage = self.advance(stage, PipelineStage::Reasoning);
        let raw = match self.reasoning.extract_order(&request).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.fail(stage, err)),
        };

        stage = self.advance(stage, PipelineStage::Normalizing);
        let result = match normalize_response(&raw, &request) {
            Ok(result) => result,
            Err(err) => return Err(self.fail(stage, err)),
        };

        self.advance(stage, PipelineStage::Done);
        info!(
            profile = %result.customer_profile_id,
            lines = result.lines.len(),
            confidence = ?result.confidence,
            "ingestion finished"
        );
        Ok(result)
    }

    /// Run the pipeline over in-memory document bytes.
    ///
    /// The bytes are written to a managed tempfile that is cleaned up on
    /// return or panic, so callers receiving uploads never touch the
    /// filesystem themselves.
    pub async fn run_bytes(
        &self,
        bytes: &[u8],
        raw_filename: &str,
        customer_profile_id: Option<&str>,
        form_id: Option<&str>,
    ) -> Result<OrderExtractionResult, OrderExtractError> {
        if raw_filename.trim().is_empty() {
            return Err(OrderExtractError::InvalidInput {
                input: String::new(),
                reason: "filename missing".into(),
            });
        }
        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| OrderExtractError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| OrderExtractError::Internal(format!("tempfile write: {e}")))?;
        // `tmp` lives until the run returns, then the file is deleted.
        self.run(tmp.path(), raw_filename, customer_profile_id, form_id)
            .await
    }

    fn advance(&self, from: PipelineStage, to: PipelineStage) -> PipelineStage {
        debug!(from = %from, to = %to, "pipeline stage transition");
        to
    }

    fn fail(&self, stage: PipelineStage, err: OrderExtractError) -> OrderExtractError {
        error!(stage = %stage, code = err.code().as_str(), error = %err, "pipeline failed");
        self.advance(stage, PipelineStage::Failed);
        err
    }
}

/// Read `metadata.extraction_hints.force_ocr` from profile metadata,
/// accepting a boolean or a truthy string.
fn profile_forces_ocr(metadata: &std::collections::BTreeMap<String, Value>) -> bool {
    metadata
        .get("extraction_hints")
        .and_then(|hints| hints.get("force_ocr"))
        .map(|flag| match flag {
            Value::Bool(b) => *b,
            Value::String(s) => coerce_flag_str(s),
            _ => false,
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_metadata_force_ocr_accepts_bool_and_string() {
        let mut metadata = std::collections::BTreeMap::new();
        assert!(!profile_forces_ocr(&metadata));

        metadata.insert("extraction_hints".into(), json!({"force_ocr": true}));
        assert!(profile_forces_ocr(&metadata));

        metadata.insert("extraction_hints".into(), json!({"force_ocr": "yes"}));
        assert!(profile_forces_ocr(&metadata));

        metadata.insert("extraction_hints".into(), json!({"force_ocr": "no"}));
        assert!(!profile_forces_ocr(&metadata));

        metadata.insert("extraction_hints".into(), json!({"force_ocr": 1}));
        assert!(!profile_forces_ocr(&metadata));
    }

    #[test]
    fn stages_render_snake_case_names() {
        assert_eq!(PipelineStage::ResolvingProfile.to_string(), "resolving_profile");
        assert_eq!(PipelineStage::Failed.to_string(), "failed");
    }
}
