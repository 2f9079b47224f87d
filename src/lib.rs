//! # pdf2order
//!
//! Turn an uploaded order document into a validated, structured order
//! record using chained text extraction and a reasoning model.
//!
//! ## Why this crate?
//!
//! Order forms arrive as whatever a customer's ERP, scanner, or fax bridge
//! produces. No single extraction technique survives contact with all of
//! them: embedded text layers are sometimes pristine, sometimes garbled,
//! sometimes absent. This crate treats every component as unreliable and
//! builds reliability out of the composition — engines are tried in cost
//! order behind a quality gate, the reasoning model's output is treated as
//! an untrusted wire payload, and every monetary value is re-anchored to
//! exact fixed-point decimals before a caller ever sees it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Profile   resolve customer profile (miss → default, never fatal)
//!  ├─ 2. Extract   engine chain: text layer first, OCR only when needed
//!  ├─ 3. Layout    optional structural hints (tables, blocks)
//!  ├─ 4. Reason    LLM call with schema-constrained JSON output
//!  ├─ 5. Normalize back-fill, decimal coercion, logprob confidence
//!  └─ 6. Output    validated OrderExtractionResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2order::engine::chain::ExtractionChain;
//! use pdf2order::engine::pdf_text::{LopdfTextEngine, PdfExtractEngine};
//! use pdf2order::engine::ExtractionEngine;
//! use pdf2order::reasoning::OpenAiReasoningEngine;
//! use pdf2order::{IngestionPipeline, PipelineConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let engines: Vec<Arc<dyn ExtractionEngine>> =
//!         vec![Arc::new(LopdfTextEngine), Arc::new(PdfExtractEngine)];
//!     let chain = ExtractionChain::new(engines, config.min_characters, config.min_alpha_ratio);
//!     let reasoning = Arc::new(OpenAiReasoningEngine::new(
//!         &config,
//!         std::env::var("OPENAI_API_KEY")?,
//!     )?);
//!     let pipeline = IngestionPipeline::new(chain, reasoning, config);
//!
//!     let order = pipeline
//!         .run(Path::new("order.pdf"), "order.pdf", Some("acme"), None)
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&order)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Philosophy
//!
//! Extraction failures are *soft*: a broken engine or a garbled text layer
//! becomes an advisory string and the chain escalates. Everything from the
//! reasoning call onward is *hard* and propagates to the caller, classified
//! by [`error::OrderExtractError::code`] into input / upstream / unexpected
//! buckets for the transport boundary.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod profile;
pub mod prompts;
pub mod reasoning;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use engine::chain::ExtractionChain;
pub use engine::{Capability, ExtractionContext, ExtractionEngine, ExtractionResult, PageText};
pub use error::{ErrorCode, OrderExtractError};
pub use layout::{LayoutAnalyzer, LayoutBlock, LayoutResult, NullLayoutAnalyzer};
pub use order::{OrderExtractionResult, OrderHeader, OrderLine, OrderTotals};
pub use pipeline::{IngestionPipeline, PipelineStage};
pub use profile::{CustomerForm, CustomerProfile, ProfileRepository};
pub use reasoning::{RawReasoningResponse, ReasoningEngine, ReasoningRequest};
pub use schema::SchemaRegistry;
