//! Text-extraction engines and the fallback chain across them.
//!
//! An [`ExtractionEngine`] is one way of getting page-level text out of a
//! document: a local PDF text-layer parser, a remote OCR service, anything
//! satisfying the contract. Engines declare a static name, an integer
//! priority (lower = cheaper = tried first), and a capability tag set.
//! The [`chain::ExtractionChain`] orchestrates a prioritized list of them,
//! applying a quality gate and escalating only when a cheaper engine
//! under-delivers.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ engine 1 (text layer) ──▶ quality gate ──▶ ok? return
//!                 │ fail/low quality
//!                 ▼
//!            engine 2 (OCR) ──▶ quality gate ──▶ …
//! ```
//!
//! Engine failure is *soft*: an engine returning `Err` becomes an advisory
//! string on the final result, never a pipeline failure.

pub mod chain;
pub mod pdf_text;
pub mod remote_ocr;

use crate::error::OrderExtractError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Capability tags an engine may declare.
///
/// Every engine carries at least [`Capability::Text`]; OCR-capable engines
/// add [`Capability::Ocr`] so a `force_ocr` request can be routed past
/// plain text-layer parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Produces plain text.
    Text,
    /// Performs optical character recognition on rendered pages.
    Ocr,
    /// Understands visual structure (tables, blocks).
    Vision,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Capability::Text => "text",
            Capability::Ocr => "ocr",
            Capability::Vision => "vision",
        };
        f.write_str(tag)
    }
}

/// Per-request hints passed to every engine. Immutable for the lifetime of
/// one request; never shared across requests.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    /// Filename as the caller supplied it (not the temp-file name).
    pub raw_filename: String,

    /// Resolved customer profile id.
    pub customer_profile_id: String,

    /// Free-form string hints ("force_ocr", "language", …).
    pub hints: BTreeMap<String, String>,

    /// Explicit OCR escalation request.
    pub force_ocr: bool,
}

impl ExtractionContext {
    pub fn new(raw_filename: impl Into<String>, customer_profile_id: impl Into<String>) -> Self {
        Self {
            raw_filename: raw_filename.into(),
            customer_profile_id: customer_profile_id.into(),
            hints: BTreeMap::new(),
            force_ocr: false,
        }
    }

    /// Effective OCR escalation: the explicit flag, or a truthy
    /// `force_ocr` hint (`"1"`, `"true"`, `"yes"`, case-insensitive).
    pub fn effective_force_ocr(&self) -> bool {
        if self.force_ocr {
            return true;
        }
        self.hints
            .get("force_ocr")
            .map(|v| coerce_flag_str(v))
            .unwrap_or(false)
    }
}

/// Truthy-string coercion shared by hint handling and profile metadata.
pub(crate) fn coerce_flag_str(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Text extracted from a single page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    /// 1-indexed page number. Pages are ordered and never duplicated.
    pub page_number: u32,

    pub text: String,

    /// Raw layout fragments the engine happened to produce (OCR services
    /// often return blocks alongside text).
    pub layout: Vec<Value>,

    /// Per-page metadata (e.g. OCR confidence).
    pub metadata: BTreeMap<String, Value>,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            layout: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Normalized output of any extraction engine.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Page texts joined with `\n` in page order. Derivable from `pages`
    /// whenever `pages` is non-empty.
    pub combined_text: String,

    /// Page-level results, ordered by page number.
    pub pages: Vec<PageText>,

    /// Engine metadata. Always carries `engine_name`; the chain adds
    /// `fallback_chain`.
    pub metadata: BTreeMap<String, Value>,

    /// Advisory (non-fatal) error strings accumulated along the way.
    pub errors: Vec<String>,
}

impl ExtractionResult {
    /// Build a result from ordered pages, deriving the combined text.
    pub fn from_pages(pages: Vec<PageText>, engine_name: &str) -> Self {
        let combined_text = pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut metadata = BTreeMap::new();
        metadata.insert("engine_name".to_string(), Value::from(engine_name));
        metadata.insert("page_count".to_string(), Value::from(pages.len() as u64));
        Self {
            combined_text,
            pages,
            metadata,
            errors: Vec::new(),
        }
    }

    /// An empty result documenting why nothing was produced.
    pub fn empty(engine_name: &str, errors: Vec<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("engine_name".to_string(), Value::from(engine_name));
        Self {
            combined_text: String::new(),
            pages: Vec::new(),
            metadata,
            errors,
        }
    }

    /// Name of the engine that produced this result, if stamped.
    pub fn engine_name(&self) -> Option<&str> {
        self.metadata.get("engine_name").and_then(Value::as_str)
    }
}

/// Contract every extraction engine implements.
///
/// `extract` is async because engines suspend on I/O (network OCR) or hand
/// CPU-bound parsing to a blocking worker; either way the caller's executor
/// stays responsive. Expected failures surface as `Err` and are absorbed by
/// the chain — engines should not retry internally unless the backing
/// service contract demands it.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Static engine name, stamped into result metadata.
    fn name(&self) -> &str;

    /// Static priority; lower values are tried first.
    fn priority(&self) -> i32;

    /// Capability tag set. At minimum [`Capability::Text`].
    fn capabilities(&self) -> &[Capability];

    /// Extract page-level text from the source document.
    async fn extract(
        &self,
        source: &Path,
        context: &ExtractionContext,
    ) -> Result<ExtractionResult, OrderExtractError>;

    /// Whether the engine declares the given capability.
    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_text_joins_pages_in_order() {
        let result = ExtractionResult::from_pages(
            vec![PageText::new(1, "first"), PageText::new(2, "second")],
            "stub",
        );
        assert_eq!(result.combined_text, "first\nsecond");
        assert_eq!(result.engine_name(), Some("stub"));
        assert_eq!(result.metadata["page_count"], serde_json::json!(2));
    }

    #[test]
    fn force_ocr_hint_coercion_is_case_insensitive() {
        let mut context = ExtractionContext::new("a.pdf", "default");
        assert!(!context.effective_force_ocr());

        context.hints.insert("force_ocr".into(), "TRUE".into());
        assert!(context.effective_force_ocr());

        context.hints.insert("force_ocr".into(), "yes".into());
        assert!(context.effective_force_ocr());

        context.hints.insert("force_ocr".into(), "0".into());
        assert!(!context.effective_force_ocr());

        context.force_ocr = true;
        assert!(context.effective_force_ocr());
    }
}
