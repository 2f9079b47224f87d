//! Layout analysis: optional structural hints layered on top of extraction.
//!
//! Order forms carry meaning in their geometry — line items live in tables,
//! addresses in labelled boxes. A [`LayoutAnalyzer`] turns the extraction
//! result into a list of typed blocks the prompt builder can surface to the
//! reasoning engine. The default analyzer reports nothing: layout is an
//! enhancement, never a requirement.

use crate::engine::{ExtractionContext, ExtractionResult};
use crate::error::OrderExtractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One structural block recognised in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutBlock {
    /// Block category: "table", "header", "address", "paragraph", …
    #[serde(rename = "type")]
    pub kind: String,

    /// Text content of the block.
    #[serde(default)]
    pub text: String,

    /// Page the block was found on (1-indexed), when known.
    #[serde(default)]
    pub page: Option<u32>,

    /// Bounding box `[x0, y0, x1, y1]` in page coordinates, when known.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

/// Structured view of a document's layout. Empty is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutResult {
    pub blocks: Vec<LayoutBlock>,
    pub engine_name: String,
}

impl LayoutResult {
    /// Condensed string for prompt injection; empty when there is nothing
    /// worth telling the model.
    pub fn to_prompt_section(&self) -> String {
        if self.blocks.is_empty() {
            return String::new();
        }
        let preview: Vec<String> = self
            .blocks
            .iter()
            .take(5)
            .map(|block| format!("- {}: {}", block.kind, block.text))
            .collect();
        format!("Layout summary (first blocks only):\n{}", preview.join("\n"))
    }
}

/// Contract for layout analyzers.
#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    /// Analyzer name, recorded in [`LayoutResult::engine_name`].
    fn name(&self) -> &str;

    /// Produce structural hints from the source document and its extracted
    /// text. Runs after extraction and before reasoning.
    async fn analyze(
        &self,
        source: &Path,
        extraction: &ExtractionResult,
        context: &ExtractionContext,
    ) -> Result<LayoutResult, OrderExtractError>;
}

/// Default analyzer that simply reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLayoutAnalyzer;

#[async_trait]
impl LayoutAnalyzer for NullLayoutAnalyzer {
    fn name(&self) -> &str {
        "null"
    }

    async fn analyze(
        &self,
        _source: &Path,
        _extraction: &ExtractionResult,
        _context: &ExtractionContext,
    ) -> Result<LayoutResult, OrderExtractError> {
        Ok(LayoutResult {
            blocks: Vec::new(),
            engine_name: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layout_renders_empty_prompt_section() {
        let layout = LayoutResult::default();
        assert!(layout.to_prompt_section().is_empty());
    }

    #[test]
    fn prompt_section_previews_at_most_five_blocks() {
        let blocks: Vec<LayoutBlock> = (0..8)
            .map(|i| LayoutBlock {
                kind: "table".into(),
                text: format!("row {i}"),
                ..LayoutBlock::default()
            })
            .collect();
        let layout = LayoutResult {
            blocks,
            engine_name: "stub".into(),
        };
        let section = layout.to_prompt_section();
        assert!(section.contains("row 4"));
        assert!(!section.contains("row 5"));
    }
}
