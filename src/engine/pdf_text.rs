//! Local PDF text-layer engines.
//!
//! Two independent backends cover each other's blind spots: `lopdf` walks
//! the page tree and extracts per-page text, while `pdf-extract` linearises
//! the whole document and copes with some encodings lopdf mangles. Both are
//! cheap and local, so they sit at the front of the chain ahead of any OCR
//! escalation.
//!
//! ## Why spawn_blocking?
//!
//! PDF parsing is CPU-bound and both crates are synchronous.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread
//! pool so concurrent requests keep their executor threads free.

use super::{Capability, ExtractionContext, ExtractionEngine, ExtractionResult, PageText};
use crate::error::OrderExtractError;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

const TEXT_ONLY: &[Capability] = &[Capability::Text];

/// Per-page text extraction via `lopdf`. Priority 1: tried first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTextEngine;

#[async_trait]
impl ExtractionEngine for LopdfTextEngine {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn capabilities(&self) -> &[Capability] {
        TEXT_ONLY
    }

    async fn extract(
        &self,
        source: &Path,
        _context: &ExtractionContext,
    ) -> Result<ExtractionResult, OrderExtractError> {
        let path = source.to_path_buf();
        let name = self.name().to_string();
        let pages = tokio::task::spawn_blocking(move || extract_with_lopdf(&path))
            .await
            .map_err(|e| OrderExtractError::Internal(format!("lopdf task panicked: {e}")))??;

        debug!(engine = %name, pages = pages.len(), "lopdf extraction finished");
        Ok(ExtractionResult::from_pages(pages, &name))
    }
}

/// Whole-document text extraction via `pdf-extract`. Priority 2: second
/// opinion when lopdf returns a thin or empty text layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractEngine;

#[async_trait]
impl ExtractionEngine for PdfExtractEngine {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn priority(&self) -> i32 {
        2
    }

    fn capabilities(&self) -> &[Capability] {
        TEXT_ONLY
    }

    async fn extract(
        &self,
        source: &Path,
        _context: &ExtractionContext,
    ) -> Result<ExtractionResult, OrderExtractError> {
        let path = source.to_path_buf();
        let name = self.name().to_string();
        let text = tokio::task::spawn_blocking(move || extract_with_pdf_extract(&path))
            .await
            .map_err(|e| OrderExtractError::Internal(format!("pdf-extract task panicked: {e}")))??;

        debug!(engine = %name, chars = text.len(), "pdf-extract extraction finished");
        // pdf-extract does not expose page boundaries; the whole document
        // becomes one page so the combined-text invariant still holds.
        Ok(ExtractionResult::from_pages(vec![PageText::new(1, text)], &name))
    }
}

fn extract_with_lopdf(path: &Path) -> Result<Vec<PageText>, OrderExtractError> {
    if !path.exists() {
        return Err(OrderExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let document = lopdf::Document::load(path)
        .map_err(|e| OrderExtractError::InvalidInput {
            input: path.display().to_string(),
            reason: format!("failed to parse PDF: {e}"),
        })?;

    let mut pages = Vec::new();
    for (page_number, _object_id) in document.get_pages() {
        let text = document.extract_text(&[page_number]).unwrap_or_default();
        pages.push(PageText::new(page_number, text.trim_end().to_string()));
    }
    Ok(pages)
}

fn extract_with_pdf_extract(path: &Path) -> Result<String, OrderExtractError> {
    if !path.exists() {
        return Err(OrderExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    pdf_extract::extract_text(path).map_err(|e| OrderExtractError::InvalidInput {
        input: path.display().to_string(),
        reason: format!("failed to extract text: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engines_declare_expected_contract() {
        let lopdf_engine = LopdfTextEngine;
        let pdf_extract_engine = PdfExtractEngine;
        assert!(lopdf_engine.priority() < pdf_extract_engine.priority());
        assert!(lopdf_engine.has_capability(Capability::Text));
        assert!(!lopdf_engine.has_capability(Capability::Ocr));
        assert!(!pdf_extract_engine.has_capability(Capability::Ocr));
    }

    #[tokio::test]
    async fn missing_file_is_an_engine_error_not_a_panic() {
        let context = ExtractionContext::new("ghost.pdf", "default");
        let err = LopdfTextEngine
            .extract(Path::new("/nonexistent/ghost.pdf"), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn garbage_bytes_are_an_engine_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not a pdf at all").unwrap();
        let context = ExtractionContext::new("garbage.pdf", "default");
        let err = LopdfTextEngine
            .extract(file.path(), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderExtractError::InvalidInput { .. }));
    }
}
