//! Error types for the pdf2order library.
//!
//! Two distinct failure modes exist and they are deliberately kept apart:
//!
//! * [`OrderExtractError`] — **Fatal**: the request cannot produce a result
//!   (unreadable input, reasoning service down, payload that fails
//!   validation). Returned as `Err(OrderExtractError)` from the pipeline.
//!
//! * **Advisory errors** — a single extraction engine failed or produced
//!   output below the quality gate. These are plain strings accumulated in
//!   [`crate::engine::ExtractionResult::errors`] and never cross the
//!   extraction-chain boundary as an `Err`: a garbled text layer is routine,
//!   and the chain escalates to the next engine instead of aborting.
//!
//! Everything from the reasoning stage onward propagates verbatim to the
//! pipeline caller, which can classify it via [`OrderExtractError::code`]
//! for a boundary response.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2order library.
///
/// Per-engine extraction failures are advisory strings stored in
/// [`crate::engine::ExtractionResult`] rather than variants here.
#[derive(Debug, Error)]
pub enum OrderExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The supplied input is unusable (empty filename, unreadable bytes, …).
    #[error("invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The profile store file exists but could not be read or parsed.
    #[error("failed to load profile store '{path}': {detail}")]
    ProfileStore { path: PathBuf, detail: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The active schema name is not present in the registry.
    #[error("schema '{name}' is not registered")]
    SchemaNotRegistered { name: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upstream errors ───────────────────────────────────────────────────
    /// A remote service (reasoning or OCR) exceeded its deadline.
    ///
    /// Surfaced distinctly from other failures so callers can retry.
    #[error("{service} call timed out after {secs}s")]
    UpstreamTimeout { service: String, secs: u64 },

    /// The reasoning engine returned a non-retryable error.
    #[error("reasoning engine error: {detail}")]
    ReasoningFailed { detail: String },

    /// The OCR service rejected the request outright (auth, bad endpoint).
    #[error("OCR service error: {detail}")]
    OcrFailed { detail: String },

    // ── Validation errors ─────────────────────────────────────────────────
    /// The reasoning payload could not be normalized into a valid order.
    #[error("reasoning payload failed validation: {detail}")]
    InvalidPayload { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// I/O error while handling the source document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Boundary classification of a fatal error.
///
/// An HTTP (or queue, or CLI) front-end maps these onto its own status
/// scheme; the library only decides which bucket an error belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// User-correctable input problem. Not retryable as-is.
    Input,
    /// Upstream service timeout. Retryable.
    Upstream,
    /// Validation failure or programming error. Logged with full context
    /// before being translated into a caller-safe message.
    Unexpected,
}

impl ErrorCode {
    /// Wire representation used in boundary error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Input => "ERR_INPUT",
            ErrorCode::Upstream => "ERR_UPSTREAM",
            ErrorCode::Unexpected => "ERR_UNEXPECTED",
        }
    }
}

impl OrderExtractError {
    /// Classify this error for a boundary response.
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderExtractError::FileNotFound { .. }
            | OrderExtractError::InvalidInput { .. } => ErrorCode::Input,
            OrderExtractError::UpstreamTimeout { .. } => ErrorCode::Upstream,
            OrderExtractError::ProfileStore { .. }
            | OrderExtractError::SchemaNotRegistered { .. }
            | OrderExtractError::InvalidConfig(_)
            | OrderExtractError::ReasoningFailed { .. }
            | OrderExtractError::OcrFailed { .. }
            | OrderExtractError::InvalidPayload { .. }
            | OrderExtractError::Io(_)
            | OrderExtractError::Internal(_) => ErrorCode::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classifies_as_upstream() {
        let e = OrderExtractError::UpstreamTimeout {
            service: "reasoning".into(),
            secs: 60,
        };
        assert_eq!(e.code(), ErrorCode::Upstream);
        assert_eq!(e.code().as_str(), "ERR_UPSTREAM");
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn missing_file_classifies_as_input() {
        let e = OrderExtractError::FileNotFound {
            path: PathBuf::from("orders/missing.pdf"),
        };
        assert_eq!(e.code(), ErrorCode::Input);
        assert!(e.to_string().contains("missing.pdf"));
    }

    #[test]
    fn validation_classifies_as_unexpected() {
        let e = OrderExtractError::InvalidPayload {
            detail: "totals.subtotal: not a decimal".into(),
        };
        assert_eq!(e.code(), ErrorCode::Unexpected);
        assert_eq!(e.code().as_str(), "ERR_UNEXPECTED");
    }
}
