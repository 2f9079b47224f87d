//! The extraction fallback chain: try engines in priority order, accept the
//! first result that clears the quality gate.
//!
//! ## Escalation policy
//!
//! Engines run strictly sequentially — never speculatively in parallel —
//! because the whole point of the ordering is cost control: a local text
//! layer read costs microseconds, a remote OCR pass costs real money.
//! OCR is invoked only when every cheaper engine under-delivered, or when
//! the request explicitly forces it.
//!
//! ## Failure policy
//!
//! A failing engine is routine, not exceptional. Each engine invocation
//! yields either a result or an advisory string (`"<engine>: <message>"`)
//! appended to the running error list; no error crosses the chain boundary
//! as an `Err`. Even a chain where every engine failed returns a normal
//! (empty) result whose error list documents each failure.

use super::{Capability, ExtractionContext, ExtractionEngine, ExtractionResult};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prioritized list of engines with a quality gate.
pub struct ExtractionChain {
    engines: Vec<Arc<dyn ExtractionEngine>>,
    name: String,
    min_characters: usize,
    min_alpha_ratio: f64,
}

impl ExtractionChain {
    /// Build a chain from an arbitrary engine collection.
    ///
    /// Engines are sorted ascending by priority at construction; the sort
    /// is stable so equal priorities keep their given order. An empty
    /// engine set is acceptable — extraction then yields an empty result
    /// with an advisory error, not a panic.
    pub fn new(
        mut engines: Vec<Arc<dyn ExtractionEngine>>,
        min_characters: usize,
        min_alpha_ratio: f64,
    ) -> Self {
        engines.sort_by_key(|engine| engine.priority());
        let name = if engines.is_empty() {
            "empty".to_string()
        } else {
            engines
                .iter()
                .map(|engine| engine.name().to_string())
                .collect::<Vec<_>>()
                .join("+")
        };
        Self {
            engines,
            name,
            min_characters,
            min_alpha_ratio,
        }
    }

    /// Composite chain name: engine names joined in priority order.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the chain against a document.
    ///
    /// Returns the first gate-passing result, or the best-effort result
    /// (longest raw text, earliest on ties) when nothing passes, or an
    /// empty result when no engine produced anything at all. Advisory
    /// errors accumulated along the way are attached in every case.
    pub async fn extract(&self, source: &Path, context: &ExtractionContext) -> ExtractionResult {
        let force_ocr = context.effective_force_ocr();
        let mut errors: Vec<String> = Vec::new();
        let mut best: Option<ExtractionResult> = None;

        if self.engines.is_empty() {
            errors.push("extraction chain has no engines configured".to_string());
        }

        for engine in &self.engines {
            debug!(engine = engine.name(), priority = engine.priority(), "running extraction engine");
            let mut result = match engine.extract(source, context).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(engine = engine.name(), error = %err, "extraction engine failed");
                    errors.push(format!("{}: {err}", engine.name()));
                    continue;
                }
            };

            result
                .metadata
                .entry("engine_name".to_string())
                .or_insert_with(|| Value::from(engine.name()));

            if let Some(reason) = self.gate_rejection(engine.as_ref(), &result, force_ocr) {
                debug!(engine = engine.name(), reason = %reason, "quality gate rejected result");
                errors.push(reason);
                track_best(&mut best, result);
                continue;
            }

            // Gate passed: stop escalating.
            result.errors.extend(errors);
            result.metadata.insert(
                "fallback_chain".to_string(),
                Value::from(self.name.clone()),
            );
            debug!(
                engine = engine.name(),
                chars = result.combined_text.len(),
                "extraction accepted"
            );
            return result;
        }

        match best {
            Some(mut result) => {
                warn!(
                    chain = %self.name,
                    "no engine met the quality gate, returning best-effort output"
                );
                result.errors.extend(errors);
                result.metadata.insert(
                    "fallback_chain".to_string(),
                    Value::from(self.name.clone()),
                );
                result
            }
            None => {
                warn!(chain = %self.name, "no engine produced any output");
                ExtractionResult::empty(&self.name, errors)
            }
        }
    }

    /// Reason the quality gate rejects `result`, or `None` when it passes.
    fn gate_rejection(
        &self,
        engine: &dyn ExtractionEngine,
        result: &ExtractionResult,
        force_ocr: bool,
    ) -> Option<String> {
        if force_ocr && !engine.has_capability(Capability::Ocr) {
            return Some(format!(
                "{}: force_ocr requested but engine lacks the ocr capability",
                engine.name()
            ));
        }

        let trimmed = result.combined_text.trim();
        if trimmed.is_empty() {
            return Some(format!("{}: empty output", engine.name()));
        }

        let char_count = trimmed.chars().count();
        if char_count < self.min_characters {
            return Some(format!(
                "{}: output below minimum length ({char_count} < {})",
                engine.name(),
                self.min_characters
            ));
        }

        let alpha_count = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
        let ratio = alpha_count as f64 / char_count as f64;
        if ratio < self.min_alpha_ratio {
            return Some(format!(
                "{}: alphanumeric ratio {ratio:.2} below minimum {:.2}",
                engine.name(),
                self.min_alpha_ratio
            ));
        }

        None
    }
}

/// Keep the longer raw text; ties keep the earlier (higher-priority) result.
fn track_best(best: &mut Option<ExtractionResult>, candidate: ExtractionResult) {
    let replace = match best {
        Some(current) => candidate.combined_text.len() > current.combined_text.len(),
        None => true,
    };
    if replace {
        *best = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PageText;
    use crate::error::OrderExtractError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Configurable stub engine recording invocation order.
    struct StubEngine {
        name: String,
        priority: i32,
        capabilities: Vec<Capability>,
        output: Result<String, String>,
        calls: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<String>>>,
    }

    impl StubEngine {
        fn build(
            name: &str,
            priority: i32,
            capabilities: Vec<Capability>,
            output: Result<String, String>,
            order: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                capabilities,
                output,
                calls: Arc::new(AtomicUsize::new(0)),
                order: Arc::clone(order),
            })
        }

        fn ok(name: &str, priority: i32, text: &str, order: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Self::build(name, priority, vec![Capability::Text], Ok(text.to_string()), order)
        }

        fn ocr(name: &str, priority: i32, text: &str, order: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Self::build(
                name,
                priority,
                vec![Capability::Ocr, Capability::Text],
                Ok(text.to_string()),
                order,
            )
        }

        fn failing(name: &str, priority: i32, message: &str, order: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Self::build(name, priority, vec![Capability::Text], Err(message.to_string()), order)
        }
    }

    #[async_trait]
    impl ExtractionEngine for StubEngine {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn capabilities(&self) -> &[Capability] {
            &self.capabilities
        }

        async fn extract(
            &self,
            _source: &Path,
            _context: &ExtractionContext,
        ) -> Result<ExtractionResult, OrderExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.name.clone());
            match &self.output {
                Ok(text) => Ok(ExtractionResult::from_pages(
                    vec![PageText::new(1, text.clone())],
                    &self.name,
                )),
                Err(message) => Err(OrderExtractError::Internal(message.clone())),
            }
        }
    }

    fn context() -> ExtractionContext {
        ExtractionContext::new("order.pdf", "default")
    }

    fn chain_of(
        engines: Vec<Arc<StubEngine>>,
        min_characters: usize,
        min_alpha_ratio: f64,
    ) -> ExtractionChain {
        ExtractionChain::new(
            engines
                .into_iter()
                .map(|engine| engine as Arc<dyn ExtractionEngine>)
                .collect(),
            min_characters,
            min_alpha_ratio,
        )
    }

    #[tokio::test]
    async fn engines_run_in_ascending_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let low_quality = StubEngine::ok("second", 2, "x", &order);
        let first = StubEngine::ok("first", 1, "y", &order);
        let third = StubEngine::ok("third", 3, "a perfectly reasonable body of order text", &order);
        let chain = chain_of(vec![low_quality, third, first], 20, 0.25);

        assert_eq!(chain.name(), "first+second+third");
        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(result.engine_name(), Some("third"));
    }

    #[tokio::test]
    async fn short_text_escalates_to_ocr_with_advisory() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let text = StubEngine::ok("text", 1, "short", &order);
        let ocr = StubEngine::ocr("ocr", 2, "this is a much longer body of recognised text", &order);
        let chain = chain_of(vec![text, ocr], 10, 0.0);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert_eq!(result.engine_name(), Some("ocr"));
        assert_eq!(result.metadata["fallback_chain"], serde_json::json!("text+ocr"));
        assert!(result.errors.iter().any(|e| e.starts_with("text:")));
    }

    #[tokio::test]
    async fn accepted_result_short_circuits_remaining_engines() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let good = StubEngine::ok("good", 1, "Customer ACME orders 5 pallets of part A-1", &order);
        let ocr = StubEngine::ocr("ocr", 50, "unused", &order);
        let never_called = Arc::clone(&ocr.calls);
        let chain = chain_of(vec![good, ocr], 10, 0.25);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert_eq!(result.engine_name(), Some("good"));
        assert_eq!(never_called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn force_ocr_skips_past_text_engines() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let text = StubEngine::ok("text", 1, "this has plenty of characters to pass the gate", &order);
        let ocr = StubEngine::ocr("ocr", 2, "ocr output with plenty of characters as well", &order);
        let chain = chain_of(vec![text, ocr], 10, 0.0);

        let mut ctx = context();
        ctx.hints.insert("force_ocr".into(), "true".into());
        let result = chain.extract(Path::new("fake.pdf"), &ctx).await;
        assert_eq!(result.engine_name(), Some("ocr"));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("force_ocr requested")));
    }

    #[tokio::test]
    async fn force_ocr_without_ocr_engine_returns_best_effort() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = StubEngine::ok("a", 1, "first candidate body of text", &order);
        let b = StubEngine::ok("b", 2, "second candidate body of text, slightly longer", &order);
        let chain = chain_of(vec![a, b], 10, 0.0);

        let mut ctx = context();
        ctx.force_ocr = true;
        let result = chain.extract(Path::new("fake.pdf"), &ctx).await;

        // Best-effort keeps the longest output; every engine gets an advisory.
        assert_eq!(result.engine_name(), Some("b"));
        let force_advisories = result
            .errors
            .iter()
            .filter(|e| e.contains("force_ocr requested"))
            .count();
        assert_eq!(force_advisories, 2);
    }

    #[tokio::test]
    async fn failing_engine_is_absorbed_and_chain_continues() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let broken = StubEngine::failing("broken", 1, "parser exploded", &order);
        let good = StubEngine::ok("good", 2, "a body of text long enough to be accepted", &order);
        let chain = chain_of(vec![broken, good], 10, 0.25);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert_eq!(result.engine_name(), Some("good"));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("broken: internal error: parser exploded")));
    }

    #[tokio::test]
    async fn all_engines_failing_yields_empty_result_with_errors() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = StubEngine::failing("a", 1, "boom", &order);
        let b = StubEngine::failing("b", 2, "bang", &order);
        let chain = chain_of(vec![a, b], 10, 0.25);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert!(result.combined_text.is_empty());
        assert!(result.pages.is_empty());
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.engine_name(), Some("a+b"));
    }

    #[tokio::test]
    async fn empty_engine_set_is_not_an_error() {
        let chain = chain_of(Vec::new(), 10, 0.25);
        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert!(result.combined_text.is_empty());
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn ties_keep_the_higher_priority_result() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = StubEngine::ok("a", 1, "1234", &order);
        let b = StubEngine::ok("b", 2, "5678", &order);
        let chain = chain_of(vec![a, b], 10, 0.25);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert_eq!(result.engine_name(), Some("a"));
    }

    #[tokio::test]
    async fn low_alpha_ratio_is_rejected() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let junk = StubEngine::ok("junk", 1, "||| --- ::: === ||| --- ::: ===", &order);
        let chain = chain_of(vec![junk], 5, 0.5);

        let result = chain.extract(Path::new("fake.pdf"), &context()).await;
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("alphanumeric ratio")));
    }
}
