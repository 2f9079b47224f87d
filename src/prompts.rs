//! Prompt construction for the reasoning call.
//!
//! Centralising prompt text here keeps it inspectable: unit tests read the
//! built messages directly instead of spinning up a reasoning backend, and
//! prompt changes never touch the HTTP or normalization code.

use crate::reasoning::ReasoningRequest;

/// System message framing the reasoning engine's role.
pub const SYSTEM_PROMPT: &str = "You are an order-extraction engine for an ERP system. \
You read noisy PDF order forms and output exactly one JSON object conforming to a fixed schema. \
Use only information present in the text; leave ambiguous fields null. \
Never invent internal product numbers. Do not output anything except the JSON.";

/// Standing instructions repeated in the user message.
const INSTRUCTIONS: &str = "Return a single JSON object matching the schema. \
No markdown fences, no comments, no extra whitespace. \
If unsure about a field, set it to null.";

/// Build the user message: profile metadata, optional layout cues, schema
/// literal, fenced raw text, instructions, optional few-shot examples, and
/// the raw filename.
pub fn build_user_message(request: &ReasoningRequest) -> String {
    let profile = &request.profile;
    let form_id = request.form_id.as_deref();
    let intro = profile.to_prompt_metadata(form_id);

    let layout_section = request
        .layout
        .as_ref()
        .map(|layout| layout.to_prompt_section())
        .filter(|section| !section.is_empty())
        .map(|section| format!("\n{section}\n"))
        .unwrap_or_default();

    let examples = profile.few_shot_examples(form_id);
    let example_section = if examples.is_empty() {
        String::new()
    } else {
        format!("\nFew-shot examples:\n{examples}\n")
    };

    format!(
        "Document type: customer order form. Active customer profile: {profile_id}.\n\
         {intro}\n{layout_section}\n\
         Literal JSON schema (as provided):\n{schema}\n\n\
         Raw text extracted from the PDF (triple-backtick fenced).\n\
         ```{text}```\n\n\
         Instructions:\n{INSTRUCTIONS}\n{example_section}\
         Raw filename: {filename}",
        profile_id = profile.id,
        intro = intro,
        layout_section = layout_section,
        schema = request.schema_literal,
        text = request.text,
        filename = request.raw_filename,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutBlock, LayoutResult};
    use crate::profile::CustomerProfile;
    use std::sync::Arc;

    fn request_with(text: &str, layout: Option<LayoutResult>) -> ReasoningRequest {
        ReasoningRequest {
            text: text.to_string(),
            raw_filename: "order-123.pdf".to_string(),
            profile: Arc::new(CustomerProfile {
                id: "acme".to_string(),
                default_currency: Some("EUR".to_string()),
                ..CustomerProfile::default()
            }),
            schema_literal: "OrderExtractionResult: {...}".to_string(),
            json_schema: serde_json::json!({}),
            form_id: None,
            layout,
        }
    }

    #[test]
    fn user_message_carries_text_schema_and_filename() {
        let message = build_user_message(&request_with("Customer: ACME, PO 123", None));
        assert!(message.contains("Active customer profile: acme"));
        assert!(message.contains("```Customer: ACME, PO 123```"));
        assert!(message.contains("OrderExtractionResult"));
        assert!(message.contains("Raw filename: order-123.pdf"));
    }

    #[test]
    fn layout_section_appears_only_when_blocks_exist() {
        let without = build_user_message(&request_with("text", Some(LayoutResult::default())));
        assert!(!without.contains("Layout summary"));

        let layout = LayoutResult {
            blocks: vec![LayoutBlock {
                kind: "table".into(),
                text: "Qty | Item | Price".into(),
                ..LayoutBlock::default()
            }],
            engine_name: "stub".into(),
        };
        let with = build_user_message(&request_with("text", Some(layout)));
        assert!(with.contains("Layout summary"));
        assert!(with.contains("Qty | Item | Price"));
    }

    #[test]
    fn system_prompt_forbids_invention() {
        assert!(SYSTEM_PROMPT.contains("Never invent internal product numbers"));
    }
}
