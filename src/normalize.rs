//! Response normalization: repair and validate the raw reasoning payload.
//!
//! The reasoning engine's output is an external wire format and is treated
//! with exactly that level of trust: every access goes through explicit
//! presence checks, numeric parsing, and a final typed deserialization.
//! Repair happens in a fixed order —
//!
//! 1. parse (stripping a disobedient outer markdown fence first),
//! 2. back-fill required top-level keys with safe defaults,
//! 3. coerce monetary fields to exact decimal strings,
//! 4. back-fill `header.raw_filename` and `header.currency`,
//! 5. derive confidence from token log-probabilities,
//! 6. deserialize into [`OrderExtractionResult`].
//!
//! Anything that cannot be repaired — unparseable JSON, a monetary value
//! that is not a decimal, a structural type mismatch — is a hard
//! [`OrderExtractError::InvalidPayload`], never a silently dropped field.

use crate::error::OrderExtractError;
use crate::order::OrderExtractionResult;
use crate::reasoning::{RawReasoningResponse, ReasoningRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

/// Monetary fields on the totals object.
const TOTALS_MONEY_FIELDS: [&str; 3] = ["subtotal", "tax_amount", "grand_total"];

/// Monetary fields on each line item.
const LINE_MONEY_FIELDS: [&str; 2] = ["unit_price", "line_total"];

/// Models sometimes wrap the object in a fence despite the prompt saying
/// not to; tolerate exactly that quirk and nothing more.
static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\n(.*)\n```\s*$").unwrap());

/// Normalize the raw reasoning response into a validated order.
pub fn normalize_response(
    response: &RawReasoningResponse,
    request: &ReasoningRequest,
) -> Result<OrderExtractionResult, OrderExtractError> {
    let mut payload = parse_payload(&response.output_text())?;

    backfill_top_level(&mut payload, &request.profile.id);
    coerce_monetary_fields(&mut payload)?;
    backfill_header(&mut payload, request);

    if let Some(confidence) = confidence_from_logprobs(response) {
        debug!(confidence, "derived confidence from token log-probabilities");
        payload.insert("confidence".to_string(), Value::from(confidence));
    }

    serde_json::from_value(Value::Object(payload)).map_err(|e| {
        OrderExtractError::InvalidPayload {
            detail: e.to_string(),
        }
    })
}

/// Parse the reasoning output text into a JSON object.
fn parse_payload(raw: &str) -> Result<Map<String, Value>, OrderExtractError> {
    let trimmed = raw.trim();
    let unfenced = match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };

    let value: Value =
        serde_json::from_str(&unfenced).map_err(|e| OrderExtractError::InvalidPayload {
            detail: format!("response is not valid JSON: {e}"),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OrderExtractError::InvalidPayload {
            detail: format!("expected a JSON object, got {}", json_type_name(&other)),
        }),
    }
}

/// Back-fill absent top-level keys with safe defaults.
fn backfill_top_level(payload: &mut Map<String, Value>, profile_id: &str) {
    payload
        .entry("header")
        .or_insert_with(|| Value::Object(Map::new()));
    payload
        .entry("lines")
        .or_insert_with(|| Value::Array(Vec::new()));
    payload.entry("totals").or_insert(Value::Null);
    payload.entry("confidence").or_insert(Value::Null);
    payload
        .entry("customer_profile_id")
        .or_insert_with(|| Value::from(profile_id));
}

/// Rewrite every monetary field as an exact decimal string.
fn coerce_monetary_fields(payload: &mut Map<String, Value>) -> Result<(), OrderExtractError> {
    if let Some(totals) = payload.get_mut("totals").and_then(Value::as_object_mut) {
        for field in TOTALS_MONEY_FIELDS {
            coerce_field(totals, field, "totals")?;
        }
    }
    if let Some(lines) = payload.get_mut("lines").and_then(Value::as_array_mut) {
        for (index, line) in lines.iter_mut().enumerate() {
            if let Some(line) = line.as_object_mut() {
                for field in LINE_MONEY_FIELDS {
                    coerce_field(line, field, &format!("lines[{index}]"))?;
                }
            }
        }
    }
    Ok(())
}

/// Coerce one field in place; absent and null values stay untouched.
fn coerce_field(
    object: &mut Map<String, Value>,
    field: &str,
    context: &str,
) -> Result<(), OrderExtractError> {
    let Some(value) = object.get(field) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let decimal = parse_decimal(value).ok_or_else(|| OrderExtractError::InvalidPayload {
        detail: format!("{context}.{field}: '{value}' is not a decimal amount"),
    })?;
    object.insert(field.to_string(), Value::from(decimal.to_string()));
    Ok(())
}

/// Parse a JSON number or string into an exact decimal.
///
/// Numbers go through their canonical shortest text form, so `12.5` becomes
/// the decimal `12.5` rather than the binary float's full expansion.
fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Back-fill `header.raw_filename` and `header.currency`.
fn backfill_header(payload: &mut Map<String, Value>, request: &ReasoningRequest) {
    let Some(header) = payload.get_mut("header").and_then(Value::as_object_mut) else {
        return;
    };

    let filename_missing = header
        .get("raw_filename")
        .map(|v| v.is_null() || v.as_str().is_some_and(|s| s.is_empty()))
        .unwrap_or(true);
    if filename_missing {
        header.insert(
            "raw_filename".to_string(),
            Value::from(request.raw_filename.clone()),
        );
    }

    let currency_missing = header
        .get("currency")
        .map(|v| v.is_null() || v.as_str().is_some_and(|s| s.is_empty()))
        .unwrap_or(true);
    if currency_missing {
        if let Some(currency) = &request.profile.default_currency {
            header.insert("currency".to_string(), Value::from(currency.clone()));
        }
    }
}

/// Derive a calibrated confidence from token log-probabilities.
///
/// For every emitted token across all content blocks, take the single
/// highest reported log-probability, average them, and map through
/// `clamp(1 + avg / 5, 0, 1)`. An average near 0 (near-certain token
/// choices) maps to 1.0; increasingly negative averages decay toward 0.
///
/// The `/5` divisor is an ad-hoc calibration with no probabilistic
/// derivation; it is preserved exactly for compatibility with existing
/// consumers and should not be read as a true probability.
pub fn confidence_from_logprobs(response: &RawReasoningResponse) -> Option<f64> {
    let mut scores: Vec<f64> = Vec::new();
    for item in &response.output {
        for block in &item.content {
            if let Some(report) = &block.logprobs {
                for token in &report.content {
                    if let Some(top) = token.top_logprobs.first() {
                        scores.push(top.logprob);
                    }
                }
            }
        }
    }
    if scores.is_empty() {
        return None;
    }
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    Some((1.0 + avg / 5.0).clamp(0.0, 1.0))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
