//! Output schema registry.
//!
//! Each schema exists in two renditions kept deliberately in sync:
//!
//! * a **machine-readable JSON schema** sent to the reasoning API as a
//!   `response_format` constraint, and
//! * a **literal description** injected verbatim into the user prompt so
//!   the model sees field names, types, and the "never invent" caveats in
//!   readable form.
//!
//! The registry ships `order_v1` and accepts additional schemas at
//! construction time for customers with bespoke output shapes.

use crate::error::OrderExtractError;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Default schema name used by the pipeline.
pub const DEFAULT_SCHEMA_NAME: &str = "order_v1";

/// Human-readable schema description shown to the reasoning model.
pub const ORDER_SCHEMA_LITERAL: &str = "\
OrderLine:
  line_no: integer | null
  customer_item_no: string | null
  internal_item_no: string | null   # never invent — only if printed on the document
  description: string | null
  quantity: number | null
  unit: string | null
  unit_price: decimal string | null
  discount_percent: number | null
  line_total: decimal string | null

OrderHeader:
  customer_name: string | null
  customer_number: string | null
  customer_po_number: string | null
  order_date: string | null         # ISO-8601
  currency: string | null
  delivery_address: string | null
  billing_address: string | null
  payment_terms: string | null
  raw_filename: string | null

OrderTotals:
  subtotal: decimal string | null
  tax_amount: decimal string | null
  grand_total: decimal string | null

OrderExtractionResult:
  customer_profile_id: string
  header: OrderHeader
  lines: OrderLine[]
  totals: OrderTotals | null
  confidence: number | null";

static ORDER_JSON_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let nullable_string = || json!({"type": ["string", "null"]});
    let nullable_number = || json!({"type": ["number", "null"]});
    let nullable_money = || json!({"type": ["number", "string", "null"]});

    json!({
        "name": "order_extraction_schema",
        "schema": {
            "type": "object",
            "properties": {
                "customer_profile_id": {"type": "string"},
                "header": {
                    "type": "object",
                    "properties": {
                        "customer_name": nullable_string(),
                        "customer_number": nullable_string(),
                        "customer_po_number": nullable_string(),
                        "order_date": nullable_string(),
                        "currency": nullable_string(),
                        "delivery_address": nullable_string(),
                        "billing_address": nullable_string(),
                        "payment_terms": nullable_string(),
                        "raw_filename": nullable_string(),
                    },
                    "required": [
                        "customer_name", "customer_number", "customer_po_number",
                        "order_date", "currency", "delivery_address",
                        "billing_address", "payment_terms", "raw_filename",
                    ],
                    "additionalProperties": false,
                },
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "line_no": {"type": ["integer", "null"]},
                            "customer_item_no": nullable_string(),
                            "internal_item_no": nullable_string(),
                            "description": nullable_string(),
                            "quantity": nullable_number(),
                            "unit": nullable_string(),
                            "unit_price": nullable_money(),
                            "discount_percent": nullable_number(),
                            "line_total": nullable_money(),
                        },
                        "required": [
                            "line_no", "customer_item_no", "internal_item_no",
                            "description", "quantity", "unit", "unit_price",
                            "discount_percent", "line_total",
                        ],
                        "additionalProperties": false,
                    },
                },
                "totals": {
                    "type": ["object", "null"],
                    "properties": {
                        "subtotal": nullable_money(),
                        "tax_amount": nullable_money(),
                        "grand_total": nullable_money(),
                    },
                    "required": ["subtotal", "tax_amount", "grand_total"],
                    "additionalProperties": false,
                },
                "confidence": {"type": ["number", "null"]},
            },
            "required": ["customer_profile_id", "header", "lines", "totals", "confidence"],
            "additionalProperties": false,
        },
        "strict": true,
    })
});

/// Holds machine-readable schemas plus their literal descriptions.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Value>,
    literals: BTreeMap<String, String>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut registry = Self {
            schemas: BTreeMap::new(),
            literals: BTreeMap::new(),
        };
        registry.register(
            DEFAULT_SCHEMA_NAME,
            ORDER_JSON_SCHEMA.clone(),
            ORDER_SCHEMA_LITERAL,
        );
        registry
    }
}

impl SchemaRegistry {
    /// Register (or replace) a schema under `name`.
    pub fn register(&mut self, name: impl Into<String>, json_schema: Value, literal: impl Into<String>) {
        let name = name.into();
        self.schemas.insert(name.clone(), json_schema);
        self.literals.insert(name, literal.into());
    }

    /// Machine-readable schema for the reasoning API's `response_format`.
    pub fn json_schema(&self, name: &str) -> Result<&Value, OrderExtractError> {
        self.schemas
            .get(name)
            .ok_or_else(|| OrderExtractError::SchemaNotRegistered { name: name.to_string() })
    }

    /// Literal schema description for prompt injection.
    pub fn literal(&self, name: &str) -> Result<&str, OrderExtractError> {
        self.literals
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| OrderExtractError::SchemaNotRegistered { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_v1_is_registered_by_default() {
        let registry = SchemaRegistry::default();
        let schema = registry.json_schema(DEFAULT_SCHEMA_NAME).unwrap();
        assert_eq!(schema["name"], "order_extraction_schema");
        assert_eq!(schema["strict"], true);
        assert!(registry.literal(DEFAULT_SCHEMA_NAME).unwrap().contains("OrderLine"));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let registry = SchemaRegistry::default();
        let err = registry.json_schema("order_v999").unwrap_err();
        assert!(err.to_string().contains("order_v999"));
    }

    #[test]
    fn custom_schema_can_be_registered() {
        let mut registry = SchemaRegistry::default();
        registry.register("minimal_v1", json!({"name": "minimal"}), "Minimal: {}");
        assert!(registry.literal("minimal_v1").is_ok());
    }

    #[test]
    fn header_schema_requires_every_field() {
        let registry = SchemaRegistry::default();
        let schema = registry.json_schema(DEFAULT_SCHEMA_NAME).unwrap();
        let required = schema["schema"]["properties"]["header"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 9);
    }
}
