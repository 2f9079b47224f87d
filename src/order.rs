//! Typed order record produced by the pipeline.
//!
//! This is the wire shape callers receive: a header, ordered line items,
//! optional totals, and an optional confidence score. Monetary fields are
//! [`rust_decimal::Decimal`] values that serialise as exact fixed-point
//! strings (`"12.50"`, never `12.5` as a binary float), so downstream ERP
//! consumers never see rounding drift.
//!
//! Every field the reasoning engine fills is optional — a noisy scan may
//! yield only a customer name — but the *shape* is strict: the normalizer
//! deserialises the repaired payload into these types and any type mismatch
//! is a hard validation failure, not a silently dropped field.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line item on the order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderLine {
    /// Position on the order form, when printed.
    pub line_no: Option<i64>,

    /// Item number as the customer writes it.
    pub customer_item_no: Option<String>,

    /// Internal (ERP-side) item number. Only ever present when it is
    /// literally printed on the document — never inferred.
    pub internal_item_no: Option<String>,

    /// Free-text description.
    pub description: Option<String>,

    /// Ordered quantity.
    pub quantity: Option<f64>,

    /// Unit of measure (pcs, kg, box, …).
    pub unit: Option<String>,

    /// Price per unit, exact decimal.
    pub unit_price: Option<Decimal>,

    /// Line discount in percent.
    pub discount_percent: Option<f64>,

    /// Extended line amount, exact decimal.
    pub line_total: Option<Decimal>,
}

/// Order header fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderHeader {
    pub customer_name: Option<String>,
    pub customer_number: Option<String>,
    pub customer_po_number: Option<String>,
    /// ISO-8601 date string.
    pub order_date: Option<String>,
    pub currency: Option<String>,
    pub delivery_address: Option<String>,
    pub billing_address: Option<String>,
    pub payment_terms: Option<String>,
    /// Filename of the uploaded document, back-filled by the normalizer.
    pub raw_filename: Option<String>,
}

/// Document-level totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTotals {
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub grand_total: Option<Decimal>,
}

/// The validated result of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExtractionResult {
    /// Profile the request resolved to (the default profile id when the
    /// requested one was unknown).
    pub customer_profile_id: String,

    pub header: OrderHeader,

    /// Line items in document order.
    #[serde(default)]
    pub lines: Vec<OrderLine>,

    #[serde(default)]
    pub totals: Option<OrderTotals>,

    /// Calibrated confidence in `[0, 1]`, derived from token
    /// log-probabilities when the reasoning engine reports them.
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimals_serialize_as_exact_strings() {
        let totals = OrderTotals {
            subtotal: Some(Decimal::from_str("12.50").unwrap()),
            tax_amount: Some(Decimal::from_str("2.875").unwrap()),
            grand_total: None,
        };
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json["subtotal"], serde_json::json!("12.50"));
        assert_eq!(json["tax_amount"], serde_json::json!("2.875"));
        assert_eq!(json["grand_total"], serde_json::Value::Null);
    }

    #[test]
    fn sparse_header_deserializes_with_nulls() {
        let header: OrderHeader =
            serde_json::from_value(serde_json::json!({"customer_name": "ACME"})).unwrap();
        assert_eq!(header.customer_name.as_deref(), Some("ACME"));
        assert!(header.currency.is_none());
        assert!(header.raw_filename.is_none());
    }

    #[test]
    fn wrong_line_type_is_rejected() {
        let result: Result<OrderLine, _> =
            serde_json::from_value(serde_json::json!({"quantity": "five"}));
        assert!(result.is_err());
    }
}
