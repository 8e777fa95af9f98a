use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{Ledger, TransactionRecord};

/// Load CSV data into a ledger, applying the config's column mapping.
///
/// Fails on the first malformed row; reconciliation assumes a well-typed
/// ledger. An empty customer field is normalized to the configured
/// unknown-customer sentinel so the engine only ever sees one spelling.
pub fn load_csv_ledger(csv_data: &str, config: &ReconConfig) -> Result<Ledger, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let col = &config.columns;

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::MissingColumn { column: name.into() })
    };

    let customer_idx = idx(&col.customer_id)?;
    let product_idx = idx(&col.product_code)?;
    let quantity_idx = idx(&col.quantity)?;
    let timestamp_idx = idx(&col.timestamp)?;
    let cancelled_idx = idx(&col.cancelled)?;

    let mut records = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;

        let customer_raw = record.get(customer_idx).unwrap_or("").trim();
        let customer_id = if customer_raw.is_empty() {
            config.policy.unknown_customer.clone()
        } else {
            customer_raw.to_string()
        };

        let product_code = record.get(product_idx).unwrap_or("").to_string();

        let quantity_str = record.get(quantity_idx).unwrap_or("");
        let quantity: i64 = quantity_str.trim().parse().map_err(|_| {
            ReconError::QuantityParse { row, value: quantity_str.into() }
        })?;

        let timestamp_str = record.get(timestamp_idx).unwrap_or("");
        let timestamp =
            NaiveDateTime::parse_from_str(timestamp_str, &config.policy.timestamp_format)
                .map_err(|_| ReconError::TimestampParse { row, value: timestamp_str.into() })?;

        let cancelled_str = record.get(cancelled_idx).unwrap_or("");
        let is_cancellation = parse_flag(cancelled_str)
            .ok_or_else(|| ReconError::FlagParse { row, value: cancelled_str.into() })?;

        let mut raw_fields = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            if let Some(val) = record.get(i) {
                raw_fields.insert(h.clone(), val.to_string());
            }
        }

        records.push(TransactionRecord {
            customer_id,
            product_code,
            quantity,
            timestamp,
            is_cancellation,
            canceled_quantity: 0,
            cancel_timestamp: None,
            raw_fields,
        });
    }

    Ok(Ledger { headers, records })
}

/// Accepts 0/1 and true/false spellings for the cancellation flag.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
