use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One row of the transaction ledger.
///
/// `canceled_quantity` and `cancel_timestamp` are the only fields the engine
/// mutates; everything else is fixed at ingestion. `canceled_quantity` only
/// ever grows, and only on purchase rows.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub customer_id: String,
    pub product_code: String,
    /// Positive for purchases, negative for cancellations (magnitude = units).
    pub quantity: i64,
    pub timestamp: NaiveDateTime,
    pub is_cancellation: bool,
    /// Units of this purchase consumed by reconciled cancellations so far.
    pub canceled_quantity: i64,
    /// Set when the purchase receives its (last) allocation.
    pub cancel_timestamp: Option<NaiveDateTime>,
    /// Original CSV fields, kept for annotated export.
    pub raw_fields: HashMap<String, String>,
}

/// The full ledger: source header order plus all records, in file order.
/// Record identifiers throughout the crate are 0-based positions into
/// `records`.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub headers: Vec<String>,
    pub records: Vec<TransactionRecord>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBucket {
    NoMatch,
    OneMatch,
    MultMatch,
}

impl std::fmt::Display for MatchBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no_match"),
            Self::OneMatch => write!(f, "one_match"),
            Self::MultMatch => write!(f, "mult_match"),
        }
    }
}

/// Bucket membership for every processed cancellation. Each list preserves
/// processing order; a cancellation appears in exactly one list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub no_match: Vec<usize>,
    pub one_match: Vec<usize>,
    pub mult_match: Vec<usize>,
}

impl Classification {
    pub fn push(&mut self, bucket: MatchBucket, id: usize) {
        match bucket {
            MatchBucket::NoMatch => self.no_match.push(id),
            MatchBucket::OneMatch => self.one_match.push(id),
            MatchBucket::MultMatch => self.mult_match.push(id),
        }
    }

    pub fn bucket_of(&self, id: usize) -> Option<MatchBucket> {
        if self.no_match.contains(&id) {
            Some(MatchBucket::NoMatch)
        } else if self.one_match.contains(&id) {
            Some(MatchBucket::OneMatch)
        } else if self.mult_match.contains(&id) {
            Some(MatchBucket::MultMatch)
        } else {
            None
        }
    }

    /// Total cancellations classified across all buckets.
    pub fn total(&self) -> usize {
        self.no_match.len() + self.one_match.len() + self.mult_match.len()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Side observations returned explicitly instead of kept as hidden counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconDiagnostics {
    /// Cancellations whose sole candidate was bought in a smaller quantity
    /// than the cancellation asks for.
    pub undersized_sole_candidate: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub total_cancellations: usize,
    pub no_match: usize,
    pub one_match: usize,
    pub mult_match: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub classification: Classification,
    pub diagnostics: ReconDiagnostics,
}
