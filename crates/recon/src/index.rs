use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::TransactionRecord;

/// Lookup key for candidate selection. Cancellations only ever match
/// purchases of the same customer and product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub customer_id: String,
    pub product_code: String,
}

impl PairKey {
    pub fn new(customer_id: &str, product_code: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            product_code: product_code.to_string(),
        }
    }
}

/// Purchase rows grouped by (customer, product), each group stably sorted by
/// timestamp ascending. Timestamp ties keep ledger order, so "most recent"
/// is always the last element of a lookup slice.
#[derive(Debug)]
pub struct PurchaseIndex {
    by_pair: HashMap<PairKey, Vec<usize>>,
}

impl PurchaseIndex {
    /// Index every purchase row eligible as a cancellation target. Rows
    /// flagged as cancellations and rows carrying the unknown-customer
    /// sentinel are left out.
    pub fn build(records: &[TransactionRecord], unknown_customer: &str) -> Self {
        let mut by_pair: HashMap<PairKey, Vec<usize>> = HashMap::new();

        for (i, r) in records.iter().enumerate() {
            if r.is_cancellation || r.customer_id == unknown_customer {
                continue;
            }
            by_pair
                .entry(PairKey::new(&r.customer_id, &r.product_code))
                .or_default()
                .push(i);
        }

        // Stable sort: groups were pushed in ledger order, so equal
        // timestamps stay in ledger order.
        for rows in by_pair.values_mut() {
            rows.sort_by_key(|&i| records[i].timestamp);
        }

        Self { by_pair }
    }

    /// All purchases for the pair with `timestamp <= cutoff`, oldest first.
    pub fn candidates_at_or_before(
        &self,
        records: &[TransactionRecord],
        key: &PairKey,
        cutoff: NaiveDateTime,
    ) -> &[usize] {
        match self.by_pair.get(key) {
            Some(rows) => {
                let end = rows.partition_point(|&i| records[i].timestamp <= cutoff);
                &rows[..end]
            }
            None => &[],
        }
    }
}
