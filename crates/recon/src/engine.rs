use chrono::NaiveDateTime;

use crate::config::{MatchPolicy, ReconConfig};
use crate::error::ReconError;
use crate::index::{PairKey, PurchaseIndex};
use crate::model::{
    Classification, Ledger, MatchBucket, ReconDiagnostics, ReconMeta, ReconReport,
    TransactionRecord,
};
use crate::report::summarize;

/// Classification plus diagnostics for one reconciliation pass. The annotated
/// ledger itself is the caller's buffer, mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ReconOutcome {
    pub classification: Classification,
    pub diagnostics: ReconDiagnostics,
}

/// Run reconciliation per config. Mutates `canceled_quantity` and
/// `cancel_timestamp` on allocated purchases and returns the full report.
pub fn run(config: &ReconConfig, ledger: &mut Ledger) -> Result<ReconReport, ReconError> {
    let outcome = reconcile(&mut ledger.records, &config.policy)?;
    let summary = summarize(&outcome.classification);

    Ok(ReconReport {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        classification: outcome.classification,
        diagnostics: outcome.diagnostics,
    })
}

/// Reconcile cancellations against earlier purchases, one cancellation at a
/// time, in ledger order.
///
/// Allocations are order-dependent: each cancellation reads the
/// `canceled_quantity` left behind by the ones before it, so this is a
/// strictly sequential fold. Every cancellation processed lands in exactly
/// one bucket; cancellations past the policy limit are skipped entirely.
pub fn reconcile(
    records: &mut [TransactionRecord],
    policy: &MatchPolicy,
) -> Result<ReconOutcome, ReconError> {
    let index = PurchaseIndex::build(records, &policy.unknown_customer);

    let mut cancellations: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_cancellation && r.customer_id != policy.unknown_customer)
        .map(|(i, _)| i)
        .collect();
    if let Some(limit) = policy.limit {
        cancellations.truncate(limit);
    }

    let mut classification = Classification::default();
    let mut diagnostics = ReconDiagnostics::default();

    for id in cancellations {
        let (key, cancel_timestamp, needed) = {
            let c = &records[id];
            (
                PairKey::new(&c.customer_id, &c.product_code),
                c.timestamp,
                c.quantity.abs(),
            )
        };

        let candidates = index
            .candidates_at_or_before(records, &key, cancel_timestamp)
            .to_vec();

        match candidates.as_slice() {
            [] => classification.push(MatchBucket::NoMatch, id),

            &[pi] => {
                let (quantity, canceled) = {
                    let p = &records[pi];
                    (p.quantity, p.canceled_quantity)
                };

                if quantity < needed {
                    diagnostics.undersized_sole_candidate.push(id);
                }

                if quantity - canceled >= needed {
                    let allocated = needed.min(quantity);
                    let p = &mut records[pi];
                    p.canceled_quantity += allocated;
                    p.cancel_timestamp = Some(cancel_timestamp);
                    classification.push(MatchBucket::OneMatch, id);
                } else {
                    // The sole candidate cannot absorb the full quantity; no
                    // partial allocation in this branch.
                    classification.push(MatchBucket::NoMatch, id);
                }
            }

            _ => {
                // Classified up front; whether allocation fully succeeds
                // does not change the bucket.
                classification.push(MatchBucket::MultMatch, id);

                // Candidates are oldest-first, so the last exact match is
                // the most recent purchase.
                let exact = candidates
                    .iter()
                    .copied()
                    .filter(|&i| {
                        let p = &records[i];
                        p.quantity == needed && p.quantity >= p.canceled_quantity + needed
                    })
                    .last();

                if let Some(pi) = exact {
                    let p = &mut records[pi];
                    p.canceled_quantity += needed;
                    p.cancel_timestamp = Some(cancel_timestamp);
                } else {
                    sweep_allocate(records, &candidates, needed, cancel_timestamp);
                }
            }
        }
    }

    verify_no_overcancellation(records, policy)?;

    Ok(ReconOutcome { classification, diagnostics })
}

/// Greedy reverse-chronological sweep: consume candidates from most recent
/// to oldest until the cancelled quantity is covered or candidates run out.
/// Ending short is accepted; the caller's classification stands either way.
fn sweep_allocate(
    records: &mut [TransactionRecord],
    candidates: &[usize],
    needed: i64,
    cancel_timestamp: NaiveDateTime,
) {
    let mut cum_allocated = 0;

    for &i in candidates.iter().rev() {
        if cum_allocated >= needed {
            break;
        }
        let remaining = records[i].quantity - records[i].canceled_quantity;
        if remaining <= 0 {
            continue;
        }
        let allocated = remaining.min(needed - cum_allocated);
        let p = &mut records[i];
        p.canceled_quantity += allocated;
        p.cancel_timestamp = Some(cancel_timestamp);
        cum_allocated += allocated;
    }
}

/// Post-pass scan: every purchase outside the exempt product codes must not
/// have more units canceled than bought. A hit means an allocation was
/// double-booked — a logic failure, not an input problem.
pub fn verify_no_overcancellation(
    records: &[TransactionRecord],
    policy: &MatchPolicy,
) -> Result<(), ReconError> {
    let offenders: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            !r.is_cancellation
                && !policy.exempt_codes.iter().any(|c| c == &r.product_code)
                && r.canceled_quantity > r.quantity
        })
        .map(|(i, _)| i)
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(ReconError::IntegrityViolation { offenders })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 12, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(minute as i64)
    }

    fn purchase(customer: &str, product: &str, quantity: i64, minute: u32) -> TransactionRecord {
        TransactionRecord {
            customer_id: customer.into(),
            product_code: product.into(),
            quantity,
            timestamp: at(minute),
            is_cancellation: false,
            canceled_quantity: 0,
            cancel_timestamp: None,
            raw_fields: HashMap::new(),
        }
    }

    fn cancellation(customer: &str, product: &str, quantity: i64, minute: u32) -> TransactionRecord {
        TransactionRecord {
            is_cancellation: true,
            ..purchase(customer, product, quantity, minute)
        }
    }

    fn policy() -> MatchPolicy {
        MatchPolicy::default()
    }

    #[test]
    fn no_cancellations_leaves_ledger_untouched() {
        let mut records = vec![
            purchase("17850", "85123A", 6, 0),
            purchase("13047", "22423", 4, 5),
        ];
        let before = records.clone();
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.total(), 0);
        for (a, b) in records.iter().zip(&before) {
            assert_eq!(a.canceled_quantity, b.canceled_quantity);
            assert_eq!(a.cancel_timestamp, b.cancel_timestamp);
        }
    }

    #[test]
    fn zero_candidates_is_no_match() {
        let mut records = vec![
            purchase("17850", "85123A", 6, 0),
            cancellation("17850", "22423", -2, 10),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();
        assert_eq!(outcome.classification.no_match, vec![1]);
        assert_eq!(records[0].canceled_quantity, 0);
    }

    #[test]
    fn later_purchase_is_not_a_candidate() {
        let mut records = vec![
            cancellation("17850", "85123A", -2, 0),
            purchase("17850", "85123A", 6, 10),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();
        assert_eq!(outcome.classification.no_match, vec![0]);
        assert_eq!(records[1].canceled_quantity, 0);
    }

    #[test]
    fn single_candidate_allocates() {
        let mut records = vec![
            purchase("17850", "85123A", 10, 0),
            cancellation("17850", "85123A", -6, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.one_match, vec![1]);
        assert_eq!(records[0].canceled_quantity, 6);
        assert_eq!(records[0].cancel_timestamp, Some(at(30)));
        assert!(outcome.diagnostics.undersized_sole_candidate.is_empty());
    }

    #[test]
    fn insufficient_single_candidate_is_no_match() {
        let mut records = vec![
            purchase("17850", "85123A", 10, 0),
            cancellation("17850", "85123A", -6, 30),
            cancellation("17850", "85123A", -5, 40),
        ];
        // First cancellation takes 6, leaving capacity 4; the second needs 5.
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.one_match, vec![1]);
        assert_eq!(outcome.classification.no_match, vec![2]);
        assert_eq!(records[0].canceled_quantity, 6);
        assert_eq!(records[0].cancel_timestamp, Some(at(30)));
    }

    #[test]
    fn undersized_sole_candidate_reported() {
        let mut records = vec![
            purchase("17850", "85123A", 3, 0),
            cancellation("17850", "85123A", -5, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.no_match, vec![1]);
        assert_eq!(outcome.diagnostics.undersized_sole_candidate, vec![1]);
        assert_eq!(records[0].canceled_quantity, 0);
    }

    #[test]
    fn exact_match_preferred_over_older_candidates() {
        let mut records = vec![
            purchase("17850", "85123A", 5, 0),
            purchase("17850", "85123A", 8, 10),
            cancellation("17850", "85123A", -8, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2]);
        assert_eq!(records[0].canceled_quantity, 0);
        assert_eq!(records[0].cancel_timestamp, None);
        assert_eq!(records[1].canceled_quantity, 8);
        assert_eq!(records[1].cancel_timestamp, Some(at(30)));
    }

    #[test]
    fn latest_exact_match_wins() {
        let mut records = vec![
            purchase("17850", "85123A", 4, 0),
            purchase("17850", "85123A", 4, 10),
            cancellation("17850", "85123A", -4, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2]);
        assert_eq!(records[0].canceled_quantity, 0);
        assert_eq!(records[1].canceled_quantity, 4);
    }

    #[test]
    fn consumed_exact_match_falls_back_to_older_exact_match() {
        let mut records = vec![
            purchase("17850", "85123A", 4, 0),
            purchase("17850", "85123A", 4, 10),
            cancellation("17850", "85123A", -4, 30),
            cancellation("17850", "85123A", -4, 40),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2, 3]);
        assert_eq!(records[1].canceled_quantity, 4);
        assert_eq!(records[1].cancel_timestamp, Some(at(30)));
        assert_eq!(records[0].canceled_quantity, 4);
        assert_eq!(records[0].cancel_timestamp, Some(at(40)));
    }

    #[test]
    fn exact_match_ties_break_toward_later_ledger_position() {
        let mut records = vec![
            purchase("17850", "85123A", 4, 10),
            purchase("17850", "85123A", 4, 10),
            cancellation("17850", "85123A", -4, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2]);
        assert_eq!(records[0].canceled_quantity, 0);
        assert_eq!(records[1].canceled_quantity, 4);
    }

    #[test]
    fn reverse_sweep_covers_from_most_recent() {
        let mut records = vec![
            purchase("17850", "85123A", 3, 0),
            purchase("17850", "85123A", 4, 10),
            purchase("17850", "85123A", 5, 20),
            cancellation("17850", "85123A", -7, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![3]);
        assert_eq!(records[2].canceled_quantity, 5);
        assert_eq!(records[2].cancel_timestamp, Some(at(30)));
        assert_eq!(records[1].canceled_quantity, 2);
        assert_eq!(records[1].cancel_timestamp, Some(at(30)));
        assert_eq!(records[0].canceled_quantity, 0);
        assert_eq!(records[0].cancel_timestamp, None);
    }

    #[test]
    fn reverse_sweep_skips_exhausted_candidates() {
        let mut records = vec![
            purchase("17850", "85123A", 6, 0),
            purchase("17850", "85123A", 4, 10),
            cancellation("17850", "85123A", -4, 20),
            cancellation("17850", "85123A", -5, 30),
        ];
        // The first cancellation exactly consumes the qty-4 purchase; the
        // second must sweep past it into the older qty-6 purchase.
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2, 3]);
        assert_eq!(records[1].canceled_quantity, 4);
        assert_eq!(records[0].canceled_quantity, 5);
        assert_eq!(records[0].cancel_timestamp, Some(at(30)));
    }

    #[test]
    fn reverse_sweep_partial_coverage_stays_mult_match() {
        let mut records = vec![
            purchase("17850", "85123A", 2, 0),
            purchase("17850", "85123A", 3, 10),
            cancellation("17850", "85123A", -40, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.mult_match, vec![2]);
        assert!(outcome.classification.no_match.is_empty());
        assert_eq!(records[0].canceled_quantity, 2);
        assert_eq!(records[1].canceled_quantity, 3);
    }

    #[test]
    fn mult_match_with_nothing_allocatable_still_mult_match() {
        let mut records = vec![
            purchase("17850", "85123A", 4, 0),
            purchase("17850", "85123A", 4, 10),
            cancellation("17850", "85123A", -4, 20),
            cancellation("17850", "85123A", -4, 25),
            cancellation("17850", "85123A", -4, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        // Both purchases are fully consumed by the first two cancellations;
        // the third allocates nothing but keeps its bucket.
        assert_eq!(outcome.classification.mult_match, vec![2, 3, 4]);
        assert_eq!(records[0].canceled_quantity, 4);
        assert_eq!(records[1].canceled_quantity, 4);
    }

    #[test]
    fn allocations_are_order_dependent() {
        let mut records = vec![
            purchase("17850", "85123A", 10, 0),
            cancellation("17850", "85123A", -8, 10),
            cancellation("17850", "85123A", -8, 20),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        // The first cancellation leaves capacity 2, so the second cannot
        // be absorbed.
        assert_eq!(outcome.classification.one_match, vec![1]);
        assert_eq!(outcome.classification.no_match, vec![2]);
        assert_eq!(records[0].canceled_quantity, 8);
    }

    #[test]
    fn sentinel_cancellation_never_processed() {
        let mut records = vec![
            purchase("00000", "85123A", 6, 0),
            cancellation("00000", "85123A", -2, 10),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();

        assert_eq!(outcome.classification.total(), 0);
        assert_eq!(records[0].canceled_quantity, 0);
    }

    #[test]
    fn limit_skips_later_cancellations() {
        let mut records = vec![
            purchase("17850", "85123A", 10, 0),
            cancellation("17850", "85123A", -2, 10),
            cancellation("17850", "85123A", -2, 20),
        ];
        let limited = MatchPolicy { limit: Some(1), ..MatchPolicy::default() };
        let outcome = reconcile(&mut records, &limited).unwrap();

        assert_eq!(outcome.classification.one_match, vec![1]);
        assert_eq!(outcome.classification.bucket_of(2), None);
        assert_eq!(records[0].canceled_quantity, 2);
    }

    #[test]
    fn buckets_partition_processed_cancellations() {
        let mut records = vec![
            purchase("17850", "85123A", 5, 0),
            purchase("17850", "85123A", 8, 10),
            purchase("13047", "22423", 10, 0),
            cancellation("17850", "85123A", -8, 30),
            cancellation("13047", "22423", -6, 30),
            cancellation("15100", "21730", -4, 30),
        ];
        let outcome = reconcile(&mut records, &policy()).unwrap();
        let c = &outcome.classification;

        assert_eq!(c.total(), 3);
        for id in [3, 4, 5] {
            assert!(c.bucket_of(id).is_some());
        }
        assert_eq!(c.no_match, vec![5]);
        assert_eq!(c.one_match, vec![4]);
        assert_eq!(c.mult_match, vec![3]);
    }

    #[test]
    fn overcancellation_scan_reports_every_offender() {
        let mut records = vec![
            purchase("17850", "85123A", 4, 0),
            purchase("13047", "22423", 3, 0),
            purchase("15100", "21730", 5, 0),
        ];
        records[0].canceled_quantity = 6;
        records[1].canceled_quantity = 9;

        let err = verify_no_overcancellation(&records, &policy()).unwrap_err();
        match err {
            ReconError::IntegrityViolation { offenders } => assert_eq!(offenders, vec![0, 1]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exempt_code_escapes_overcancellation_scan() {
        let mut records = vec![purchase("17850", "D", 1, 0)];
        records[0].canceled_quantity = 3;
        assert!(verify_no_overcancellation(&records, &policy()).is_ok());

        records[0].product_code = "85123A".into();
        assert!(verify_no_overcancellation(&records, &policy()).is_err());
    }
}
