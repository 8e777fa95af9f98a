use crate::model::{Classification, ReconSummary};

/// Bucket counts for a finished pass.
pub fn summarize(classification: &Classification) -> ReconSummary {
    ReconSummary {
        total_cancellations: classification.total(),
        no_match: classification.no_match.len(),
        one_match: classification.one_match.len(),
        mult_match: classification.mult_match.len(),
    }
}

/// Human-readable run summary: total plus count and percentage per bucket.
/// Observational only; the programmatic contract is the classification.
pub fn render_report(summary: &ReconSummary) -> String {
    let pct = |count: usize| {
        if summary.total_cancellations == 0 {
            0.0
        } else {
            count as f64 / summary.total_cancellations as f64 * 100.0
        }
    };

    format!(
        "cancellation reconciliation: {} processed\n  no match:    {} ({:.1}%)\n  one match:   {} ({:.1}%)\n  multi match: {} ({:.1}%)\n",
        summary.total_cancellations,
        summary.no_match,
        pct(summary.no_match),
        summary.one_match,
        pct(summary.one_match),
        summary.mult_match,
        pct(summary.mult_match),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchBucket;

    #[test]
    fn summary_counts() {
        let mut c = Classification::default();
        c.push(MatchBucket::NoMatch, 0);
        c.push(MatchBucket::OneMatch, 1);
        c.push(MatchBucket::OneMatch, 2);
        c.push(MatchBucket::MultMatch, 3);

        let summary = summarize(&c);
        assert_eq!(summary.total_cancellations, 4);
        assert_eq!(summary.no_match, 1);
        assert_eq!(summary.one_match, 2);
        assert_eq!(summary.mult_match, 1);
    }

    #[test]
    fn report_percentages() {
        let mut c = Classification::default();
        c.push(MatchBucket::NoMatch, 0);
        c.push(MatchBucket::OneMatch, 1);
        c.push(MatchBucket::OneMatch, 2);
        c.push(MatchBucket::MultMatch, 3);

        let report = render_report(&summarize(&c));
        assert!(report.contains("4 processed"));
        assert!(report.contains("no match:    1 (25.0%)"));
        assert!(report.contains("one match:   2 (50.0%)"));
        assert!(report.contains("multi match: 1 (25.0%)"));
    }

    #[test]
    fn empty_report_has_no_nan() {
        let report = render_report(&summarize(&Classification::default()));
        assert!(report.contains("0 processed"));
        assert!(!report.contains("NaN"));
    }
}
