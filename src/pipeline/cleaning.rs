//! Batch cleaning of raw ad events.
//!
//! Rules are applied in a fixed order, and the order is observable: duplicates
//! are dropped before anything else, so a duplicate of a row that is later
//! filtered out still disappears.

use crate::pipeline::records::{AdEvent, CleanedEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Rows removed by each cleaning rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub duplicates: usize,
    pub click_before_impression: usize,
    pub negative_purchase_clamped: usize,
    pub missing_impression: usize,
    pub purchase_without_click: usize,
    pub invalid_ad_id: usize,
    pub output_rows: usize,
}

impl CleaningReport {
    /// Total rows dropped across all rules.
    pub fn dropped(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Clean raw ad events.
///
/// Steps:
/// 1. Drop duplicate `(user_id, ad_id, impression_ts)` rows, keeping the first
/// 2. Drop rows whose click precedes the impression
/// 3. Clamp negative purchase values to zero
/// 4. Drop rows without an impression timestamp
/// 5. Drop rows with a purchase value but no click
/// 6. Drop rows whose `ad_id` is not in `valid_ad_ids`
/// 7. Derive `click` and `purchase` indicators
pub fn clean_ad_events(
    events: Vec<AdEvent>,
    valid_ad_ids: &HashSet<u64>,
) -> (Vec<CleanedEvent>, CleaningReport) {
    let mut report = CleaningReport {
        input_rows: events.len(),
        ..CleaningReport::default()
    };

    let mut seen: HashSet<(String, u64, Option<DateTime<Utc>>)> = HashSet::new();
    let mut rows: Vec<AdEvent> = Vec::with_capacity(events.len());
    for event in events {
        if seen.insert((event.user_id.clone(), event.ad_id, event.impression_ts)) {
            rows.push(event);
        } else {
            report.duplicates += 1;
        }
    }

    rows.retain(|event| {
        let bad = matches!(
            (event.impression_ts, event.click_ts),
            (Some(impression), Some(click)) if click < impression
        );
        if bad {
            report.click_before_impression += 1;
        }
        !bad
    });

    for event in rows.iter_mut() {
        if let Some(value) = event.purchase_value.as_mut() {
            if *value < 0.0 {
                *value = 0.0;
                report.negative_purchase_clamped += 1;
            }
        }
    }

    rows.retain(|event| {
        let keep = event.impression_ts.is_some();
        if !keep {
            report.missing_impression += 1;
        }
        keep
    });

    rows.retain(|event| {
        let bad = event.purchase_value.is_some() && event.click_ts.is_none();
        if bad {
            report.purchase_without_click += 1;
        }
        !bad
    });

    rows.retain(|event| {
        let keep = valid_ad_ids.contains(&event.ad_id);
        if !keep {
            report.invalid_ad_id += 1;
        }
        keep
    });

    let cleaned: Vec<CleanedEvent> = rows.into_iter().map(CleanedEvent::from_event).collect();
    report.output_rows = cleaned.len();

    tracing::info!(
        input = report.input_rows,
        output = report.output_rows,
        duplicates = report.duplicates,
        invalid_ad_id = report.invalid_ad_id,
        "Cleaned ad events"
    );

    (cleaned, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).unwrap()
    }

    fn event(user: &str, ad_id: u64, impression_min: Option<i64>) -> AdEvent {
        AdEvent {
            user_id: user.to_string(),
            ad_id,
            impression_ts: impression_min.map(|m| base() + Duration::minutes(m)),
            click_ts: None,
            purchase_value: None,
        }
    }

    fn valid() -> HashSet<u64> {
        [1, 2, 3].into_iter().collect()
    }

    #[test]
    fn test_drops_duplicates_keeping_first() {
        let mut first = event("u1", 1, Some(0));
        first.click_ts = Some(base() + Duration::minutes(1));
        let second = event("u1", 1, Some(0));

        let (cleaned, report) = clean_ad_events(vec![first, second], &valid());

        assert_eq!(cleaned.len(), 1);
        assert!(cleaned[0].click);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_drops_click_before_impression() {
        let mut early = event("u1", 1, Some(10));
        early.click_ts = Some(base());
        let mut same = event("u2", 1, Some(10));
        same.click_ts = Some(base() + Duration::minutes(10));

        let (cleaned, report) = clean_ad_events(vec![early, same], &valid());

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].user_id, "u2");
        assert_eq!(report.click_before_impression, 1);
    }

    #[test]
    fn test_clamps_negative_purchase() {
        let mut row = event("u1", 1, Some(0));
        row.click_ts = Some(base() + Duration::minutes(2));
        row.purchase_value = Some(-10.0);

        let (cleaned, report) = clean_ad_events(vec![row], &valid());

        assert_eq!(cleaned[0].purchase_value, Some(0.0));
        assert!(cleaned[0].purchase);
        assert_eq!(report.negative_purchase_clamped, 1);
    }

    #[test]
    fn test_drops_missing_impression() {
        let (cleaned, report) =
            clean_ad_events(vec![event("u1", 1, None), event("u2", 1, Some(0))], &valid());

        assert_eq!(cleaned.len(), 1);
        assert_eq!(report.missing_impression, 1);
    }

    #[test]
    fn test_missing_impressions_dedupe_together() {
        let (_, report) =
            clean_ad_events(vec![event("u1", 1, None), event("u1", 1, None)], &valid());

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.missing_impression, 1);
        assert_eq!(report.output_rows, 0);
    }

    #[test]
    fn test_drops_purchase_without_click() {
        let mut row = event("u1", 1, Some(0));
        row.purchase_value = Some(50.0);

        let (cleaned, report) = clean_ad_events(vec![row], &valid());

        assert!(cleaned.is_empty());
        assert_eq!(report.purchase_without_click, 1);
    }

    #[test]
    fn test_drops_unknown_ad_ids() {
        let (cleaned, report) =
            clean_ad_events(vec![event("u1", 999, Some(0)), event("u1", 2, Some(0))], &valid());

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].ad_id, 2);
        assert_eq!(report.invalid_ad_id, 1);
        assert_eq!(report.dropped(), 1);
    }

    #[test]
    fn test_indicators_without_click() {
        let (cleaned, _) = clean_ad_events(vec![event("u1", 3, Some(0))], &valid());

        assert!(!cleaned[0].click);
        assert!(!cleaned[0].purchase);
    }
}
