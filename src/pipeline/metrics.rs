//! Per-ad aggregate metrics over cleaned events.

use crate::pipeline::records::{AdMetrics, CleanedEvent};
use std::collections::BTreeMap;

/// Decimal places kept for rate columns.
pub const RATE_PRECISION: i32 = 4;

/// Decimal places kept for value columns.
pub const VALUE_PRECISION: i32 = 2;

#[derive(Debug, Default)]
struct Totals {
    impressions: u64,
    clicks: u64,
    purchases: u64,
    purchase_value: f64,
}

/// Compute one metrics row per ad, ordered by ascending `ad_id`.
///
/// Conversion rate and average purchase value are per click and are zero for
/// ads without clicks.
pub fn compute_ad_metrics(events: &[CleanedEvent]) -> Vec<AdMetrics> {
    let mut by_ad: BTreeMap<u64, Totals> = BTreeMap::new();
    for event in events {
        let totals = by_ad.entry(event.ad_id).or_default();
        if event.impression_ts.is_some() {
            totals.impressions += 1;
        }
        totals.clicks += u64::from(event.click);
        totals.purchases += u64::from(event.purchase);
        totals.purchase_value += event.purchase_value.unwrap_or(0.0);
    }

    by_ad
        .into_iter()
        .map(|(ad_id, totals)| {
            let ctr = if totals.impressions > 0 {
                totals.clicks as f64 / totals.impressions as f64
            } else {
                0.0
            };
            let (conversion_rate, avg_purchase_value) = if totals.clicks > 0 {
                let clicks = totals.clicks as f64;
                (
                    totals.purchases as f64 / clicks,
                    totals.purchase_value / clicks,
                )
            } else {
                (0.0, 0.0)
            };

            AdMetrics {
                ad_id,
                impressions: totals.impressions,
                clicks: totals.clicks,
                purchases: totals.purchases,
                ctr: round_to(ctr, RATE_PRECISION),
                conversion_rate: round_to(conversion_rate, RATE_PRECISION),
                avg_purchase_value: round_to(avg_purchase_value, VALUE_PRECISION),
            }
        })
        .collect()
}

/// Round to `places` decimals, ties to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(ad_id: u64, clicked: bool, purchase: Option<f64>) -> CleanedEvent {
        let impression = Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).unwrap();
        CleanedEvent {
            user_id: "u".to_string(),
            ad_id,
            impression_ts: Some(impression),
            click_ts: clicked.then_some(impression),
            purchase_value: purchase,
            click: clicked,
            purchase: purchase.is_some(),
        }
    }

    #[test]
    fn test_metrics_per_ad() {
        let events = vec![
            row(2, true, Some(100.0)),
            row(2, true, None),
            row(2, false, None),
            row(1, true, Some(20.0)),
            row(1, true, Some(0.0)),
            row(1, false, None),
        ];

        let metrics = compute_ad_metrics(&events);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].ad_id, 1);
        assert_eq!(metrics[0].impressions, 3);
        assert_eq!(metrics[0].clicks, 2);
        assert_eq!(metrics[0].purchases, 2);
        assert_eq!(metrics[0].ctr, 0.6667);
        assert_eq!(metrics[0].conversion_rate, 1.0);
        assert_eq!(metrics[0].avg_purchase_value, 10.0);

        assert_eq!(metrics[1].ad_id, 2);
        assert_eq!(metrics[1].purchases, 1);
        assert_eq!(metrics[1].conversion_rate, 0.5);
        assert_eq!(metrics[1].avg_purchase_value, 50.0);
    }

    #[test]
    fn test_zero_clicks_yield_zero_rates() {
        let metrics = compute_ad_metrics(&[row(5, false, None), row(5, false, None)]);

        assert_eq!(metrics[0].ctr, 0.0);
        assert_eq!(metrics[0].conversion_rate, 0.0);
        assert_eq!(metrics[0].avg_purchase_value, 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.0 / 3.0, 4), 0.3333);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_ad_metrics(&[]).is_empty());
    }
}
