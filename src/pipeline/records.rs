//! Tabular record types exchanged by the batch stages.
//!
//! Null cells are empty strings in CSV. Timestamps are written as
//! `YYYY-MM-DD HH:MM:SS` (UTC) and read in that form or as RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used when writing tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A raw ad event as delivered by upstream logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdEvent {
    pub user_id: String,
    pub ad_id: u64,
    #[serde(with = "optional_timestamp")]
    pub impression_ts: Option<DateTime<Utc>>,
    #[serde(with = "optional_timestamp")]
    pub click_ts: Option<DateTime<Utc>>,
    /// May be negative in raw data
    pub purchase_value: Option<f64>,
}

/// An ad event that passed cleaning, with derived indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedEvent {
    pub user_id: String,
    pub ad_id: u64,
    #[serde(with = "optional_timestamp")]
    pub impression_ts: Option<DateTime<Utc>>,
    #[serde(with = "optional_timestamp")]
    pub click_ts: Option<DateTime<Utc>>,
    pub purchase_value: Option<f64>,
    #[serde(with = "indicator")]
    pub click: bool,
    #[serde(with = "indicator")]
    pub purchase: bool,
}

impl CleanedEvent {
    /// Derive indicators from a raw event's fields.
    pub fn from_event(event: AdEvent) -> Self {
        let click = event.click_ts.is_some();
        let purchase = event.purchase_value.is_some();
        Self {
            user_id: event.user_id,
            ad_id: event.ad_id,
            impression_ts: event.impression_ts,
            click_ts: event.click_ts,
            purchase_value: event.purchase_value,
            click,
            purchase,
        }
    }
}

/// Aggregated metrics for one ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetrics {
    pub ad_id: u64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: u64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub avg_purchase_value: f64,
}

/// A keyed event for replay through a sliding-window store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedEvent {
    #[serde(alias = "key")]
    pub user_id: String,
    #[serde(with = "required_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Parse a timestamp cell.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .map(|naive| naive.and_utc()),
    }
}

mod required_timestamp {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(|e| serde::de::Error::custom(format!("{raw:?}: {e}")))
    }
}

mod optional_timestamp {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_timestamp(raw)
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("{raw:?}: {e}"))),
        }
    }
}

/// 0/1 columns for boolean indicators.
mod indicator {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "1" | "true" | "True" => Ok(true),
            "0" | "false" | "False" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 0 or 1, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 12, 1, 8, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2025-12-01 08:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-12-01T08:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-12-01T08:30:00Z").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2025-12-01T10:30:00+02:00").unwrap(),
            expected
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_indicators_follow_presence() {
        let cleaned = CleanedEvent::from_event(AdEvent {
            user_id: "7".to_string(),
            ad_id: 1,
            impression_ts: Some(Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).unwrap()),
            click_ts: Some(Utc.with_ymd_and_hms(2025, 12, 1, 8, 5, 0).unwrap()),
            purchase_value: Some(0.0),
        });

        assert!(cleaned.click);
        // A zero-value purchase is still a purchase.
        assert!(cleaned.purchase);
    }
}
