//! Usage record extracted from the dashboard's rendered text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage figures captured in one extraction cycle.
///
/// Only produced when both percentages were found; a page with a missing
/// figure is an extraction failure, never a partial record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Percent consumed in the current session window (0-100)
    pub session: u8,
    /// Percent consumed in the current weekly window (0-100)
    pub weekly: u8,
    /// Label of when the session window resets (e.g. "3시간 50분 후")
    pub session_reset_time: Option<String>,
    /// Label of when the weekly window resets (e.g. "(화) 오전 10:59에")
    pub weekly_reset_time: Option<String>,
    /// When the page text was parsed
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_json_keys() {
        let record = UsageRecord {
            session: 17,
            weekly: 42,
            session_reset_time: Some("3시간 50분 후".to_string()),
            weekly_reset_time: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 3, 1, 2, 3).unwrap(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["session"], 17);
        assert_eq!(value["weekly"], 42);
        assert_eq!(value["sessionResetTime"], "3시간 50분 후");
        assert!(value["weeklyResetTime"].is_null());
        assert_eq!(value["timestamp"], "2026-03-03T01:02:03Z");
    }
}
