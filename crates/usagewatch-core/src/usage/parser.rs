//! Parse the usage dashboard's visible page text.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::types::UsageRecord;
use crate::error::ExtractionError;

/// Anchor line that opens the session block
pub const SESSION_ANCHOR: &str = "Current session";

/// Anchor line that opens the weekly block
pub const WEEKLY_ANCHOR: &str = "All models";

/// Number of lines after an anchor that are searched for data
pub const LOOKAHEAD_LINES: usize = 5;

/// "<label> 재설정": captures everything before the marker
static RESET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+)\s*재설정").expect("Invalid RESET_PATTERN regex"));

/// "<N>% 사용": matches "17% 사용됨" and "17%사용"
static USAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)%\s*사용").expect("Invalid USAGE_PATTERN regex"));

/// Fields collected for one anchored block
#[derive(Debug, Default)]
struct BlockScan {
    percent: Option<u8>,
    reset_label: Option<String>,
}

impl BlockScan {
    /// Scan a lookahead window, keeping the first match of each pattern.
    ///
    /// Fields set by an earlier window are left untouched.
    fn scan(&mut self, window: &[&str], block: &str) {
        for line in window {
            if self.reset_label.is_none() {
                if let Some(label) = extract_reset_label(line) {
                    debug!("Found {} reset time: {}", block, label);
                    self.reset_label = Some(label);
                }
            }
            if self.percent.is_none() {
                if let Some(percent) = extract_percent(line) {
                    debug!("Found {} usage: {}%", block, percent);
                    self.percent = Some(percent);
                }
            }
        }
    }
}

/// Extract a usage record from page text, stamped with the current time.
///
/// Expected format:
/// ```text
/// Current session
/// 3시간 50분 후 재설정
/// 17% 사용됨
///
/// All models
/// (화) 오전 10:59에 재설정
/// 42% 사용됨
/// ```
pub fn extract_usage(text: &str) -> Result<UsageRecord, ExtractionError> {
    extract_usage_at(text, Utc::now())
}

/// Extract a usage record from page text, stamped with `captured_at`.
pub fn extract_usage_at(
    text: &str,
    captured_at: DateTime<Utc>,
) -> Result<UsageRecord, ExtractionError> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut session = BlockScan::default();
    let mut weekly = BlockScan::default();

    for (i, line) in lines.iter().enumerate() {
        let block = match *line {
            SESSION_ANCHOR => &mut session,
            WEEKLY_ANCHOR => &mut weekly,
            _ => continue,
        };
        let start = i + 1;
        let end = (start + LOOKAHEAD_LINES).min(lines.len());
        block.scan(&lines[start..end], line);
    }

    match (session.percent, weekly.percent) {
        (Some(session_percent), Some(weekly_percent)) => Ok(UsageRecord {
            session: session_percent,
            weekly: weekly_percent,
            session_reset_time: session.reset_label,
            weekly_reset_time: weekly.reset_label,
            timestamp: captured_at,
        }),
        _ => Err(ExtractionError::MissingUsageData),
    }
}

/// Extract the reset label from a line containing "<label> 재설정"
fn extract_reset_label(line: &str) -> Option<String> {
    let caps = RESET_PATTERN.captures(line)?;
    let label = caps.get(1)?.as_str().trim();
    if label.is_empty() {
        return None;
    }
    Some(label.to_string())
}

/// Extract percentage from a line containing "N% 사용"
fn extract_percent(line: &str) -> Option<u8> {
    let caps = USAGE_PATTERN.captures(line)?;
    let percent = caps.get(1)?.as_str().parse::<u8>().ok()?;
    (percent <= 100).then_some(percent)
}
