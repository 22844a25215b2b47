//! Display model for the last known usage status.
//!
//! Pure functions over [`StatusSnapshot`]; rendering (terminal UI, plain
//! text) lives in the binary crate.

use chrono::{DateTime, Local, Utc};

use crate::state::{ScrapeStatus, StatusSnapshot};

/// Severity tier for a usage percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// No data yet
    Unknown,
    /// Below 50%
    Nominal,
    /// 50% to 79%
    Warning,
    /// 80% and above
    Critical,
}

impl Tier {
    pub fn for_percent(percent: u8) -> Self {
        match percent {
            0..=49 => Tier::Nominal,
            50..=79 => Tier::Warning,
            _ => Tier::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Unknown => "unknown",
            Tier::Nominal => "nominal",
            Tier::Warning => "warning",
            Tier::Critical => "critical",
        }
    }
}

/// Compact always-visible indicator (the badge)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    /// "17%" or "?" before the first successful cycle
    pub text: String,
    /// Tier of the session percentage
    pub tier: Tier,
    /// Last cycle failed; `text` still shows the last known value
    pub errored: bool,
}

impl Indicator {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        let errored = snapshot.status == ScrapeStatus::Error;
        match snapshot.last_record {
            Some(ref record) => Self {
                text: format!("{}%", record.session),
                tier: Tier::for_percent(record.session),
                errored,
            },
            None => Self {
                text: "?".to_string(),
                tier: Tier::Unknown,
                errored,
            },
        }
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.text, self.tier.label())?;
        if self.errored {
            write!(f, " [error]")?;
        }
        Ok(())
    }
}

/// Detail view shown by the popup and the `status` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    /// "Active", "Error" or "Waiting"
    pub status_label: &'static str,
    pub session_percent: Option<u8>,
    pub weekly_percent: Option<u8>,
    pub session_reset: Option<String>,
    pub weekly_reset: Option<String>,
    /// Recency of the last successful capture
    pub last_update: Option<String>,
    pub last_error: Option<String>,
}

impl DetailView {
    pub fn from_snapshot(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Self {
        let status_label = match snapshot.status {
            ScrapeStatus::Success => "Active",
            ScrapeStatus::Error => "Error",
            ScrapeStatus::Initialized => "Waiting",
        };
        let record = snapshot.last_record.as_ref();

        Self {
            status_label,
            session_percent: record.map(|r| r.session),
            weekly_percent: record.map(|r| r.weekly),
            session_reset: record.and_then(|r| r.session_reset_time.clone()),
            weekly_reset: record.and_then(|r| r.weekly_reset_time.clone()),
            last_update: snapshot.last_scrape.map(|at| recency(at, now)),
            last_error: snapshot.last_error.clone(),
        }
    }

    /// Percent as "17%" or "--" when unknown
    pub fn percent_text(percent: Option<u8>) -> String {
        percent
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "--".to_string())
    }

    /// Plain-text rendering for terminals without the popup
    pub fn render_text(&self) -> String {
        let mut out = format!("Status:      {}\n", self.status_label);
        for (label, percent, reset) in [
            ("Session", self.session_percent, &self.session_reset),
            ("Weekly", self.weekly_percent, &self.weekly_reset),
        ] {
            let bar = percent
                .map(|p| progress_bar(p, 10))
                .unwrap_or_else(|| DetailView::percent_text(None));
            out.push_str(&format!("{:<12} {}", format!("{}:", label), bar));
            if let Some(reset) = reset {
                out.push_str(&format!("  resets {}", reset));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "Last update: {}\n",
            self.last_update.as_deref().unwrap_or("never")
        ));
        if let Some(ref err) = self.last_error {
            out.push_str(&format!("Last error:  {}\n", err));
        }
        out
    }
}

/// How long ago `at` was, relative to `now`.
///
/// "Just now" under a minute, "{n}m ago" under an hour, otherwise the local
/// clock time of the capture.
pub fn recency(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else {
        at.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

/// Battery-style bar: `[17% =---------]`
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = if percent >= 100 {
        width
    } else {
        width * percent as usize / 100
    };
    let empty = width - filled;
    format!("[{}% {}{}]", percent, "=".repeat(filled), "-".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageRecord;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn snapshot(status: ScrapeStatus, session: Option<u8>) -> StatusSnapshot {
        StatusSnapshot {
            last_scrape: session.map(|_| Utc::now()),
            last_record: session.map(|session| UsageRecord {
                session,
                weekly: 42,
                session_reset_time: Some("3시간 50분 후".to_string()),
                weekly_reset_time: None,
                timestamp: Utc::now(),
            }),
            status,
            last_error: (status == ScrapeStatus::Error).then(|| "missing usage data".to_string()),
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_percent(0), Tier::Nominal);
        assert_eq!(Tier::for_percent(49), Tier::Nominal);
        assert_eq!(Tier::for_percent(50), Tier::Warning);
        assert_eq!(Tier::for_percent(79), Tier::Warning);
        assert_eq!(Tier::for_percent(80), Tier::Critical);
        assert_eq!(Tier::for_percent(100), Tier::Critical);
    }

    #[test]
    fn test_indicator_unknown_before_first_success() {
        let indicator = Indicator::from_snapshot(&StatusSnapshot::default());
        assert_eq!(indicator.text, "?");
        assert_eq!(indicator.tier, Tier::Unknown);
        assert!(!indicator.errored);
    }

    #[test]
    fn test_indicator_error_keeps_values() {
        let indicator = Indicator::from_snapshot(&snapshot(ScrapeStatus::Error, Some(85)));
        assert_eq!(indicator.text, "85%");
        assert_eq!(indicator.tier, Tier::Critical);
        assert!(indicator.errored);
        assert_eq!(indicator.to_string(), "85% (critical) [error]");
    }

    #[test]
    fn test_detail_view() {
        let view = DetailView::from_snapshot(&snapshot(ScrapeStatus::Success, Some(17)), Utc::now());
        assert_eq!(view.status_label, "Active");
        assert_eq!(view.session_percent, Some(17));
        assert_eq!(view.weekly_percent, Some(42));
        assert_eq!(view.session_reset.as_deref(), Some("3시간 50분 후"));
        assert_eq!(view.last_update.as_deref(), Some("Just now"));

        let text = view.render_text();
        assert!(text.contains("Session:     [17% =---------]  resets 3시간 50분 후"));
        assert!(text.contains("Weekly:      [42% ====------]\n"));
    }

    #[test]
    fn test_detail_view_waiting() {
        let view = DetailView::from_snapshot(&StatusSnapshot::default(), Utc::now());
        assert_eq!(view.status_label, "Waiting");
        assert_eq!(DetailView::percent_text(view.session_percent), "--");
        assert!(view.render_text().contains("Last update: never"));
    }

    #[test]
    fn test_recency() {
        let now = Utc::now();
        assert_eq!(recency(now - Duration::seconds(30), now), "Just now");
        assert_eq!(recency(now + Duration::seconds(30), now), "Just now");
        assert_eq!(recency(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(recency(now - Duration::minutes(59), now), "59m ago");

        let old = recency(now - Duration::minutes(120), now);
        assert!(!old.ends_with("ago"));
        assert_eq!(old.matches(':').count(), 2);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 10), "[0% ----------]");
        assert_eq!(progress_bar(17, 10), "[17% =---------]");
        assert_eq!(progress_bar(100, 10), "[100% ==========]");
    }
}
