//! Sync window resolution: the inclusive [from, to] date range a job run
//! fetches data for.

use crate::error::SyncError;
use chrono::{Duration, NaiveDate, Utc};

/// Inclusive date window. `start == None` means all-time (no lower bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    /// Yesterday only (UTC). The daily spend/order sync window.
    pub fn yesterday() -> Self {
        let y = Utc::now().date_naive() - Duration::days(1);
        Self::new(y, y)
    }

    /// Trailing `days` calendar days ending today (UTC).
    pub fn trailing_days(days: i64) -> Self {
        let today = Utc::now().date_naive();
        Self::new(today - Duration::days(days), today)
    }

    /// No lower bound; used by the monthly all-time product sync.
    pub fn all_time() -> Self {
        Self {
            start: None,
            end: Utc::now().date_naive(),
        }
    }

    /// Parse and validate an explicit backfill range. Rejects malformed
    /// dates and inverted ranges before any vendor call is made.
    pub fn backfill(start_date: &str, end_date: &str) -> Result<Self, SyncError> {
        let start = parse_iso_date(start_date)?;
        let end = parse_iso_date(end_date)?;
        if start > end {
            return Err(SyncError::InvalidDateRange(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        Ok(Self::new(start, end))
    }

    /// Iterate every calendar day in the window, oldest first. All-time
    /// windows cannot be day-iterated.
    pub fn days(&self) -> Vec<NaiveDate> {
        let Some(start) = self.start else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut d = start;
        while d <= self.end {
            out.push(d);
            d += Duration::days(1);
        }
        out
    }
}

fn parse_iso_date(s: &str) -> Result<NaiveDate, SyncError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| SyncError::InvalidDateRange(format!("`{s}` is not a valid YYYY-MM-DD date")))
}

/// Dashboard-facing named ranges: N days back from today, start of day.
pub fn resolve_named_range(name: &str) -> Result<DateWindow, SyncError> {
    let days = match name {
        "last7days" => 7,
        "last30days" => 30,
        "last90days" => 90,
        other => {
            return Err(SyncError::InvalidDateRange(format!(
                "unknown range `{other}` (expected last7days, last30days or last90days)"
            )));
        }
    };
    Ok(DateWindow::trailing_days(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfill_accepts_ordered_range() {
        let w = DateWindow::backfill("2025-01-01", "2025-02-01").unwrap();
        assert_eq!(w.start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[test]
    fn backfill_rejects_inverted_range() {
        let err = DateWindow::backfill("2025-02-01", "2025-01-01").unwrap_err();
        assert!(matches!(err, SyncError::InvalidDateRange(_)));
    }

    #[test]
    fn backfill_rejects_malformed_date() {
        let err = DateWindow::backfill("2025-13-41", "2025-01-01").unwrap_err();
        assert!(matches!(err, SyncError::InvalidDateRange(_)));
        let err = DateWindow::backfill("not-a-date", "2025-01-01").unwrap_err();
        assert!(matches!(err, SyncError::InvalidDateRange(_)));
    }

    #[test]
    fn days_are_inclusive_of_both_endpoints() {
        let w = DateWindow::backfill("2024-11-01", "2024-11-03").unwrap();
        let days = w.days();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
    }

    #[test]
    fn all_time_has_no_day_iteration() {
        assert!(DateWindow::all_time().days().is_empty());
        assert!(DateWindow::all_time().start.is_none());
    }

    #[test]
    fn named_ranges_resolve() {
        assert!(resolve_named_range("last7days").is_ok());
        assert!(resolve_named_range("last30days").is_ok());
        assert!(resolve_named_range("last90days").is_ok());
        assert!(resolve_named_range("lastweek").is_err());
    }
}
