//! Same-day aggregates over recorded sessions.

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DailySummary {
    /// Start of the counted window, epoch milliseconds.
    pub day_start_ms: i64,
    pub work_sessions: u64,
    pub work_minutes: u64,
}

/// Epoch milliseconds of the most recent local midnight before `now`.
///
/// On days where midnight does not exist locally (DST jumps) 01:00 local is
/// used instead, and `now` itself if that is missing too.
pub fn local_day_start<Tz: TimeZone>(now: DateTime<Tz>) -> i64 {
    let date = now.with_timezone(&Local).date_naive();
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.timestamp_millis(),
        // Midnight skipped by a DST change: fall back to one hour later.
        None => Local
            .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| now.timestamp_millis()),
    }
}
