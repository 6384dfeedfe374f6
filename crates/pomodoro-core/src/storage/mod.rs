mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{Config, SettingsStore, TomlSettingsStore};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::StorageError;
use crate::session::SessionRecord;
use crate::stats::DailySummary;
use crate::timer::PhaseKind;

/// Durable home for completed session records.
///
/// Implementations are called from the blocking pool by the record writer
/// and directly by stats queries, so they must be shareable across threads.
pub trait RecordStore: Send + Sync {
    /// Persist a record, returning its new id.
    fn insert(&self, record: &SessionRecord) -> Result<i64, StorageError>;

    /// Records completed within `[start_ms, end_ms]`, oldest first,
    /// optionally restricted to one kind.
    fn query_range(
        &self,
        start_ms: i64,
        end_ms: i64,
        kind: Option<PhaseKind>,
    ) -> Result<Vec<SessionRecord>, StorageError>;

    /// Summed minutes of `kind` records completed at or after `since_ms`.
    fn sum_duration(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError>;

    /// Number of `kind` records completed at or after `since_ms`.
    fn count_since(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError>;

    /// Count and minutes of Work records since `day_start_ms`.
    fn work_summary_since(&self, day_start_ms: i64) -> Result<DailySummary, StorageError> {
        Ok(DailySummary {
            day_start_ms,
            work_sessions: self.count_since(PhaseKind::Work, day_start_ms)?,
            work_minutes: self.sum_duration(PhaseKind::Work, day_start_ms)?,
        })
    }
}

/// Returns `~/.config/pomodoro[-dev]/` based on POMODORO_ENV.
///
/// Set POMODORO_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMODORO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomodoro-dev")
    } else {
        base_dir.join("pomodoro")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
