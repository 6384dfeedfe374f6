use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::RecordStore;
use crate::error::StorageError;
use crate::session::SessionRecord;
use crate::timer::PhaseKind;

/// In-process record store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SessionRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail, to exercise error paths.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SessionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn matching(&self, kind: PhaseKind, since_ms: i64) -> impl Iterator<Item = SessionRecord> {
        self.records()
            .into_iter()
            .filter(move |r| r.phase_kind == kind && r.completed_at_epoch_ms >= since_ms)
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: &SessionRecord) -> Result<i64, StorageError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed("insert rejected by memory store".into()));
        }
        let mut records = self.lock();
        let id = records.len() as i64 + 1;
        records.push(record.clone().with_id(id));
        Ok(id)
    }

    fn query_range(
        &self,
        start_ms: i64,
        end_ms: i64,
        kind: Option<PhaseKind>,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let mut out: Vec<_> = self
            .records()
            .into_iter()
            .filter(|r| r.completed_at_epoch_ms >= start_ms && r.completed_at_epoch_ms <= end_ms)
            .filter(|r| kind.map_or(true, |k| r.phase_kind == k))
            .collect();
        out.sort_by_key(|r| r.completed_at_epoch_ms);
        Ok(out)
    }

    fn sum_duration(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError> {
        Ok(self
            .matching(kind, since_ms)
            .map(|r| u64::from(r.duration_minutes))
            .sum())
    }

    fn count_since(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError> {
        Ok(self.matching(kind, since_ms).count() as u64)
    }
}
