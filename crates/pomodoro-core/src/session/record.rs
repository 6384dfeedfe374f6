use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::PhaseKind;

/// Historical entry for one naturally completed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Assigned by the store on insert.
    #[serde(default)]
    pub id: Option<i64>,
    pub phase_kind: PhaseKind,
    pub duration_minutes: u32,
    pub completed_at_epoch_ms: i64,
    #[serde(default)]
    pub linked_task_id: Option<i64>,
}

impl SessionRecord {
    pub fn new(
        phase_kind: PhaseKind,
        duration_minutes: u32,
        completed_at_epoch_ms: i64,
        linked_task_id: Option<i64>,
    ) -> Self {
        Self {
            id: None,
            phase_kind,
            duration_minutes,
            completed_at_epoch_ms,
            linked_task_id,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.completed_at_epoch_ms).single()
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}
