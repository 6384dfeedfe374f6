//! Turns phase completions into session records.
//!
//! The recorder never touches storage itself. Records are pushed onto an
//! unbounded queue drained by [`RecordWriter`](super::RecordWriter), so a
//! slow or failing store cannot stall the timer.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::record::SessionRecord;
use crate::timer::PhaseKind;

pub type RecordSender = mpsc::UnboundedSender<SessionRecord>;
pub type RecordReceiver = mpsc::UnboundedReceiver<SessionRecord>;

#[derive(Debug)]
pub struct SessionRecorder {
    sink: Option<RecordSender>,
    /// Consecutive Work completions since the last long break.
    streak: u32,
}

impl SessionRecorder {
    pub fn new(sink: RecordSender) -> Self {
        Self {
            sink: Some(sink),
            streak: 0,
        }
    }

    /// Recorder plus the receiving end of its queue.
    pub fn channel() -> (Self, RecordReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Build and hand off the record for a completed phase.
    ///
    /// Work completions bump the streak before returning, so the engine sees
    /// the updated count when it picks the next phase.
    pub fn on_phase_completed(
        &mut self,
        kind: PhaseKind,
        duration_minutes: u32,
        linked_task_id: Option<i64>,
    ) -> SessionRecord {
        let record = SessionRecord::new(
            kind,
            duration_minutes,
            Utc::now().timestamp_millis(),
            linked_task_id,
        );

        if kind == PhaseKind::Work {
            self.streak = self.streak.saturating_add(1);
        }

        match &self.sink {
            Some(sink) => {
                if sink.send(record.clone()).is_err() {
                    warn!(phase = kind.as_str(), "record writer closed; session record dropped");
                } else {
                    debug!(phase = kind.as_str(), duration_minutes, "session record queued");
                }
            }
            None => warn!(phase = kind.as_str(), "recorder detached; session record dropped"),
        }

        record
    }

    pub fn current_streak(&self) -> u32 {
        self.streak
    }

    pub fn reset_streak(&mut self) {
        self.streak = 0;
    }

    /// Drop the queue sender so the writer can drain and finish.
    pub fn close(&mut self) {
        self.sink = None;
    }

    pub fn is_closed(&self) -> bool {
        self.sink.as_ref().map_or(true, |s| s.is_closed())
    }
}
