use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{PhaseKind, Settings, TimerStatus};

/// Every state change of the engine produces an Event.
/// The CLI prints them; the service broadcasts them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: PhaseKind,
        remaining_secs: u64,
        /// True when continuing a paused phase.
        resumed: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: PhaseKind,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: PhaseKind,
        total_secs: u64,
        at: DateTime<Utc>,
    },
    /// Phase abandoned by the user; nothing was recorded.
    PhaseSkipped {
        from: PhaseKind,
        to: PhaseKind,
        at: DateTime<Utc>,
    },
    /// Phase ran down to zero and was recorded.
    PhaseCompleted {
        phase: PhaseKind,
        duration_minutes: u32,
        next: PhaseKind,
        streak: u32,
        linked_task_id: Option<i64>,
        at: DateTime<Utc>,
    },
    PhaseSelected {
        phase: PhaseKind,
        total_secs: u64,
        at: DateTime<Utc>,
    },
    SettingsApplied {
        settings: Settings,
        status: TimerStatus,
        at: DateTime<Utc>,
    },
    LinkedTaskChanged {
        linked_task_id: Option<i64>,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::PhaseSkipped {
            from: PhaseKind::Work,
            to: PhaseKind::ShortBreak,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase_skipped");
        assert_eq!(json["from"], "work");
        assert_eq!(json["to"], "short_break");
    }
}
