use serde::{Deserialize, Serialize};

use super::phase::PhaseKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Runtime state of the current phase. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: PhaseKind,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub status: TimerStatus,
}

impl TimerState {
    /// A fresh idle phase with the full duration remaining.
    pub fn idle(phase: PhaseKind, total_secs: u64) -> Self {
        Self {
            phase,
            remaining_secs: total_secs,
            total_secs,
            status: TimerStatus::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Fraction of the phase still remaining, 0.0 ..= 1.0.
    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        (self.remaining_secs as f64 / self.total_secs as f64).clamp(0.0, 1.0)
    }

    /// Remaining time as `mm:ss`, or `h:mm:ss` from one hour up.
    pub fn display(&self) -> String {
        format_clock(self.remaining_secs)
    }
}

pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
