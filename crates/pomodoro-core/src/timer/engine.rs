//! Timer engine implementation.
//!
//! The engine is a deterministic state machine. It does not own a clock or
//! a thread: each call to `tick()` accounts for exactly one elapsed second.
//! [`TimerService`](super::TimerService) drives it from a cancellable
//! one-second ticker.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> (completion) -> Idle (next phase)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (recorder, records) = SessionRecorder::channel();
//! let mut engine = TimerEngine::new(Settings::default(), recorder)?;
//! engine.start();
//! // Once per second:
//! engine.tick(); // Returns Some(Event::PhaseCompleted) when the phase ends
//! ```

use chrono::Utc;
use tracing::{debug, info};

use super::phase::{PhaseKind, Settings};
use super::state::{TimerState, TimerStatus};
use crate::error::{ConfigError, EngineError};
use crate::events::Event;
use crate::session::SessionRecorder;

#[derive(Debug)]
pub struct TimerEngine {
    settings: Settings,
    state: TimerState,
    recorder: SessionRecorder,
    /// Task reference copied into every record produced while set.
    linked_task_id: Option<i64>,
}

impl TimerEngine {
    /// Create an engine in the idle Work phase.
    ///
    /// # Errors
    /// Returns a `ConfigError` if any duration in `settings` is zero.
    pub fn new(settings: Settings, recorder: SessionRecorder) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            state: TimerState::idle(PhaseKind::Work, settings.seconds_for(PhaseKind::Work)),
            settings,
            recorder,
            linked_task_id: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> PhaseKind {
        self.state.phase
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn streak(&self) -> u32 {
        self.recorder.current_streak()
    }

    pub fn linked_task_id(&self) -> Option<i64> {
        self.linked_task_id
    }

    pub fn recorder_mut(&mut self) -> &mut SessionRecorder {
        &mut self.recorder
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown. Returns `None` if already running.
    pub fn start(&mut self) -> Option<Event> {
        let resumed = match self.state.status {
            TimerStatus::Running => return None,
            TimerStatus::Paused => true,
            TimerStatus::Idle => false,
        };
        self.state.status = TimerStatus::Running;
        debug!(
            phase = self.state.phase.as_str(),
            remaining = self.state.remaining_secs,
            resumed,
            "timer started"
        );
        Some(Event::TimerStarted {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            resumed,
            at: Utc::now(),
        })
    }

    /// Freeze the countdown. Returns `None` unless running.
    pub fn pause(&mut self) -> Option<Event> {
        if self.state.status != TimerStatus::Running {
            return None;
        }
        self.state.status = TimerStatus::Paused;
        Some(Event::TimerPaused {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Refill the current phase from the current settings and go idle.
    pub fn reset(&mut self) -> Event {
        let phase = self.state.phase;
        self.state = TimerState::idle(phase, self.settings.seconds_for(phase));
        Event::TimerReset {
            phase,
            total_secs: self.state.total_secs,
            at: Utc::now(),
        }
    }

    /// Abandon the current phase and move to the next one.
    ///
    /// Nothing is recorded and the streak is not incremented.
    pub fn skip(&mut self) -> Event {
        let from = self.state.phase;
        let to = self.advance();
        debug!(from = from.as_str(), to = to.as_str(), "phase skipped");
        Event::PhaseSkipped {
            from,
            to,
            at: Utc::now(),
        }
    }

    /// Jump straight to `kind`, idle with its full duration.
    ///
    /// # Errors
    /// Returns `EngineError::PhaseChangeWhileRunning` while the countdown runs.
    pub fn select_phase(&mut self, kind: PhaseKind) -> Result<Event, EngineError> {
        if self.state.is_running() {
            return Err(EngineError::PhaseChangeWhileRunning);
        }
        self.state = TimerState::idle(kind, self.settings.seconds_for(kind));
        Ok(Event::PhaseSelected {
            phase: kind,
            total_secs: self.state.total_secs,
            at: Utc::now(),
        })
    }

    /// Replace the settings wholesale.
    ///
    /// The current phase is resized to its new full duration even when
    /// running, so countdown progress is discarded. Status is kept.
    ///
    /// # Errors
    /// Returns `EngineError::Config` and leaves the engine untouched if any
    /// value is zero.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<Event, EngineError> {
        settings.validate()?;
        self.settings = settings;
        let total = self.settings.seconds_for(self.state.phase);
        self.state.total_secs = total;
        self.state.remaining_secs = total;
        Ok(Event::SettingsApplied {
            settings,
            status: self.state.status,
            at: Utc::now(),
        })
    }

    pub fn set_linked_task(&mut self, task_id: Option<i64>) -> Event {
        self.linked_task_id = task_id;
        Event::LinkedTaskChanged {
            linked_task_id: task_id,
            at: Utc::now(),
        }
    }

    /// Account for one elapsed second.
    ///
    /// Returns `Some(Event::PhaseCompleted)` when the phase runs out; the
    /// engine has then already moved to the next phase, idle.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state.status != TimerStatus::Running {
            return None;
        }
        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(1);
        if self.state.remaining_secs == 0 {
            return Some(self.complete());
        }
        None
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self) -> Event {
        let phase = self.state.phase;
        let duration_minutes = self.settings.duration_for(phase);
        self.recorder
            .on_phase_completed(phase, duration_minutes, self.linked_task_id);
        let next = self.advance();
        let streak = self.recorder.current_streak();
        info!(
            phase = phase.as_str(),
            next = next.as_str(),
            streak,
            "phase completed"
        );
        Event::PhaseCompleted {
            phase,
            duration_minutes,
            next,
            streak,
            linked_task_id: self.linked_task_id,
            at: Utc::now(),
        }
    }

    /// Move to the phase that follows the current one, idle and full.
    fn advance(&mut self) -> PhaseKind {
        let next = match self.state.phase {
            PhaseKind::Work => {
                if self.recorder.current_streak() >= self.settings.cycles_before_long_break {
                    self.recorder.reset_streak();
                    PhaseKind::LongBreak
                } else {
                    PhaseKind::ShortBreak
                }
            }
            PhaseKind::ShortBreak | PhaseKind::LongBreak => PhaseKind::Work,
        };
        self.state = TimerState::idle(next, self.settings.seconds_for(next));
        next
    }
}
