mod engine;
mod phase;
mod service;
mod state;

pub use engine::TimerEngine;
pub use phase::{PhaseKind, Settings};
pub use service::{TimerService, TimerSnapshot};
pub use state::{format_clock, TimerState, TimerStatus};
