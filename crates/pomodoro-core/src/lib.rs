//! # Pomodoro Core Library
//!
//! Core logic for a work/break cycle timer. All operations are available
//! through the `pomodoro-cli` binary, which is a thin terminal layer over
//! this library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a deterministic phase state machine; one `tick()` is
//!   one elapsed second
//! - **Timer Service**: owns the engine, runs the cancellable one-second
//!   ticker and pushes snapshots to subscribers
//! - **Session Recorder**: turns completed phases into records and keeps the
//!   work streak that decides when a long break is due
//! - **Storage**: SQLite session storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`]: Async shell with ticker and subscriptions
//! - [`SessionRecorder`]: Completion records and streak
//! - [`Database`]: Session persistence and day aggregates
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, EngineError, StorageError};
pub use events::Event;
pub use session::{RecordWriter, SessionRecord, SessionRecorder};
pub use stats::DailySummary;
pub use storage::{Config, Database, MemoryStore, RecordStore, SettingsStore, TomlSettingsStore};
pub use timer::{PhaseKind, Settings, TimerEngine, TimerService, TimerSnapshot, TimerState, TimerStatus};
