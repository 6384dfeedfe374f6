//! Async runtime shell around [`TimerEngine`].
//!
//! The service owns the engine behind a single mutex together with the
//! cancellation token of the active ticker task. Commands cancel the token
//! while holding that lock and the ticker re-checks it under the same lock,
//! so a tick can never land after a command that replaced it.
//!
//! Every mutation publishes a [`TimerSnapshot`] on a `watch` channel (late
//! subscribers see the latest one) and the matching [`Event`] on a
//! `broadcast` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::TimerEngine;
use super::phase::{PhaseKind, Settings};
use super::state::TimerState;
use crate::error::{EngineError, StorageError};
use crate::events::Event;
use crate::session::{ErrorSink, RecordWriter, SessionRecorder};
use crate::stats::{local_day_start, DailySummary};
use crate::storage::RecordStore;

const EVENT_CAPACITY: usize = 64;

/// What subscribers see after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub display: String,
    pub progress: f64,
    pub streak: u32,
    pub linked_task_id: Option<i64>,
    pub settings: Settings,
}

impl TimerSnapshot {
    pub fn of(engine: &TimerEngine) -> Self {
        let state = engine.state();
        Self {
            display: state.display(),
            progress: state.progress(),
            state,
            streak: engine.streak(),
            linked_task_id: engine.linked_task_id(),
            settings: *engine.settings(),
        }
    }
}

struct Shared {
    engine: TimerEngine,
    ticker: Option<CancellationToken>,
}

impl Shared {
    fn cancel_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

struct Inner {
    shared: Mutex<Shared>,
    snapshots: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<Event>,
    tick_interval: Duration,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the current engine state; caller holds the lock.
    fn publish(&self, shared: &Shared, event: Option<Event>) {
        self.snapshots.send_replace(TimerSnapshot::of(&shared.engine));
        if let Some(event) = event {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Owned, explicitly constructed timer with a live countdown.
///
/// Must be created inside a Tokio runtime: the record writer and the
/// ticker are spawned on it.
pub struct TimerService {
    inner: Arc<Inner>,
    store: Arc<dyn RecordStore>,
    writer: Option<JoinHandle<usize>>,
}

impl TimerService {
    /// # Errors
    /// Returns `EngineError::Config` if `settings` is invalid.
    pub fn new(settings: Settings, store: Arc<dyn RecordStore>) -> Result<Self, EngineError> {
        Self::build(settings, store, None, Duration::from_secs(1))
    }

    /// Like [`TimerService::new`], forwarding persistence failures to `errors`.
    pub fn with_error_sink(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        errors: ErrorSink,
    ) -> Result<Self, EngineError> {
        Self::build(settings, store, Some(errors), Duration::from_secs(1))
    }

    fn build(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        errors: Option<ErrorSink>,
        tick_interval: Duration,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        let mut writer = RecordWriter::new(Arc::clone(&store));
        if let Some(errors) = errors {
            writer = writer.with_error_sink(errors);
        }
        let (sink, writer_handle) = writer.spawn();
        let engine = TimerEngine::new(settings, SessionRecorder::new(sink))?;

        let (snapshots, _) = watch::channel(TimerSnapshot::of(&engine));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    engine,
                    ticker: None,
                }),
                snapshots,
                events,
                tick_interval,
            }),
            store,
            writer: Some(writer_handle),
        })
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::of(&self.inner.lock().engine)
    }

    pub fn streak(&self) -> u32 {
        self.inner.lock().engine.streak()
    }

    /// Work sessions and minutes recorded since local midnight.
    ///
    /// The query runs on the blocking pool.
    ///
    /// # Errors
    /// Propagates the store's query error.
    pub async fn today_summary(&self) -> Result<DailySummary, StorageError> {
        let store = Arc::clone(&self.store);
        let day_start = local_day_start(Local::now());
        tokio::task::spawn_blocking(move || store.work_summary_since(day_start))
            .await
            .map_err(|e| StorageError::QueryFailed(format!("summary task failed: {e}")))?
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> Option<Event> {
        let mut shared = self.inner.lock();
        let event = shared.engine.start()?;
        shared.cancel_ticker();
        let token = CancellationToken::new();
        shared.ticker = Some(token.clone());
        spawn_ticker(Arc::clone(&self.inner), token);
        self.inner.publish(&shared, Some(event.clone()));
        Some(event)
    }

    pub fn pause(&self) -> Option<Event> {
        let mut shared = self.inner.lock();
        shared.cancel_ticker();
        let event = shared.engine.pause();
        self.inner.publish(&shared, event.clone());
        event
    }

    pub fn reset(&self) -> Event {
        let mut shared = self.inner.lock();
        shared.cancel_ticker();
        let event = shared.engine.reset();
        self.inner.publish(&shared, Some(event.clone()));
        event
    }

    pub fn skip(&self) -> Event {
        let mut shared = self.inner.lock();
        shared.cancel_ticker();
        let event = shared.engine.skip();
        self.inner.publish(&shared, Some(event.clone()));
        event
    }

    /// # Errors
    /// Returns `EngineError::PhaseChangeWhileRunning` while counting down.
    pub fn select_phase(&self, kind: PhaseKind) -> Result<Event, EngineError> {
        let mut shared = self.inner.lock();
        let event = shared.engine.select_phase(kind)?;
        shared.cancel_ticker();
        self.inner.publish(&shared, Some(event.clone()));
        Ok(event)
    }

    /// Replace the settings. A running phase restarts its cadence from the
    /// new full duration.
    ///
    /// # Errors
    /// Returns `EngineError::Config` and changes nothing if invalid.
    pub fn apply_settings(&self, settings: Settings) -> Result<Event, EngineError> {
        let mut shared = self.inner.lock();
        let event = shared.engine.apply_settings(settings)?;
        shared.cancel_ticker();
        if shared.engine.state().is_running() {
            let token = CancellationToken::new();
            shared.ticker = Some(token.clone());
            spawn_ticker(Arc::clone(&self.inner), token);
        }
        self.inner.publish(&shared, Some(event.clone()));
        Ok(event)
    }

    pub fn set_linked_task(&self, task_id: Option<i64>) -> Event {
        let mut shared = self.inner.lock();
        let event = shared.engine.set_linked_task(task_id);
        self.inner.publish(&shared, Some(event.clone()));
        event
    }

    /// Stop the countdown, close the record queue and wait for the writer
    /// to flush. Returns the number of records persisted.
    pub async fn shutdown(mut self) -> usize {
        {
            let mut shared = self.inner.lock();
            shared.cancel_ticker();
            shared.engine.recorder_mut().close();
        }
        match self.writer.take() {
            Some(handle) => match handle.await {
                Ok(count) => count,
                Err(err) => {
                    warn!(error = %err, "record writer task failed");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        let mut shared = self.inner.lock();
        shared.cancel_ticker();
        shared.engine.recorder_mut().close();
    }
}

fn spawn_ticker(inner: Arc<Inner>, token: CancellationToken) {
    let period = inner.tick_interval;
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if !apply_tick(&inner, &token) {
                        break;
                    }
                }
            }
        }
        debug!("ticker stopped");
    });
}

/// Apply one tick unless `token` was cancelled. Returns whether the ticker
/// should keep going.
fn apply_tick(inner: &Inner, token: &CancellationToken) -> bool {
    let mut shared = inner.lock();
    if token.is_cancelled() {
        return false;
    }
    let completed = shared.engine.tick();
    let finished = completed.is_some();
    if finished {
        shared.ticker = None;
    }
    inner.publish(&shared, completed);
    !finished
}

#[cfg(test)]
impl TimerService {
    pub(crate) fn with_tick_interval(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        tick_interval: Duration,
    ) -> Result<Self, EngineError> {
        Self::build(settings, store, None, tick_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::TimerStatus;

    fn service() -> (TimerService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = TimerService::new(Settings::default(), store.clone()).unwrap();
        (service, store)
    }

    #[tokio::test(start_paused = true)]
    async fn running_timer_ticks_once_per_second() {
        let (service, _store) = service();
        service.start();
        time::sleep(Duration::from_millis(3_500)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.remaining_secs, 1500 - 3);
        assert_eq!(snap.state.status, TimerStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_and_resume_continues() {
        let (service, _store) = service();
        service.start();
        time::sleep(Duration::from_millis(2_500)).await;
        service.pause();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.snapshot().state.remaining_secs, 1498);

        service.start();
        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(service.snapshot().state.remaining_secs, 1497);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_ticker() {
        let (service, _store) = service();
        service.start();
        time::sleep(Duration::from_millis(2_500)).await;
        service.reset();
        time::sleep(Duration::from_secs(5)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.remaining_secs, 1500);
        assert_eq!(snap.state.status, TimerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_cancels_ticker() {
        let (service, store) = service();
        service.start();
        time::sleep(Duration::from_millis(2_500)).await;
        service.skip();
        time::sleep(Duration::from_secs(5)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.phase, PhaseKind::ShortBreak);
        assert_eq!(snap.state.status, TimerStatus::Idle);
        assert_eq!(snap.state.remaining_secs, 300);
        assert_eq!(snap.streak, 0);
        assert_eq!(service.shutdown().await, 0);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn select_phase_after_pause_stays_frozen() {
        let (service, _store) = service();
        service.start();
        time::sleep(Duration::from_millis(1_500)).await;
        service.pause();
        service.select_phase(PhaseKind::LongBreak).unwrap();
        time::sleep(Duration::from_secs(5)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.phase, PhaseKind::LongBreak);
        assert_eq!(snap.state.status, TimerStatus::Idle);
        assert_eq!(snap.state.remaining_secs, 900);
    }

    #[tokio::test(start_paused = true)]
    async fn select_phase_is_rejected_while_running() {
        let (service, _store) = service();
        service.start();
        assert!(matches!(
            service.select_phase(PhaseKind::LongBreak),
            Err(EngineError::PhaseChangeWhileRunning)
        ));
        time::sleep(Duration::from_millis(2_500)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.phase, PhaseKind::Work);
        assert_eq!(snap.state.remaining_secs, 1498);
    }

    #[tokio::test]
    async fn today_summary_counts_work_since_midnight() {
        let store = Arc::new(MemoryStore::new());
        let now = chrono::Utc::now().timestamp_millis();
        store
            .insert(&crate::session::SessionRecord::new(PhaseKind::Work, 25, now, None))
            .unwrap();
        store
            .insert(&crate::session::SessionRecord::new(PhaseKind::ShortBreak, 5, now, None))
            .unwrap();
        let service = TimerService::new(Settings::default(), store).unwrap();

        let summary = service.today_summary().await.unwrap();
        assert_eq!(summary.work_sessions, 1);
        assert_eq!(summary.work_minutes, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_does_not_double_tick() {
        let (service, _store) = service();
        assert!(service.start().is_some());
        assert!(service.start().is_none());
        time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(service.snapshot().state.remaining_secs, 1496);
    }

    #[tokio::test(start_paused = true)]
    async fn late_subscriber_sees_latest_snapshot() {
        let (service, _store) = service();
        service.select_phase(PhaseKind::LongBreak).unwrap();
        let rx = service.subscribe();
        let snap = rx.borrow().clone();
        assert_eq!(snap.state.phase, PhaseKind::LongBreak);
        assert_eq!(snap.display, "15:00");
        assert_eq!(snap.progress, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_are_notified_on_each_tick() {
        let (service, _store) = service();
        let mut rx = service.subscribe();
        rx.borrow_and_update();
        service.start();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state.status, TimerStatus::Running);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state.remaining_secs, 1499);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_settings_while_running_restarts_from_new_duration() {
        let (service, _store) = service();
        service.start();
        time::sleep(Duration::from_millis(2_500)).await;
        service
            .apply_settings(Settings::new(10, 5, 15, 4).unwrap())
            .unwrap();
        time::sleep(Duration::from_millis(1_500)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.status, TimerStatus::Running);
        assert_eq!(snap.state.total_secs, 600);
        assert_eq!(snap.state.remaining_secs, 599);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_recorded_and_ticker_stops() {
        let store = Arc::new(MemoryStore::new());
        let service = TimerService::with_tick_interval(
            Settings::new(1, 1, 1, 4).unwrap(),
            store.clone(),
            Duration::from_millis(10),
        )
        .unwrap();
        let mut events = service.subscribe_events();

        service.start();
        time::sleep(Duration::from_secs(5)).await;

        let snap = service.snapshot();
        assert_eq!(snap.state.phase, PhaseKind::ShortBreak);
        assert_eq!(snap.state.status, TimerStatus::Idle);
        assert_eq!(snap.state.remaining_secs, 60);
        assert_eq!(snap.streak, 1);

        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::PhaseCompleted { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);

        assert_eq!(service.shutdown().await, 1);
        assert_eq!(store.len(), 1);
    }
}
