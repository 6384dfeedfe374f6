use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::recorder::{RecordReceiver, RecordSender};
use crate::error::StorageError;
use crate::storage::RecordStore;

pub type ErrorSink = mpsc::UnboundedSender<StorageError>;

/// Background task that drains queued session records into a store.
///
/// Each insert runs on the blocking pool. Failures are logged and forwarded
/// to the optional error sink; the record is not retried.
pub struct RecordWriter {
    store: Arc<dyn RecordStore>,
    errors: Option<ErrorSink>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            errors: None,
        }
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.errors = Some(sink);
        self
    }

    /// Spawn the writer on the current Tokio runtime.
    ///
    /// The task ends once every sender is dropped and the queue is drained;
    /// its output is the number of records persisted.
    pub fn spawn(self) -> (RecordSender, JoinHandle<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(self, mut rx: RecordReceiver) -> usize {
        let mut persisted = 0usize;
        while let Some(record) = rx.recv().await {
            let store = Arc::clone(&self.store);
            let kind = record.phase_kind;
            let outcome = tokio::task::spawn_blocking(move || store.insert(&record)).await;
            match outcome {
                Ok(Ok(id)) => {
                    persisted += 1;
                    debug!(id, phase = kind.as_str(), "session record persisted");
                }
                Ok(Err(err)) => self.report(err),
                Err(join_err) => {
                    self.report(StorageError::QueryFailed(format!(
                        "insert task failed: {join_err}"
                    )));
                }
            }
        }
        info!(persisted, "record writer stopped");
        persisted
    }

    fn report(&self, err: StorageError) {
        warn!(error = %err, "failed to persist session record");
        if let Some(sink) = &self.errors {
            let _ = sink.send(err);
        }
    }
}
