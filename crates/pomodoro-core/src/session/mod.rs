mod record;
mod recorder;
mod writer;

pub use record::SessionRecord;
pub use recorder::{RecordReceiver, RecordSender, SessionRecorder};
pub use writer::{ErrorSink, RecordWriter};
