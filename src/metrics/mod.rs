pub mod bucket;
pub mod registry;
pub mod sample;
pub mod span;
pub mod stream;
pub mod window;

pub use bucket::{ResponseBucket, StatusClass};
pub use registry::SpanRegistry;
pub use sample::{OsSample, SampleSource, SysinfoSource};
pub use span::{Span, SpanConfig, SpanHistory, SpanSnapshot};
pub use stream::{BroadcastSink, PublishSink, Published};
pub use window::RingWindow;

use chrono::{DateTime, Utc};

/// How one request ended, as reported by the request-handling layer.
/// This is the "write" side; the registry folds it into every span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOutcome {
    pub started_at: DateTime<Utc>,
    /// When it completed, or when its timeout fired.
    pub ended_at: DateTime<Utc>,
    /// Final status code; ignored when `timed_out` is set.
    pub status: u16,
    pub timed_out: bool,
}

impl RequestOutcome {
    /// Sub-millisecond precision; clock steps backwards count as 0.
    pub fn response_time_ms(&self) -> f64 {
        let elapsed = self.ended_at - self.started_at;
        match elapsed.num_microseconds() {
            Some(us) => us.max(0) as f64 / 1000.0,
            None => elapsed.num_milliseconds().max(0) as f64,
        }
    }

    pub fn class(&self) -> Option<StatusClass> {
        StatusClass::classify(self.status, self.timed_out)
    }
}
