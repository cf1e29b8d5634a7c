use serde::{Deserialize, Serialize};

use super::bucket::{ResponseBucket, StatusClass};
use super::sample::OsSample;
use super::window::RingWindow;

/// One (interval, retention) pair as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanConfig {
    /// Seconds covered by each bucket and between sampler ticks.
    pub interval: u64,
    /// Samples / buckets kept before the oldest is evicted.
    pub retention: usize,
}

impl SpanConfig {
    pub const fn new(interval: u64, retention: usize) -> Self {
        Self { interval, retention }
    }
}

/// What observers receive after a tick: the newest *closed* pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanSnapshot {
    pub interval: u64,
    pub retention: usize,
    pub os: OsSample,
    pub responses: Option<ResponseBucket>,
}

/// Full copy of a span's windows, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct SpanHistory {
    pub interval: u64,
    pub retention: usize,
    pub os: Vec<OsSample>,
    pub responses: Vec<ResponseBucket>,
}

/// A span's configuration plus its two bounded histories.
///
/// The last response bucket is the only one that may still change; every
/// operation re-checks whether it is open at the moment it runs.
#[derive(Debug, Clone)]
pub struct Span {
    config: SpanConfig,
    os: RingWindow<OsSample>,
    responses: RingWindow<ResponseBucket>,
}

impl Span {
    pub fn new(config: SpanConfig) -> Self {
        Self {
            config,
            os: RingWindow::new(config.retention),
            responses: RingWindow::new(config.retention),
        }
    }

    /// Sampler tick body: store the reading, then make sure an open bucket
    /// exists so the interval is represented even without traffic.
    pub fn push_sample(&mut self, sample: OsSample, now_ms: i64) {
        self.os.append(sample);

        let needs_bucket = match self.responses.last() {
            None => true,
            Some(last) => !last.is_open(now_ms, self.config.interval),
        };
        if needs_bucket {
            self.responses.append(ResponseBucket::placeholder(now_ms));
        }
    }

    /// Fold one outcome into the open bucket, or open a new one.
    pub fn record(&mut self, class: StatusClass, response_time_ms: f64, now_ms: i64) {
        let interval = self.config.interval;
        if let Some(last) = self
            .responses
            .last_mut()
            .filter(|b| b.is_open(now_ms, interval))
        {
            last.fold(response_time_ms, class);
            return;
        }
        self.responses
            .append(ResponseBucket::open(now_ms, response_time_ms, class));
    }

    /// `None` until at least two samples exist.
    pub fn snapshot(&self) -> Option<SpanSnapshot> {
        let os = self.os.second_to_last()?.clone();
        Some(SpanSnapshot {
            interval: self.config.interval,
            retention: self.config.retention,
            os,
            responses: self.responses.second_to_last().cloned(),
        })
    }

    pub fn history(&self) -> SpanHistory {
        SpanHistory {
            interval: self.config.interval,
            retention: self.config.retention,
            os: self.os.iter().cloned().collect(),
            responses: self.responses.iter().cloned().collect(),
        }
    }

    pub fn os_window(&self) -> &RingWindow<OsSample> {
        &self.os
    }

    pub fn response_window(&self) -> &RingWindow<ResponseBucket> {
        &self.responses
    }
}
