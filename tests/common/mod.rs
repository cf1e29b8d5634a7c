#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use status_monitor::metrics::{OsSample, PublishSink, RequestOutcome, SampleSource, SpanSnapshot};
use status_monitor::{MonitorError, MonitorResult};

/// Epoch milliseconds every scenario starts from.
pub const T0: i64 = 1_700_000_000_000;

pub fn at(offset_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(T0 + offset_ms).unwrap()
}

pub fn os_sample(timestamp: i64) -> OsSample {
    OsSample {
        cpu: 3.5,
        memory: 48.0,
        load: [0.5, 0.25, 0.125],
        pid: 4242,
        ppid: Some(1),
        elapsed_ms: 10_000,
        timestamp,
    }
}

/// Outcome that ended at `T0 + ended_ms` after `response_ms`.
pub fn outcome(ended_ms: i64, response_ms: i64, status: u16) -> RequestOutcome {
    let ended_at = at(ended_ms);
    RequestOutcome {
        started_at: ended_at - TimeDelta::milliseconds(response_ms),
        ended_at,
        status,
        timed_out: false,
    }
}

/// Hands out queued readings in order; fails when the queue is empty.
#[derive(Default)]
pub struct ScriptedSource {
    queue: Mutex<VecDeque<MonitorResult<OsSample>>>,
}

impl ScriptedSource {
    pub fn push_ok(&self, offset_ms: i64) {
        self.queue.lock().push_back(Ok(os_sample(T0 + offset_ms)));
    }

    pub fn push_err(&self, message: &str) {
        self.queue
            .lock()
            .push_back(Err(MonitorError::Sample(message.to_owned())));
    }
}

#[async_trait]
impl SampleSource for ScriptedSource {
    async fn sample(&self) -> MonitorResult<OsSample> {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::Sample("script exhausted".into())))
    }
}

/// Readings one second apart, starting one second after `T0`.
#[derive(Default)]
pub struct SteppingSource {
    ticks: AtomicI64,
}

#[async_trait]
impl SampleSource for SteppingSource {
    async fn sample(&self) -> MonitorResult<OsSample> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(os_sample(T0 + n * 1_000))
    }
}

/// Readings one second apart whose reads take a few varying milliseconds
/// and carry the time the read finished.
#[derive(Default)]
pub struct JitterySource {
    ticks: AtomicI64,
}

#[async_trait]
impl SampleSource for JitterySource {
    async fn sample(&self) -> MonitorResult<OsSample> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let lag = [3, 1, 2, 0][(n % 4) as usize];
        tokio::time::sleep(std::time::Duration::from_millis(lag as u64)).await;
        Ok(os_sample(T0 + n * 1_000 + lag))
    }
}

/// Keeps everything published, in order.
#[derive(Default)]
pub struct CollectingSink {
    pub published: Mutex<Vec<(usize, SpanSnapshot)>>,
}

impl CollectingSink {
    pub fn take(&self) -> Vec<(usize, SpanSnapshot)> {
        std::mem::take(&mut *self.published.lock())
    }
}

impl PublishSink for CollectingSink {
    fn publish(&self, span: usize, snapshot: SpanSnapshot) {
        self.published.lock().push((span, snapshot));
    }
}
