use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sample::SampleSource;
use super::span::{Span, SpanConfig, SpanHistory};
use super::stream::PublishSink;
use super::RequestOutcome;
use crate::error::{MonitorError, MonitorResult};

/// Owns every span and is the only way to change one.
///
/// Each span sits behind its own lock. `tick` and `record` re-check bucket
/// staleness while holding it, so whichever of them first sees the last
/// bucket closed appends the new one and the other folds into it. No lock is
/// held while waiting on the sample source.
pub struct SpanRegistry {
    configs: Vec<SpanConfig>,
    spans: Vec<Mutex<Span>>,
    source: Arc<dyn SampleSource>,
    sink: Arc<dyn PublishSink>,
}

impl SpanRegistry {
    pub fn new(
        configs: &[SpanConfig],
        source: Arc<dyn SampleSource>,
        sink: Arc<dyn PublishSink>,
    ) -> MonitorResult<Self> {
        validate_spans(configs)?;
        Ok(Self {
            configs: configs.to_vec(),
            spans: configs.iter().map(|c| Mutex::new(Span::new(*c))).collect(),
            source,
            sink,
        })
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &[SpanConfig] {
        &self.configs
    }

    /// Copies of every span's windows, in configuration order.
    pub fn histories(&self) -> Vec<SpanHistory> {
        self.spans.iter().map(|s| s.lock().history()).collect()
    }

    /// Copy of one span's windows.
    pub fn history(&self, index: usize) -> MonitorResult<SpanHistory> {
        let span = self.spans.get(index).ok_or(MonitorError::UnknownSpan(index))?;
        Ok(span.lock().history())
    }

    /// One sampler tick for span `index`, stamped with the wall clock as it
    /// was before the sample was taken.
    pub async fn tick(&self, index: usize) -> MonitorResult<()> {
        self.tick_at(index, Utc::now().timestamp_millis()).await
    }

    /// One sampler tick for span `index` that fired at `tick_ms`.
    ///
    /// `tick_ms` is both the boundary check's "now" and the start of any
    /// placeholder bucket, so placeholders follow the tick cadence however
    /// long each sample takes to read. A failing source leaves the span
    /// untouched; the error is logged and the next tick tries again. Only
    /// an unknown index is an error.
    pub async fn tick_at(&self, index: usize, tick_ms: i64) -> MonitorResult<()> {
        let span = self.spans.get(index).ok_or(MonitorError::UnknownSpan(index))?;

        let sample = match self.source.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(span = index, error = %e, "skipping sampler tick");
                return Ok(());
            }
        };

        let snapshot = {
            let mut span = span.lock();
            span.push_sample(sample, tick_ms);
            span.snapshot()
        };

        if let Some(snapshot) = snapshot {
            self.sink.publish(index, snapshot);
        }
        Ok(())
    }

    /// Fold a finished (or timed-out) request into every span.
    ///
    /// Returns `false` when the outcome was dropped because its status is
    /// outside 2xx..5xx.
    pub fn record(&self, outcome: RequestOutcome) -> bool {
        let Some(class) = outcome.class() else {
            debug!(status = outcome.status, "dropping outcome outside 2xx-5xx");
            return false;
        };
        let response_time_ms = outcome.response_time_ms();
        let now_ms = outcome.ended_at.timestamp_millis();

        for span in &self.spans {
            span.lock().record(class, response_time_ms, now_ms);
        }
        true
    }

    /// One sampler task per span, each firing every `interval` seconds until
    /// `shutdown` is cancelled.
    ///
    /// Ticks are stamped with their scheduled instant mapped onto the wall
    /// clock, so consecutive ticks are exactly one interval apart.
    pub fn spawn_samplers(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        self.configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                let registry = Arc::clone(self);
                let shutdown = shutdown.clone();
                let period = Duration::from_secs(config.interval);

                tokio::spawn(async move {
                    let origin = Instant::now();
                    let origin_ms = Utc::now().timestamp_millis();
                    let mut ticker = tokio::time::interval_at(origin + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    info!(span = index, interval_secs = period.as_secs(), "sampler started");

                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            scheduled = ticker.tick() => {
                                let offset = scheduled.duration_since(origin).as_millis() as i64;
                                if let Err(e) = registry.tick_at(index, origin_ms + offset).await {
                                    warn!(span = index, error = %e, "sampler tick failed");
                                }
                            }
                        }
                    }
                    info!(span = index, "sampler stopped");
                })
            })
            .collect()
    }
}

pub(crate) fn validate_spans(configs: &[SpanConfig]) -> MonitorResult<()> {
    if configs.is_empty() {
        return Err(MonitorError::NoSpans);
    }
    for (index, span) in configs.iter().enumerate() {
        if span.interval == 0 {
            return Err(MonitorError::InvalidSpan {
                index,
                reason: "interval must be at least 1 second",
            });
        }
        if span.retention == 0 {
            return Err(MonitorError::InvalidSpan {
                index,
                reason: "retention must be at least 1",
            });
        }
    }
    Ok(())
}
