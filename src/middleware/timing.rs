use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics::{RequestOutcome, SpanRegistry};
use crate::server::MonitorState;

/// Measures one request and records it exactly once.
///
/// Clones share one claim: whichever of completion or timeout claims it
/// first records, the other becomes a no-op.
#[derive(Clone)]
#[must_use = "a request timer records nothing until completed or timed out"]
pub struct RequestTimer {
    registry: Arc<SpanRegistry>,
    started_at: DateTime<Utc>,
    started: Instant,
    claimed: Arc<AtomicBool>,
}

impl RequestTimer {
    pub fn start(registry: Arc<SpanRegistry>) -> Self {
        Self {
            registry,
            started_at: Utc::now(),
            started: Instant::now(),
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The handler produced a response with `status`. Returns `false` if the
    /// request was already recorded or the status is not counted.
    pub fn complete(&self, status: u16) -> bool {
        self.claim() && self.finish(status, false)
    }

    /// The configured timeout fired first.
    pub fn time_out(&self) -> bool {
        self.claim() && self.finish(StatusCode::GATEWAY_TIMEOUT.as_u16(), true)
    }

    /// Records a timeout after `after` from a task of its own, so the request
    /// is counted even if its future is dropped before it finishes.
    pub fn arm_timeout(&self, after: Duration, method: Method, path: String) -> JoinHandle<()> {
        let timer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if timer.time_out() {
                let timeout_ms = after.as_millis() as u64;
                warn!(%method, %path, timeout_ms, "request timed out, recorded as 5xx");
            }
        })
    }

    fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    fn finish(&self, status: u16, timed_out: bool) -> bool {
        // Monotonic elapsed keeps the response time non-negative even if
        // the wall clock steps.
        let elapsed =
            TimeDelta::from_std(self.started.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
        self.registry.record(RequestOutcome {
            started_at: self.started_at,
            ended_at: self.started_at + elapsed,
            status,
            timed_out,
        })
    }
}

/// Records every request outside the monitor's own routes and adds a
/// `Server-Timing: total;dur=<ms>` header with the handler wall time.
///
/// With `request_timeout_ms` set, a request still running when the timeout
/// fires is recorded as a 5xx right then, whether or not the client is still
/// waiting; its eventual response is passed through untouched and not
/// recorded again.
pub async fn record_requests(
    State(state): State<Arc<MonitorState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.is_own_path(req.uri().path()) {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let timer = RequestTimer::start(state.registry.clone());
    let deadline = state.config.request_timeout_ms.map(|ms| {
        timer.arm_timeout(Duration::from_millis(ms), method.clone(), path.clone())
    });
    let started = Instant::now();

    let mut response = next.run(req).await;
    let recorded = timer.complete(response.status().as_u16());
    if let Some(deadline) = deadline {
        deadline.abort();
    }

    let elapsed = started.elapsed();

    // ── Inject response header ──────────────────────────────────
    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    debug!(
        status = response.status().as_u16(),
        %method,
        %path,
        us = elapsed.as_micros() as u64,
        recorded,
        "request finished"
    );

    response
}
