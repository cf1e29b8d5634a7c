use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Html,
    Json,
};
use handlebars::Handlebars;
use parking_lot::Mutex;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use super::span::{SpanHistory, SpanSnapshot};
use crate::server::MonitorState;

// ─── Publish side ────────────────────────────────────────────────

/// Receives one finalized snapshot per span per sampler tick.
/// Fire-and-forget: the registry never waits on or retries a sink.
pub trait PublishSink: Send + Sync {
    fn publish(&self, span: usize, snapshot: SpanSnapshot);
}

/// A snapshot tagged with the span it came from, as observers see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub span: usize,
    #[serde(flatten)]
    pub snapshot: SpanSnapshot,
}

/// Fans snapshots out to every connected observer.
///
/// Closing the sink ends every observer's stream, which lets graceful
/// shutdown finish while SSE clients are still connected.
pub struct BroadcastSink {
    tx: Mutex<Option<broadcast::Sender<Published>>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// A closed sink hands out receivers that are already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn observers(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map_or(0, |tx| tx.receiver_count())
    }

    pub fn close(&self) {
        self.tx.lock().take();
    }
}

impl PublishSink for BroadcastSink {
    fn publish(&self, span: usize, snapshot: SpanSnapshot) {
        if let Some(tx) = self.tx.lock().as_ref() {
            // No observers connected is the normal idle state.
            let _ = tx.send(Published { span, snapshot });
        }
    }
}

// ─── Observer payloads ───────────────────────────────────────────

/// Everything a freshly connected observer needs to draw its charts.
#[derive(Debug, Clone, Serialize)]
pub struct StartPayload {
    pub title: String,
    pub spans: Vec<SpanHistory>,
}

fn start_payload(state: &MonitorState) -> StartPayload {
    StartPayload {
        title: state.config.title.clone(),
        spans: state.registry.histories(),
    }
}

// ─── GET {path}/api ──────────────────────────────────────────────
/// Full history of every span as one JSON document.

pub async fn get_status(State(state): State<Arc<MonitorState>>) -> Json<StartPayload> {
    Json(start_payload(&state))
}

// ─── GET {path}/stream ───────────────────────────────────────────
/// Server-Sent Events endpoint.
/// Sends a `start` event with every span's history, then one `stats`
/// event per snapshot the samplers publish.

pub async fn status_stream(
    State(state): State<Arc<MonitorState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before building the start payload so nothing published in
    // between is missed.
    let updates = BroadcastStream::new(state.updates.subscribe());
    let start = json_event("start", &start_payload(&state));

    let stats = updates.filter_map(|msg| match msg {
        Ok(published) => Some(json_event("stats", &published)),
        Err(err) => {
            debug!(error = %err, "status observer lagging, dropped snapshots");
            None
        }
    });

    let stream = tokio_stream::once(start).chain(stats).map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    let json = serde_json::to_string(payload).unwrap_or_default();
    Event::default().event(name).data(json)
}

// ─── GET {path} ──────────────────────────────────────────────────
/// Bare page that subscribes to the stream and prints the latest values.

pub async fn status_page(
    State(state): State<Arc<MonitorState>>,
) -> Result<Html<String>, StatusCode> {
    render_page(&state.config.title, &state.config.path)
        .map(Html)
        .map_err(|e| {
            warn!(error = %e, "status page failed to render");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

fn render_page(title: &str, path: &str) -> Result<String, handlebars::RenderError> {
    let context = serde_json::json!({
        "title": title,
        "stream": format!("{}/stream", path.trim_end_matches('/')),
    });
    Handlebars::new().render_template(STATUS_PAGE, &context)
}

const STATUS_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{title}} status</title></head>
<body>
<h1>{{title}}</h1>
<table id="spans"></table>
<script>
const rows = {};
const table = document.getElementById("spans");
const source = new EventSource("{{stream}}");
const row = (span, interval) => {
  if (!rows[span]) {
    rows[span] = table.insertRow();
    rows[span].insertCell().textContent = interval + "s";
    for (let i = 0; i < 4; i++) rows[span].insertCell();
  }
  return rows[span];
};
source.addEventListener("start", (e) => {
  JSON.parse(e.data).spans.forEach((s, i) => row(i, s.interval));
});
source.addEventListener("stats", (e) => {
  const d = JSON.parse(e.data);
  const r = row(d.span, d.interval);
  const b = d.responses || { count: 0, mean: 0 };
  r.cells[1].textContent = "cpu " + d.os.cpu.toFixed(1) + "%";
  r.cells[2].textContent = "mem " + d.os.memory.toFixed(1) + "MB";
  r.cells[3].textContent = b.count + " req / " + d.interval + "s";
  r.cells[4].textContent = b.mean.toFixed(2) + "ms";
});
</script>
</body>
</html>
"#;
