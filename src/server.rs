use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::metrics::{stream, BroadcastSink, SampleSource, SpanRegistry};
use crate::middleware::timing;

/// Shared state behind the status routes and the recording middleware.
pub struct MonitorState {
    pub config: MonitorConfig,

    /// Sole owner of span state; samplers tick it, the middleware records.
    pub registry: Arc<SpanRegistry>,

    /// Where sampler snapshots go; every SSE observer subscribes here.
    pub updates: Arc<BroadcastSink>,
}

impl MonitorState {
    pub fn new(config: MonitorConfig, source: Arc<dyn SampleSource>) -> MonitorResult<Arc<Self>> {
        config.validate()?;
        let updates = Arc::new(BroadcastSink::new(config.stream_buffer));
        let registry = Arc::new(SpanRegistry::new(
            &config.spans,
            source,
            updates.clone(),
        )?);
        Ok(Arc::new(Self {
            config,
            registry,
            updates,
        }))
    }

    /// The monitor's own routes are never recorded.
    pub fn is_own_path(&self, path: &str) -> bool {
        let base = self.base();
        match path.strip_prefix(base) {
            Some("/api") | Some("/stream") => true,
            Some("") => !base.is_empty(),
            Some("/") => base.is_empty(),
            _ => false,
        }
    }

    fn base(&self) -> &str {
        self.config.path.trim_end_matches('/')
    }
}

/// Status page, JSON history and SSE stream under the configured path.
pub fn status_routes(state: Arc<MonitorState>) -> Router {
    let base = state.base().to_owned();
    let page = if base.is_empty() { "/".to_owned() } else { base.clone() };

    Router::new()
        .route(&page, get(stream::status_page))
        .route(&format!("{base}/api"), get(stream::get_status))
        .route(&format!("{base}/stream"), get(stream::status_stream))
        .with_state(state)
}

/// Mounts the status routes on `app` and records every other request.
pub fn attach(app: Router, state: Arc<MonitorState>) -> Router {
    app.merge(status_routes(state.clone()))
        .layer(axum_mw::from_fn_with_state(state, timing::record_requests))
}
