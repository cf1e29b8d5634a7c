//! Rolling request and process metrics for axum servers.
//!
//! A [`SpanRegistry`](metrics::SpanRegistry) keeps, for each configured
//! span, a bounded history of process samples and per-interval response
//! buckets. Sampler tasks tick it, the [`record_requests`] middleware feeds
//! it, and every tick publishes the newest closed pair to SSE observers.
//!
//! [`record_requests`]: middleware::timing::record_requests

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod server;

pub use crate::config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use server::{attach, status_routes, MonitorState};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
