use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use status_monitor::metrics::SysinfoSource;
use status_monitor::{init_tracing, MonitorConfig, MonitorState};

mod cli;
mod handlers;
mod load_generator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = cli::Cli::parse();

    // ── 1. Configuration ─────────────────────────────────────────
    let config = MonitorConfig::load(args.config.as_deref())
        .context("loading monitor configuration")?;
    info!(
        path = %config.path,
        spans = config.spans.len(),
        timeout_ms = ?config.request_timeout_ms,
        "monitor configured"
    );

    // ── 2. Registry + samplers ───────────────────────────────────
    let source = Arc::new(SysinfoSource::current_process()?);
    let state = MonitorState::new(config, source)?;
    let shutdown = CancellationToken::new();
    let samplers = state.registry.spawn_samplers(shutdown.clone());

    // ── 3. Router: demo app with the monitor attached ────────────
    let status_path = state.config.path.clone();
    let updates = state.updates.clone();
    let app = status_monitor::attach(handlers::demo::routes(), state)
        .layer(CorsLayer::permissive());

    // ── 4. Optional synthetic traffic ────────────────────────────
    let load = (args.load_workers > 0).then(|| {
        tokio::spawn(load_generator::run(
            app.clone(),
            shutdown.clone(),
            args.load_workers,
        ))
    });

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;

    info!(addr = %args.bind, "server listening");
    info!("status page  → http://{}{}", args.bind, status_path);
    info!("status SSE   → http://{}{}/stream", args.bind, status_path.trim_end_matches('/'));

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            signal.cancel();
            updates.close();
        })
        .await
        .context("server exited with error")?;

    // Samplers and workers stop at their next suspension point.
    shutdown.cancel();
    for handle in samplers {
        let _ = handle.await;
    }
    if let Some(handle) = load {
        let _ = handle.await;
    }

    Ok(())
}
