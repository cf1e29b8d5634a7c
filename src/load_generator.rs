use axum::{body::Body, http::Request, Router};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use crate::handlers::demo::random_status;

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that drive requests through `app`
/// in-process until `shutdown` is cancelled, so the status page has
/// traffic to show without an external client.
pub async fn run(app: Router, shutdown: CancellationToken, concurrency: u32) {
    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let app = app.clone();
        let shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, app, shutdown).await;
        }));
    }
    info!(concurrency, "load generator started");

    // Wait for all workers to finish
    for h in handles {
        let _ = h.await;
    }
    info!("load generator stopped");
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(id: u32, app: Router, shutdown: CancellationToken) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while !shutdown.is_cancelled() {
        let uri = next_uri(&mut rng);
        let request = match Request::builder().uri(&uri).body(Body::empty()) {
            Ok(request) => request,
            Err(e) => {
                warn!(worker = id, %uri, error = %e, "cannot build request");
                continue;
            }
        };

        let response = tokio::select! {
            _ = shutdown.cancelled() => break,
            response = app.clone().oneshot(request) => response,
        };
        match response {
            Ok(response) => debug!(worker = id, %uri, status = response.status().as_u16(), "demo request"),
            Err(never) => match never {},
        }

        let pause = Duration::from_millis(rng.gen_range(20..250));
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// 70 % variable work, 20 % the root page, 10 % explicit status codes.
fn next_uri(rng: &mut StdRng) -> String {
    match rng.gen_range(0u8..100) {
        0..=69 => "/demo/work".to_owned(),
        70..=89 => "/".to_owned(),
        _ => format!("/demo/status/{}", random_status(rng)),
    }
}
