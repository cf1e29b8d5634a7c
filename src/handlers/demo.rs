use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkParams {
    /// Simulated handler latency; random 5..150 ms when absent.
    pub ms: Option<u64>,
    /// Status to answer with; mostly 200 with some 3xx/4xx/5xx when absent.
    pub status: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct WorkDone {
    pub slept_ms: u64,
    pub status: u16,
}

/// Longest latency a caller may ask for.
const MAX_WORK_MS: u64 = 30_000;

/// Routes of the demo application the monitor is attached to.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/demo/work", get(work))
        .route("/demo/status/:code", get(status))
}

// ─── GET / ───────────────────────────────────────────────────────

pub async fn hello() -> &'static str {
    "Hello World"
}

// ─── GET /demo/work ──────────────────────────────────────────────

pub async fn work(
    Query(params): Query<WorkParams>,
) -> Result<(StatusCode, Json<WorkDone>), AppError> {
    // Roll the dice before awaiting; the thread RNG is not Send.
    let (ms, code) = {
        let mut rng = rand::thread_rng();
        let ms = params.ms.unwrap_or_else(|| rng.gen_range(5..150));
        let code = params.status.unwrap_or_else(|| random_status(&mut rng));
        (ms, code)
    };

    if ms > MAX_WORK_MS {
        return Err(AppError::BadRequest(format!(
            "ms must be at most {MAX_WORK_MS}"
        )));
    }
    let status = parse_status(code)?;

    tokio::time::sleep(Duration::from_millis(ms)).await;

    Ok((
        status,
        Json(WorkDone {
            slept_ms: ms,
            status: code,
        }),
    ))
}

// ─── GET /demo/status/:code ──────────────────────────────────────

pub async fn status(Path(code): Path<u16>) -> Result<StatusCode, AppError> {
    match code {
        404 => Err(AppError::NotFound("nothing here".into())),
        _ => parse_status(code),
    }
}

fn parse_status(code: u16) -> Result<StatusCode, AppError> {
    StatusCode::from_u16(code)
        .map_err(|_| AppError::BadRequest(format!("'{code}' is not a status code")))
}

/// 80 % 200, then redirects, client and server errors.
pub fn random_status<R: Rng>(rng: &mut R) -> u16 {
    match rng.gen_range(0u8..100) {
        0..=79 => 200,
        80..=84 => 302,
        85..=94 => 404,
        _ => 500,
    }
}
