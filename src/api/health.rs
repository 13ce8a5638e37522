//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::queue::{DeadLetter, QueueStats};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub depth: usize,
    pub backing_off: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub addresses: AddressStats,
    pub dead_letters: Vec<DeadLetter>,
}

#[derive(Debug, Serialize)]
pub struct AddressStats {
    pub file: String,
    pub known: usize,
    pub notified: usize,
    pub persist_notified: bool,
    pub removal_mode: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_stats = state.queue.stats();
    let backing_off = queue_stats.backing_off;

    // A relay stuck behind a rate limit still works, it is just slow
    let status = if backing_off { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        queue: QueueHealthResponse {
            depth: queue_stats.depth,
            backing_off,
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let (known, notified) = {
        let book = state.book.lock().await;
        (book.known_len(), book.notified().len())
    };

    Json(StatsResponse {
        queue: state.queue.stats(),
        addresses: AddressStats {
            file: state.address_file.path().display().to_string(),
            known,
            notified,
            persist_notified: state.settings.notifier.persist_notified,
            removal_mode: state.settings.notifier.removal_mode.as_str().to_string(),
        },
        dead_letters: state.queue.dead_letters(),
    })
}
