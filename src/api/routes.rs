use axum::{routing::get, Router};

use crate::server::AppState;

use super::addresses::address_status;
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .route("/addresses/{address}", get(address_status))
}
