//! API layer - read-only HTTP endpoints for operators.

mod addresses;
mod health;
mod metrics;
mod routes;

pub use addresses::address_status;
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
