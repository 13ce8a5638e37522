// Infrastructure (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod addresses;
pub mod notification;
pub mod queue;
pub mod transport;

// Application
pub mod api;
pub mod server;
pub mod triggers;
pub mod watcher;

// Supporting modules
pub mod shutdown;
pub mod tasks;
