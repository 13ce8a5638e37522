//! Prometheus metrics for the relay.
//!
//! This module provides metrics for monitoring the relay:
//! - Delivery metrics (enqueued, delivered, rate-limited, abandoned)
//! - Queue depth
//! - Producer metrics (file changes, addresses notified, summaries)
//! - Command metrics (removals by outcome)

mod helpers;

pub use helpers::{encode_metrics, CommandMetrics, DeliveryMetrics, ProducerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Messages handed to the delivery queue
    pub static ref MESSAGES_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_enqueued_total", METRIC_PREFIX),
        "Total messages handed to the delivery queue"
    ).unwrap();

    /// Messages accepted by the chat platform
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total messages successfully delivered"
    ).unwrap();

    /// Send attempts answered with a rate-limit signal
    pub static ref MESSAGES_RATE_LIMITED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_rate_limited_total", METRIC_PREFIX),
        "Total send attempts rejected with a rate-limit signal"
    ).unwrap();

    /// Messages dropped after a non-retryable failure
    pub static ref MESSAGES_ABANDONED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_abandoned_total", METRIC_PREFIX),
        "Total messages abandoned after a non-retryable failure"
    ).unwrap();

    /// Messages currently waiting in the queue
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Messages currently waiting in the delivery queue"
    ).unwrap();

    /// Round trip of a single send attempt
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Send attempt latency in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Producer Metrics
    // ============================================================================

    /// Debounced change signals from the address file watcher
    pub static ref FILE_CHANGES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_file_changes_total", METRIC_PREFIX),
        "Total debounced address file change signals"
    ).unwrap();

    /// Addresses surfaced to the chat
    pub static ref ADDRESSES_NOTIFIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_addresses_notified_total", METRIC_PREFIX),
        "Total new addresses surfaced to the chat"
    ).unwrap();

    /// Summary messages emitted for large batches
    pub static ref SUMMARIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_summaries_total", METRIC_PREFIX),
        "Total summary messages emitted for large batches"
    ).unwrap();

    // ============================================================================
    // Command Metrics
    // ============================================================================

    /// Removal requests by outcome
    pub static ref REMOVALS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_removals_total", METRIC_PREFIX),
        "Total address removal requests",
        &["outcome"]
    ).unwrap();
}
