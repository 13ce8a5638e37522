//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    ADDRESSES_NOTIFIED_TOTAL, DELIVERY_LATENCY, FILE_CHANGES_TOTAL, MESSAGES_ABANDONED_TOTAL,
    MESSAGES_DELIVERED_TOTAL, MESSAGES_ENQUEUED_TOTAL, MESSAGES_RATE_LIMITED_TOTAL, QUEUE_DEPTH,
    REMOVALS_TOTAL, SUMMARIES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery queue metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_enqueued(depth: usize) {
        MESSAGES_ENQUEUED_TOTAL.inc();
        QUEUE_DEPTH.set(depth as i64);
    }

    pub fn record_depth(depth: usize) {
        QUEUE_DEPTH.set(depth as i64);
    }

    pub fn record_delivered(latency: Duration) {
        MESSAGES_DELIVERED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    pub fn record_rate_limited(latency: Duration) {
        MESSAGES_RATE_LIMITED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    pub fn record_abandoned(latency: Duration) {
        MESSAGES_ABANDONED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }
}

/// Helper struct for recording producer metrics
pub struct ProducerMetrics;

impl ProducerMetrics {
    pub fn record_change() {
        FILE_CHANGES_TOTAL.inc();
    }

    pub fn record_notified(count: usize, summarized: bool) {
        ADDRESSES_NOTIFIED_TOTAL.inc_by(count as u64);
        if summarized {
            SUMMARIES_TOTAL.inc();
        }
    }
}

/// Helper struct for recording command metrics
pub struct CommandMetrics;

impl CommandMetrics {
    pub fn record_removal(outcome: &str) {
        REMOVALS_TOTAL.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_relay_metrics() {
        DeliveryMetrics::record_enqueued(3);
        CommandMetrics::record_removal("removed");

        let output = encode_metrics().unwrap();
        assert!(output.contains("relay_messages_enqueued_total"));
        assert!(output.contains("relay_removals_total"));
    }
}
