//! Metrics and observability utilities
//!
//! Prometheus metrics with latency-aligned histograms and a shared
//! `tutorly_` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Tutorly metrics
pub const METRICS_PREFIX: &str = "tutorly";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s (Stripe round trips)
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of RPC requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "RPC request latency in seconds"
    );

    describe_counter!(
        format!("{}_tokens_debited_total", METRICS_PREFIX),
        Unit::Count,
        "Tokens spent unlocking sheets"
    );

    describe_counter!(
        format!("{}_tokens_credited_total", METRICS_PREFIX),
        Unit::Count,
        "Tokens credited by invoices, promotions and grants"
    );

    describe_counter!(
        format!("{}_verification_codes_sent_total", METRICS_PREFIX),
        Unit::Count,
        "Verification codes sent"
    );

    describe_counter!(
        format!("{}_verification_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Verification attempts by outcome"
    );

    describe_counter!(
        format!("{}_messages_sent_total", METRICS_PREFIX),
        Unit::Count,
        "SMS and emails handed to a provider"
    );

    describe_counter!(
        format!("{}_webhook_events_total", METRICS_PREFIX),
        Unit::Count,
        "Payment webhook events by type and outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    procedure: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(procedure: &str) -> Self {
        Self {
            start: Instant::now(),
            procedure: procedure.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "procedure" => self.procedure.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "procedure" => self.procedure
        )
        .record(duration);
    }
}

pub fn record_tokens_debited(amount: i64) {
    counter!(format!("{}_tokens_debited_total", METRICS_PREFIX)).increment(amount.max(0) as u64);
}

pub fn record_tokens_credited(amount: i64, source: &str) {
    counter!(
        format!("{}_tokens_credited_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(amount.max(0) as u64);
}

pub fn record_code_sent(channel: &str) {
    counter!(
        format!("{}_verification_codes_sent_total", METRICS_PREFIX),
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// `outcome` is one of `verified`, `mismatch`, `expired`, `locked`
pub fn record_verification_attempt(channel: &str, outcome: &str) {
    counter!(
        format!("{}_verification_attempts_total", METRICS_PREFIX),
        "channel" => channel.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_message_sent(kind: &str) {
    counter!(
        format!("{}_messages_sent_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_webhook_event(event_type: &str, outcome: &str) {
    counter!(
        format!("{}_webhook_events_total", METRICS_PREFIX),
        "type" => event_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op
        let metrics = RequestMetrics::start("catalog.unlockSheet");
        metrics.finish(200);
        record_tokens_debited(3);
        record_tokens_credited(50, "invoice");
        record_webhook_event("invoice.paid", "processed");
    }
}
