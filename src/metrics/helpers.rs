//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    CONNECTIONS_OPEN, ENVELOPES_DROPPED, ENVELOPES_RECEIVED, EVICTIONS_TOTAL,
    MESSAGES_SENT_TOTAL, MESSAGES_SKIPPED_TOTAL, SESSIONS_ACTIVE, WS_CONNECTIONS_CLOSED,
    WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Helper struct for recording connection and session metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
        CONNECTIONS_OPEN.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        WS_CONNECTIONS_CLOSED.inc();
        CONNECTIONS_OPEN.dec();
        WS_CONNECTION_DURATION.observe(duration_secs);
    }

    pub fn set_active_sessions(count: usize) {
        SESSIONS_ACTIVE.set(count as i64);
    }

    pub fn record_eviction() {
        EVICTIONS_TOTAL.inc();
    }
}

/// Helper struct for recording inbound envelope metrics
pub struct EnvelopeMetrics;

impl EnvelopeMetrics {
    pub fn record_received(kind: &str) {
        ENVELOPES_RECEIVED.with_label_values(&[kind]).inc();
    }

    /// Envelope failed structural decode
    pub fn record_malformed() {
        ENVELOPES_DROPPED.with_label_values(&["malformed"]).inc();
    }

    /// Envelope from a connection without a session, or one already closed
    pub fn record_no_session() {
        ENVELOPES_DROPPED.with_label_values(&["no_session"]).inc();
    }

    /// Private chat addressed to a username that is not online
    pub fn record_unknown_target() {
        ENVELOPES_DROPPED.with_label_values(&["unknown_target"]).inc();
    }
}

/// Helper struct for recording outbound delivery metrics
pub struct OutboundMetrics;

impl OutboundMetrics {
    pub fn record_sent(count: u64) {
        MESSAGES_SENT_TOTAL.inc_by(count);
    }

    pub fn record_skipped(count: u64) {
        MESSAGES_SKIPPED_TOTAL.inc_by(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_includes_relay_collectors() {
        ConnectionMetrics::record_eviction();
        EnvelopeMetrics::record_malformed();

        let output = encode_metrics().unwrap();
        assert!(output.contains("relay_evictions_total"));
        assert!(output.contains(r#"relay_envelopes_dropped_total{reason="malformed"}"#));
    }
}
