//! Prometheus metrics for the presence relay.
//!
//! - Connection metrics (open connections, opened/closed totals, duration)
//! - Session metrics (active sessions, evictions)
//! - Envelope metrics (received by kind, dropped by reason)
//! - Outbound metrics (messages queued or skipped per connection)

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, EnvelopeMetrics, OutboundMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of open WebSocket connections
    pub static ref CONNECTIONS_OPEN: IntGauge = register_int_gauge!(
        format!("{}_connections_open", METRIC_PREFIX),
        "Number of open WebSocket connections"
    ).unwrap();

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection lifetime in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    // ============================================================================
    // Session Metrics
    // ============================================================================

    /// Number of logged-in identities
    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_sessions_active", METRIC_PREFIX),
        "Number of logged-in sessions"
    ).unwrap();

    /// Logins that forced an older connection for the same username closed
    pub static ref EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_evictions_total", METRIC_PREFIX),
        "Total sessions evicted by a newer login"
    ).unwrap();

    // ============================================================================
    // Envelope Metrics
    // ============================================================================

    pub static ref ENVELOPES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_envelopes_received_total", METRIC_PREFIX),
        "Decoded inbound envelopes by kind",
        &["kind"]
    ).unwrap();

    pub static ref ENVELOPES_DROPPED: IntCounterVec = register_int_counter_vec!(
        format!("{}_envelopes_dropped_total", METRIC_PREFIX),
        "Inbound envelopes dropped without effect, by reason",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Outbound Metrics
    // ============================================================================

    pub static ref MESSAGES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Outbound messages queued to a connection"
    ).unwrap();

    pub static ref MESSAGES_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_skipped_total", METRIC_PREFIX),
        "Outbound messages skipped because the connection was closed or full"
    ).unwrap();
}
