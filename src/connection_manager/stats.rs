//! Connection statistics

use serde::Serialize;

/// Transport-level connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    /// Connections registered with the manager
    pub total_connections: usize,
    /// Registered connections that have not been closed
    pub open_connections: usize,
}
