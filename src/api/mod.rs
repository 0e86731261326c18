//! API layer - HTTP introspection endpoints.

mod health;
mod metrics;
mod presence;
mod routes;

pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use presence::{get_user, list_users};
pub use routes::api_routes;
