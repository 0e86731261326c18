use axum::{routing::get, Router};

use crate::server::AppState;

use super::{get_user, health, list_users, prometheus_metrics, stats};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Presence
        .nest(
            "/api/v1",
            Router::new()
                .route("/users", get(list_users))
                .route("/users/{username}", get(get_user)),
        )
}
