//! Presence lookup endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::presence::Session;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<Session>,
    pub total: usize,
}

/// GET /api/v1/users - Current presence snapshot
pub async fn list_users(State(state): State<AppState>) -> Json<UserListResponse> {
    let users = state.router.presence_snapshot().await;
    let total = users.len();

    Json(UserListResponse { users, total })
}

/// GET /api/v1/users/{username} - Session currently holding a username
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Session>> {
    state
        .router
        .find_session(&username)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User '{}' is not online", username)))
}
