// Current-user handlers: profile, sessions, long-lived tokens

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{Token, User},
    utils::ApiError,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[validate(length(min = 1, max = 256, message = "Device name cannot be empty"))]
    pub device: String,
}

/// GET /api/user - the authenticated principal
pub async fn get_current_user(principal: AuthenticatedUser) -> Json<User> {
    Json(principal.user)
}

/// GET /api/user/all - every user, for member pickers. Password hashes
/// never serialize.
pub async fn get_all_users(
    State(state): State<AppState>,
    _principal: AuthenticatedUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;
    let users = User::all(&mut conn).await?;
    Ok(Json(users))
}

/// POST /api/user/tokens - mint a long-lived token for integrations.
/// The route sits behind the fresh-credential gate.
pub async fn create_longlived_token(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::invalid_usage(e.to_string()))?;

    let token = state
        .token_service
        .create_longlived_token(principal.id(), payload.device.trim())
        .await?;

    Ok(Json(json!({ "token": token })))
}

/// GET /api/user/sessions - refresh chains and long-lived tokens
pub async fn list_sessions(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Json<Vec<Token>>, ApiError> {
    let sessions = state.token_service.list_sessions(principal.id()).await?;
    Ok(Json(sessions))
}

/// DELETE /api/user/sessions/{id} - revoke one of the caller's sessions
pub async fn revoke_session(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(token_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .token_service
        .revoke_session(principal.id(), token_id)
        .await?;

    Ok(Json(json!({ "msg": "DONE" })))
}
