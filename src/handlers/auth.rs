// Authentication handlers: login, fresh-login, refresh, logout

use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, bearer_token},
    services::TokenPair,
    utils::{trim_optional_field, ApiError},
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 256, message = "Username cannot be empty"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,

    pub device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FreshLoginResponse {
    pub access_token: String,
}

/// Device label for the new session: explicit name, else user agent
pub(crate) fn device_label(
    device: Option<&str>,
    user_agent: Option<TypedHeader<UserAgent>>,
) -> String {
    trim_optional_field(device)
        .or_else(|| user_agent.map(|TypedHeader(ua)| ua.to_string()))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// POST /api/auth - verify credentials and root a new token family
pub async fn login(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::invalid_usage(e.to_string()))?;

    let device = device_label(payload.device.as_deref(), user_agent);
    let pair = state
        .token_service
        .login(&payload.username, &payload.password, &device)
        .await?;

    Ok(Json(pair))
}

/// POST /api/auth/fresh-login - password re-entry for privileged operations;
/// mints a fresh access credential without touching the refresh chain
pub async fn fresh_login(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<FreshLoginResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::invalid_usage(e.to_string()))?;

    let device = device_label(payload.device.as_deref(), user_agent);
    let access_token = state
        .token_service
        .fresh_login(&payload.username, &payload.password, &device)
        .await?;

    Ok(Json(FreshLoginResponse { access_token }))
}

/// GET /api/auth/refresh - the bearer credential is the refresh token;
/// exchanges it for a new pair, revoking the family on replay
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthorized)?;
    let pair = state.token_service.refresh(token).await?;
    Ok(Json(pair))
}

/// DELETE /api/auth - log out this device: the presented credential's
/// whole family is deleted
pub async fn logout(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.token_service.logout(&principal.claims).await?;
    Ok(Json(serde_json::json!({ "msg": "DONE" })))
}
