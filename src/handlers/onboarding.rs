// Onboarding handlers
// The first user is created here, as a server admin, while the user table
// is still empty. Afterwards the endpoints go inert.

use axum::{extract::State, Json};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::{
    app::AppState,
    models::User,
    services::TokenPair,
    utils::{trim_and_validate_field, ApiError},
};

use super::auth::device_label;

#[derive(Debug, Deserialize, Validate)]
pub struct OnboardRequest {
    #[validate(length(min = 1, max = 256, message = "Username cannot be empty"))]
    pub username: String,

    #[validate(length(min = 1, max = 128, message = "Name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,

    pub device: Option<String>,
}

/// GET /api/onboarding - true iff no user exists yet and onboarding is enabled
pub async fn onboarding_status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.config.disable_onboarding {
        return Ok(Json(json!({ "onboarding": false })));
    }

    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;
    let count = User::count(&mut conn).await?;

    Ok(Json(json!({ "onboarding": count == 0 })))
}

/// POST /api/onboarding - create the first (admin) user plus their initial
/// token pair. Refused once any user exists.
pub async fn onboard(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(payload): Json<OnboardRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::invalid_usage(e.to_string()))?;

    let username = trim_and_validate_field(&payload.username, true)
        .map_err(|_| ApiError::invalid_usage("Username cannot be empty"))?;
    let name = trim_and_validate_field(&payload.name, true)
        .map_err(|_| ApiError::invalid_usage("Name cannot be empty"))?;
    if payload.password.trim().is_empty() {
        return Err(ApiError::invalid_usage("Password cannot be empty"));
    }

    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    if state.config.disable_onboarding || User::count(&mut conn).await? > 0 {
        return Err(ApiError::invalid_usage("Onboarding not allowed"));
    }

    if User::find_by_username(&mut conn, &username).await?.is_some() {
        return Err(ApiError::invalid_usage("Username already exists"));
    }

    let user = User::create(&mut conn, &username, &payload.password, &name, true).await?;

    let device = device_label(payload.device.as_deref(), user_agent);
    let pair = state
        .token_service
        .issue_initial_pair(&mut conn, user.id, &device)
        .await?;

    info!(username = %user.username, "Onboarding complete; first admin user created");

    Ok(Json(pair))
}
