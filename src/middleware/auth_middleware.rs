// Request adapter: extracts the bearer credential, runs verification and
// binds the principal into request extensions for the handler chain.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::AppState, middleware::auth::AuthenticatedUser, utils::ApiError};

/// Pull the bearer credential out of the Authorization header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Require a valid access credential; binds `AuthenticatedUser`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return ApiError::unauthorized().into_response();
    };

    match state.token_service.verify_access(&token).await {
        Ok((user, claims)) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { user, claims });
            next.run(request).await
        },
        Err(e) => e.into_response(),
    }
}

/// Require a fresh credential on top of normal authentication. Runs inside
/// `auth_middleware`, so the principal is already bound; only the fresh
/// claim is checked here.
pub async fn fresh_auth_middleware(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<AuthenticatedUser>() {
        Some(principal) if principal.is_fresh() => next.run(request).await,
        Some(_) => {
            ApiError::Unauthorized("Fresh authorization required".to_string()).into_response()
        },
        None => ApiError::unauthorized().into_response(),
    }
}

/// Verify only when a credential is present. Absence is not an error;
/// an invalid credential is.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return next.run(request).await;
    };

    match state.token_service.verify_access(&token).await {
        Ok((user, claims)) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { user, claims });
            next.run(request).await
        },
        Err(e) => e.into_response(),
    }
}

/// Extractor so handlers can take `AuthenticatedUser` as a parameter
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}
