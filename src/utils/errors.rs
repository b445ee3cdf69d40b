// Core error taxonomy and the single translator to HTTP responses
// Every component raises one of these kinds; handlers bubble them up with `?`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidUsage(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Authorization required".to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Request forbidden".to_string())
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Requested resource not found".to_string())
    }

    pub fn invalid_usage(message: impl Into<String>) -> Self {
        ApiError::InvalidUsage(message.into())
    }

    /// Wrap an infrastructure failure. The detail is logged, never sent to the client.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidUsage(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => ApiError::not_found(),
            other => ApiError::internal(other),
        }
    }
}

impl From<crate::models::TokenError> for ApiError {
    fn from(err: crate::models::TokenError) -> Self {
        use crate::models::TokenError;
        match err {
            TokenError::NotFound => ApiError::not_found(),
            TokenError::Database(e) => e.into(),
        }
    }
}

impl From<crate::models::UserError> for ApiError {
    fn from(err: crate::models::UserError) -> Self {
        use crate::models::UserError;
        match err {
            UserError::NotFound => ApiError::not_found(),
            UserError::UsernameTaken => ApiError::invalid_usage("Username already exists"),
            UserError::Database(e) => e.into(),
            UserError::Password(e) => ApiError::internal(e),
        }
    }
}

// Credential verification failures all collapse to 401; only an encoding
// fault on our side is a server error.
impl From<crate::services::jwt::CodecError> for ApiError {
    fn from(err: crate::services::jwt::CodecError) -> Self {
        use crate::services::jwt::CodecError;
        match err {
            CodecError::Encoding(detail) => ApiError::internal(detail),
            _ => ApiError::unauthorized(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let msg = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            },
            other => other.to_string(),
        };

        (status, Json(json!({ "msg": msg }))).into_response()
    }
}
