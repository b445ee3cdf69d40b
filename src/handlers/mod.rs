// HTTP handlers and route builders

pub mod auth;
pub mod household;
pub mod onboarding;
pub mod user;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::app::AppState;
use crate::middleware::{auth_middleware, fresh_auth_middleware, optional_auth_middleware};

/// /api/auth: login, fresh-login and refresh are public; logout needs a
/// verified principal
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", delete(auth::logout))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/", post(auth::login))
        .route("/fresh-login", post(auth::fresh_login))
        .route("/refresh", get(auth::refresh))
        .merge(protected)
}

/// /api/onboarding: public, but a presented credential must still be valid
pub fn onboarding_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(onboarding::onboarding_status).post(onboarding::onboard),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            optional_auth_middleware,
        ))
}

/// /api/user: profile and session management; token minting additionally
/// demands a fresh credential
pub fn user_routes() -> Router<AppState> {
    let fresh = Router::new()
        .route("/tokens", post(user::create_longlived_token))
        .route_layer(axum_middleware::from_fn(fresh_auth_middleware));

    Router::new()
        .route("/", get(user::get_current_user))
        .route("/all", get(user::get_all_users))
        .route("/sessions", get(user::list_sessions))
        .route("/sessions/{id}", delete(user::revoke_session))
        .merge(fresh)
}

/// /api/household: CRUD plus member management
pub fn household_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(household::get_user_households).post(household::add_household),
        )
        .route(
            "/{household_id}",
            get(household::get_household)
                .put(household::update_household)
                .delete(household::delete_household),
        )
        .route(
            "/{household_id}/member",
            get(household::get_household_members),
        )
        .route(
            "/{household_id}/member/{user_id}",
            put(household::put_household_member).delete(household::delete_household_member),
        )
}
