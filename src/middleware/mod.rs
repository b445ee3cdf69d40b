// Middleware modules for the Hearth backend

pub mod auth;
pub mod auth_middleware;
pub mod authorize;

pub use auth::AuthenticatedUser;
pub use auth_middleware::{
    auth_middleware, bearer_token, fresh_auth_middleware, optional_auth_middleware,
};
pub use authorize::{authorize_household, RequiredRights};
