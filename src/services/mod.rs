// Services module for the Hearth backend
// Business logic layer for the application

pub mod background_tasks;
pub mod jwt;
pub mod token_family;

pub use background_tasks::{start_token_sweep, TaskQueue};
pub use jwt::{CodecError, JwtCodec};
pub use token_family::{TokenPair, TokenService};
