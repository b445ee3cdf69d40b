// Utility modules for the Hearth backend

pub mod errors;
pub mod password;
pub mod validation;

pub use errors::ApiError;
pub use password::{hash_password, verify_password, PasswordError};
pub use validation::{trim_and_validate_field, trim_optional_field};
