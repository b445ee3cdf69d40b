pub mod auth;
pub mod household;
pub mod token;
pub mod user;

pub use auth::{TokenClaims, TokenType};
pub use household::{Household, HouseholdMember, HouseholdUpdate, NewHousehold};
pub use token::{Token, TokenError};
pub use user::{User, UserError};
