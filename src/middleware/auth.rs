// Request-scoped principal
// Bound once per request by the auth middleware; handlers read it from
// request extensions. Never stored in process-global state.

use uuid::Uuid;

use crate::models::{TokenClaims, User};

/// The verified user behind the current request, with the claims that
/// admitted them
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: TokenClaims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    /// Server admins bypass household membership checks entirely
    pub fn is_server_admin(&self) -> bool {
        self.user.admin
    }

    /// True when the credential came from a password re-entry
    pub fn is_fresh(&self) -> bool {
        self.claims.fresh
    }
}
