// Authorization mediator for household-scoped operations
// Every handler operating inside a household declares the role it needs;
// the gate combines the principal, the membership row and that requirement.
//
// Cross-household contract: a resource may only reference another resource
// in the same household. Handlers joining resources must verify both sides
// share the household id and answer InvalidUsage otherwise.

use diesel_async::AsyncPgConnection;
use uuid::Uuid;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::HouseholdMember;
use crate::utils::ApiError;

/// Role a household-scoped handler requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRights {
    Member,
    Admin,
    /// Admin, or the operation targets the caller's own membership
    AdminOrSelf,
}

/// Decision core. `is_self` is None when the handler supplied no target
/// user id; that is a programmer error for AdminOrSelf and never a grant.
fn evaluate(
    server_admin: bool,
    membership: Option<&HouseholdMember>,
    required: RequiredRights,
    is_self: Option<bool>,
) -> Result<(), ApiError> {
    if required == RequiredRights::AdminOrSelf && is_self.is_none() {
        return Err(ApiError::internal(
            "authorize_household: AdminOrSelf requires a target user id",
        ));
    }

    if server_admin {
        return Ok(());
    }

    let Some(member) = membership else {
        // A non-member may still remove a stale reference to themselves
        if required == RequiredRights::AdminOrSelf && is_self == Some(true) {
            return Ok(());
        }
        return Err(ApiError::forbidden());
    };

    match required {
        RequiredRights::Member => Ok(()),
        RequiredRights::Admin if member.is_admin() => Ok(()),
        RequiredRights::AdminOrSelf if member.is_admin() || is_self == Some(true) => Ok(()),
        _ => Err(ApiError::forbidden()),
    }
}

/// Gate an operation on `household_id`. Pass `target_user_id` whenever the
/// route carries a user id parameter; AdminOrSelf demands it.
pub async fn authorize_household(
    conn: &mut AsyncPgConnection,
    user: &AuthenticatedUser,
    household_id: Uuid,
    required: RequiredRights,
    target_user_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let is_self = target_user_id.map(|target| target == user.id());

    // Misuse check applies before the server-admin bypass
    if required == RequiredRights::AdminOrSelf && is_self.is_none() {
        return Err(ApiError::internal(
            "authorize_household: AdminOrSelf requires a target user id",
        ));
    }

    if user.is_server_admin() {
        return Ok(());
    }

    let membership = HouseholdMember::find_by_ids(conn, household_id, user.id()).await?;
    evaluate(false, membership.as_ref(), required, is_self)
}
