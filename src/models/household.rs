// Household and membership models
// A household is a multi-user workspace; membership rows carry the role
// flags the authorization gate reads. Exactly one owner per household,
// and an owner always counts as admin.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{household_members, households};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = households)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Household {
    pub id: Uuid,
    pub name: String,
    pub language: Option<String>,
    pub planner_feature: bool,
    pub expenses_feature: bool,
    pub view_ordering: Option<serde_json::Value>,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = households)]
pub struct NewHousehold {
    pub name: String,
    pub language: Option<String>,
    pub planner_feature: bool,
    pub expenses_feature: bool,
    pub view_ordering: Option<serde_json::Value>,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update; absent fields stay untouched
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = households)]
pub struct HouseholdUpdate {
    pub name: Option<String>,
    pub language: Option<String>,
    pub planner_feature: Option<bool>,
    pub expenses_feature: Option<bool>,
    pub view_ordering: Option<serde_json::Value>,
    pub photo: Option<String>,
}

impl HouseholdUpdate {
    fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.language.is_none()
            && self.planner_feature.is_none()
            && self.expenses_feature.is_none()
            && self.view_ordering.is_none()
            && self.photo.is_none()
    }
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Insertable,
)]
#[diesel(table_name = household_members)]
#[diesel(primary_key(household_id, user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HouseholdMember {
    pub household_id: Uuid,
    pub user_id: Uuid,
    pub owner: bool,
    pub admin: bool,
}

impl Household {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        household_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        households::table
            .find(household_id)
            .first::<Household>(conn)
            .await
            .optional()
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        record: NewHousehold,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(households::table)
            .values(&record)
            .get_result::<Household>(conn)
            .await
    }

    pub async fn update(
        &self,
        conn: &mut AsyncPgConnection,
        changes: HouseholdUpdate,
    ) -> Result<Self, diesel::result::Error> {
        // An empty changeset is not a query diesel will build
        if changes.is_noop() {
            return Ok(self.clone());
        }

        diesel::update(households::table.find(self.id))
            .set(&changes)
            .get_result::<Household>(conn)
            .await
    }

    /// Delete the household; membership rows cascade
    pub async fn delete(&self, conn: &mut AsyncPgConnection) -> Result<(), diesel::result::Error> {
        diesel::delete(households::table.find(self.id))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Households the user is a member of
    pub async fn find_by_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        let memberships = HouseholdMember::find_by_user(conn, user_id_val).await?;
        let ids: Vec<Uuid> = memberships.iter().map(|m| m.household_id).collect();

        households::table
            .filter(households::id.eq_any(ids))
            .load::<Household>(conn)
            .await
    }
}

impl HouseholdMember {
    /// Membership lookup by pair; the gate's hot path
    pub async fn find_by_ids(
        conn: &mut AsyncPgConnection,
        household_id_val: Uuid,
        user_id_val: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        household_members::table
            .find((household_id_val, user_id_val))
            .first::<HouseholdMember>(conn)
            .await
            .optional()
    }

    pub async fn find_by_household(
        conn: &mut AsyncPgConnection,
        household_id_val: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        household_members::table
            .filter(household_members::household_id.eq(household_id_val))
            .load::<HouseholdMember>(conn)
            .await
    }

    pub async fn find_by_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        household_members::table
            .filter(household_members::user_id.eq(user_id_val))
            .load::<HouseholdMember>(conn)
            .await
    }

    /// Create the founding membership; the creator owns the household
    pub async fn create_owner(
        conn: &mut AsyncPgConnection,
        household_id_val: Uuid,
        user_id_val: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        let record = HouseholdMember {
            household_id: household_id_val,
            user_id: user_id_val,
            owner: true,
            admin: true,
        };

        diesel::insert_into(household_members::table)
            .values(&record)
            .get_result::<HouseholdMember>(conn)
            .await
    }

    /// Insert or update a membership, preserving the owner flag on update
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        household_id_val: Uuid,
        user_id_val: Uuid,
        admin_val: bool,
    ) -> Result<Self, diesel::result::Error> {
        let record = HouseholdMember {
            household_id: household_id_val,
            user_id: user_id_val,
            owner: false,
            admin: admin_val,
        };

        diesel::insert_into(household_members::table)
            .values(&record)
            .on_conflict((
                household_members::household_id,
                household_members::user_id,
            ))
            .do_update()
            .set(household_members::admin.eq(admin_val))
            .get_result::<HouseholdMember>(conn)
            .await
    }

    pub async fn remove(
        conn: &mut AsyncPgConnection,
        household_id_val: Uuid,
        user_id_val: Uuid,
    ) -> Result<bool, diesel::result::Error> {
        let deleted = diesel::delete(
            household_members::table.find((household_id_val, user_id_val)),
        )
        .execute(conn)
        .await?;
        Ok(deleted > 0)
    }

    /// Owners always count as admins
    pub fn is_admin(&self) -> bool {
        self.admin || self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_implies_admin() {
        let member = HouseholdMember {
            household_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            owner: true,
            admin: false,
        };
        assert!(member.is_admin());

        let plain = HouseholdMember {
            owner: false,
            admin: false,
            ..member
        };
        assert!(!plain.is_admin());
    }
}
