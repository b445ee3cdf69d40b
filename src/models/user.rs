// User database model
// Usernames are stored lowercased and unique; deleting a user cascades to
// memberships and tokens through the schema's foreign keys.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::users;
use crate::utils::password::{hash_password, verify_password};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Password hashing failed: {0}")]
    Password(#[from] crate::utils::PasswordError),
}

impl User {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, UserError> {
        users::table
            .find(user_id)
            .first::<User>(conn)
            .await
            .optional()
            .map_err(UserError::Database)
    }

    pub async fn find_by_username(
        conn: &mut AsyncPgConnection,
        username_val: &str,
    ) -> Result<Option<Self>, UserError> {
        users::table
            .filter(users::username.eq(username_val.to_lowercase()))
            .first::<User>(conn)
            .await
            .optional()
            .map_err(UserError::Database)
    }

    pub async fn count(conn: &mut AsyncPgConnection) -> Result<i64, UserError> {
        users::table
            .count()
            .get_result::<i64>(conn)
            .await
            .map_err(UserError::Database)
    }

    pub async fn all(conn: &mut AsyncPgConnection) -> Result<Vec<Self>, UserError> {
        users::table
            .order(users::username.asc())
            .load::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Create a user with a hashed password. The username is lowercased;
    /// a unique-violation surfaces as `UsernameTaken`.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        username_val: &str,
        password: &str,
        name_val: &str,
        admin_val: bool,
    ) -> Result<Self, UserError> {
        let new_user = NewUser {
            username: username_val.to_lowercase(),
            password_hash: hash_password(password)?,
            name: name_val.to_string(),
            admin: admin_val,
            created_at: Utc::now(),
        };

        diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::UsernameTaken,
                other => UserError::Database(other),
            })
    }

    /// Constant-time password check against the stored Argon2id hash
    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash).unwrap_or(false)
    }

    /// Hard delete; memberships and tokens cascade
    pub async fn delete(&self, conn: &mut AsyncPgConnection) -> Result<(), UserError> {
        diesel::delete(users::table.find(self.id))
            .execute(conn)
            .await?;
        Ok(())
    }
}
