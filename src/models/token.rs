// Token store: one persisted record per issued credential
// Records form chained families: each refresh points at the refresh that
// minted it, each access points at the refresh that minted it. A record
// existing is what makes the credential valid; deletion is revocation.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::auth::TokenType;
use crate::schema::tokens;

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable,
)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Token {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub jti: String,
    pub typ: TokenType,
    /// Device label, carried down the family from the login that started it
    pub name: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Parent refresh; None for root refreshes, llt and fresh-login accesses
    pub refresh_token_id: Option<Uuid>,
    pub used: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tokens)]
pub struct NewToken {
    pub jti: String,
    pub typ: TokenType,
    pub name: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub refresh_token_id: Option<Uuid>,
    pub used: bool,
}

/// Errors for token store operations
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Token not found")]
    NotFound,
}

impl Token {
    async fn insert(conn: &mut AsyncPgConnection, record: NewToken) -> Result<Self, TokenError> {
        diesel::insert_into(tokens::table)
            .values(&record)
            .get_result::<Token>(conn)
            .await
            .map_err(TokenError::Database)
    }

    /// Persist an access record minted by `parent` (None for fresh-login accesses)
    pub async fn create_access(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        jti: &str,
        name: &str,
        parent: Option<&Token>,
    ) -> Result<Self, TokenError> {
        Self::insert(
            conn,
            NewToken {
                jti: jti.to_string(),
                typ: TokenType::Access,
                name: name.to_string(),
                user_id,
                created_at: Utc::now(),
                refresh_token_id: parent.map(|p| p.id),
                used: false,
            },
        )
        .await
    }

    /// Persist a refresh record; `parent` is the refresh it rotates from
    pub async fn create_refresh(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        jti: &str,
        name: &str,
        parent: Option<&Token>,
    ) -> Result<Self, TokenError> {
        Self::insert(
            conn,
            NewToken {
                jti: jti.to_string(),
                typ: TokenType::Refresh,
                name: name.to_string(),
                user_id,
                created_at: Utc::now(),
                refresh_token_id: parent.map(|p| p.id),
                used: false,
            },
        )
        .await
    }

    /// Persist a long-lived token record; no parent, never swept
    pub async fn create_longlived(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        jti: &str,
        name: &str,
    ) -> Result<Self, TokenError> {
        Self::insert(
            conn,
            NewToken {
                jti: jti.to_string(),
                typ: TokenType::Llt,
                name: name.to_string(),
                user_id,
                created_at: Utc::now(),
                refresh_token_id: None,
                used: false,
            },
        )
        .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<Option<Self>, TokenError> {
        tokens::table
            .find(token_id)
            .first::<Token>(conn)
            .await
            .optional()
            .map_err(TokenError::Database)
    }

    /// Primary lookup for the verify path
    pub async fn find_by_jti(
        conn: &mut AsyncPgConnection,
        jti_val: &str,
    ) -> Result<Option<Self>, TokenError> {
        tokens::table
            .filter(tokens::jti.eq(jti_val))
            .first::<Token>(conn)
            .await
            .optional()
            .map_err(TokenError::Database)
    }

    /// Lookup with a row lock, for rotation. FOR UPDATE serializes concurrent
    /// rotations on the same parent refresh; the replay check runs under it.
    pub async fn find_by_jti_for_update(
        conn: &mut AsyncPgConnection,
        jti_val: &str,
    ) -> Result<Option<Self>, TokenError> {
        use diesel::sql_types::Text;

        diesel::sql_query(
            "SELECT id, jti, typ, name, user_id, created_at, last_used_at, \
             refresh_token_id, used \
             FROM tokens WHERE jti = $1 FOR UPDATE",
        )
        .bind::<Text, _>(jti_val)
        .get_result::<Token>(conn)
        .await
        .optional()
        .map_err(TokenError::Database)
    }

    /// All sessions of a user, newest first (device listing)
    pub async fn find_by_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Vec<Self>, TokenError> {
        tokens::table
            .filter(tokens::user_id.eq(user_id_val))
            .order(tokens::created_at.desc())
            .load::<Token>(conn)
            .await
            .map_err(TokenError::Database)
    }

    /// Idempotent: marks the record observed and stamps last_used_at
    pub async fn mark_used(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<(), TokenError> {
        diesel::update(tokens::table.find(token_id))
            .set((
                tokens::used.eq(true),
                tokens::last_used_at.eq(Some(Utc::now())),
            ))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Direct children of a refresh record, filtered by kind
    pub async fn children_of(
        conn: &mut AsyncPgConnection,
        refresh_id: Uuid,
        typ_val: TokenType,
    ) -> Result<Vec<Self>, TokenError> {
        tokens::table
            .filter(tokens::refresh_token_id.eq(refresh_id))
            .filter(tokens::typ.eq(typ_val))
            .load::<Token>(conn)
            .await
            .map_err(TokenError::Database)
    }

    /// Load the complete family this token belongs to. One query fetches the
    /// user's tokens; the family is carved out in memory, so verification
    /// stays at a constant number of round trips regardless of chain depth.
    pub async fn family_of(&self, conn: &mut AsyncPgConnection) -> Result<Vec<Self>, TokenError> {
        let all = Self::find_by_user(conn, self.user_id).await?;
        Ok(Self::family_subset(&all, self))
    }

    /// The transitive family of `token` within the user's token set: walk
    /// parent pointers up to the root refresh, then breadth-first over
    /// children. Parents are always created before children, so the walk
    /// terminates. A user's other sessions are separate families and stay
    /// out of the result.
    fn family_subset(all: &[Token], token: &Token) -> Vec<Token> {
        let mut root = if token.typ == TokenType::Refresh {
            token.clone()
        } else {
            // An access anchors at its minting refresh; parentless tokens
            // (llt, fresh) stand alone
            match token
                .refresh_token_id
                .and_then(|id| all.iter().find(|t| t.id == id))
            {
                Some(parent) => parent.clone(),
                None => return vec![token.clone()],
            }
        };

        while let Some(parent) = root
            .refresh_token_id
            .and_then(|id| all.iter().find(|t| t.id == id))
        {
            root = parent.clone();
        }

        let mut family = vec![root.clone()];
        let mut frontier = vec![root.id];
        while !frontier.is_empty() {
            let batch: Vec<Token> = all
                .iter()
                .filter(|t| {
                    t.refresh_token_id
                        .is_some_and(|parent| frontier.contains(&parent))
                })
                .cloned()
                .collect();
            frontier = batch
                .iter()
                .filter(|t| t.typ == TokenType::Refresh)
                .map(|t| t.id)
                .collect();
            family.extend(batch);
        }

        family
    }

    /// Revoke the whole family: walk up to the oldest ancestor and delete it;
    /// the parent foreign key cascades through every descendant record.
    /// No-op for non-refresh tokens.
    pub async fn delete_family(&self, conn: &mut AsyncPgConnection) -> Result<(), TokenError> {
        if self.typ != TokenType::Refresh {
            return Ok(());
        }

        let mut token = self.clone();
        while let Some(parent_id) = token.refresh_token_id {
            match Self::find_by_id(conn, parent_id).await? {
                Some(parent) => token = parent,
                None => break,
            }
        }

        diesel::delete(tokens::table.find(token.id))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete one of the user's own sessions (device logout). Removing a
    /// refresh root takes its whole family with it through the cascade.
    pub async fn delete_by_id_for_user(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
        user_id_val: Uuid,
    ) -> Result<bool, TokenError> {
        let deleted = diesel::delete(
            tokens::table
                .find(token_id)
                .filter(tokens::user_id.eq(user_id_val)),
        )
        .execute(conn)
        .await?;
        Ok(deleted > 0)
    }

    /// Two-pass expiry sweep. Access records past their TTL go outright;
    /// a refresh past its TTL with no children is a dead leaf, so its whole
    /// family is gone too (nothing downstream can exist). llt never matches.
    pub async fn sweep_expired(
        conn: &mut AsyncPgConnection,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<(usize, usize), TokenError> {
        let now = Utc::now();

        let deleted_access = diesel::delete(
            tokens::table
                .filter(tokens::typ.eq(TokenType::Access))
                .filter(tokens::created_at.le(now - access_ttl)),
        )
        .execute(conn)
        .await?;

        let stale: Vec<Token> = tokens::table
            .filter(tokens::typ.eq(TokenType::Refresh))
            .filter(tokens::created_at.le(now - refresh_ttl))
            .load::<Token>(conn)
            .await?;

        let mut deleted_families = 0;
        for token in stale {
            let children = Self::children_of(conn, token.id, TokenType::Refresh).await?;
            if children.is_empty() {
                token.delete_family(conn).await?;
                deleted_families += 1;
            }
        }

        Ok((deleted_access, deleted_families))
    }

    /// Chain acceptance rule, evaluated over a loaded family snapshot.
    ///
    /// A token's chain position is its minting refresh (a refresh is its own
    /// position). The token is accepted iff every activated access in the
    /// family hangs off that position or one of its ancestors: once an access
    /// on a deeper or divergent branch has been used, the chain has moved on
    /// and this token is dead. Tokens without a position (llt, fresh-login
    /// accesses) are accepted as long as their record exists.
    pub fn chain_accepts(family: &[Token], token: &Token) -> bool {
        let position = match token.typ {
            TokenType::Refresh => Some(token.id),
            _ => token.refresh_token_id,
        };
        let Some(position) = position else {
            return true;
        };

        let mut allowed = HashSet::new();
        let mut cursor = Some(position);
        while let Some(id) = cursor {
            allowed.insert(id);
            cursor = family
                .iter()
                .find(|t| t.id == id)
                .and_then(|t| t.refresh_token_id);
        }

        family
            .iter()
            .filter(|t| t.typ == TokenType::Access && t.used)
            .all(|activated| {
                activated
                    .refresh_token_id
                    .is_none_or(|minted_by| allowed.contains(&minted_by))
            })
    }
}
