// Token family manager: issuance, rotation, replay detection, revocation
// A refresh credential is single-use; exchanging it mints a child pair.
// Using a refresh again is tolerated only until the chain has visibly
// moved on (an access on another branch got activated). From then on the
// presenter is holding a stolen or stale credential and the whole family
// is revoked.

use chrono::Duration;
use diesel_async::AsyncPgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::auth::{TokenClaims, TokenType};
use crate::models::token::Token;
use crate::models::user::User;
use crate::services::jwt::JwtCodec;
use crate::utils::ApiError;

/// The pair returned by login and rotation
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

enum RotationOutcome {
    Rotated(TokenPair),
    /// Replay detected; the family was already deleted inside the transaction
    Replayed,
}

pub struct TokenService {
    codec: JwtCodec,
    db_pool: DieselPool,
}

impl TokenService {
    pub fn new(codec: JwtCodec, db_pool: DieselPool) -> Self {
        Self { codec, db_pool }
    }

    pub fn from_config(config: &crate::app_config::AppConfig, db_pool: DieselPool) -> Self {
        Self::new(JwtCodec::from_config(&config.jwt), db_pool)
    }

    pub fn codec(&self) -> &JwtCodec {
        &self.codec
    }

    async fn conn(
        &self,
    ) -> Result<
        bb8::PooledConnection<
            '_,
            diesel_async::pooled_connection::AsyncDieselConnectionManager<AsyncPgConnection>,
        >,
        ApiError,
    > {
        self.db_pool.get().await.map_err(ApiError::internal)
    }

    /// Mint a refresh + access pair for the user. `parent` chains the new
    /// refresh into an existing family; None roots a new one (login).
    async fn issue_pair(
        codec: &JwtCodec,
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        device: &str,
        parent: Option<&Token>,
    ) -> Result<TokenPair, ApiError> {
        let (refresh_envelope, refresh_claims) = codec.issue(user_id, TokenType::Refresh, false)?;
        let refresh_row =
            Token::create_refresh(conn, user_id, &refresh_claims.jti, device, parent).await?;

        let (access_envelope, access_claims) = codec.issue(user_id, TokenType::Access, false)?;
        Token::create_access(conn, user_id, &access_claims.jti, device, Some(&refresh_row))
            .await?;

        Ok(TokenPair {
            access_token: access_envelope,
            refresh_token: refresh_envelope,
        })
    }

    async fn authenticate(
        conn: &mut AsyncPgConnection,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let user = User::find_by_username(conn, username).await?;

        match user {
            Some(user) if user.check_password(password) => Ok(user),
            _ => {
                warn!(username = %username.to_lowercase(), "Login failed");
                Err(ApiError::unauthorized())
            },
        }
    }

    /// Login: verify the password and root a fresh family
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        device: &str,
    ) -> Result<TokenPair, ApiError> {
        let mut conn = self.conn().await?;
        let user = Self::authenticate(&mut conn, username, password).await?;

        Self::issue_pair(&self.codec, &mut conn, user.id, device, None).await
    }

    /// Fresh-login: password re-entry mints a single access credential with
    /// `fresh=true` and no refresh, leaving the existing chain untouched.
    pub async fn fresh_login(
        &self,
        username: &str,
        password: &str,
        device: &str,
    ) -> Result<String, ApiError> {
        let mut conn = self.conn().await?;
        let user = Self::authenticate(&mut conn, username, password).await?;

        let (envelope, claims) = self.codec.issue(user.id, TokenType::Access, true)?;
        Token::create_access(&mut conn, user.id, &claims.jti, device, None).await?;

        Ok(envelope)
    }

    /// Issue the first token pair for a just-created user (onboarding)
    pub async fn issue_initial_pair(
        &self,
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        device: &str,
    ) -> Result<TokenPair, ApiError> {
        Self::issue_pair(&self.codec, conn, user_id, device, None).await
    }

    /// Verify an inbound access credential and bind it to its user.
    /// The record must exist, sit on the still-canonical part of its chain,
    /// and resolve to a live user. Acceptance marks the record used.
    pub async fn verify_access(&self, envelope: &str) -> Result<(User, TokenClaims), ApiError> {
        let claims = self.codec.decode(envelope).map_err(ApiError::from)?;
        if claims.typ == TokenType::Refresh {
            return Err(ApiError::unauthorized());
        }

        let mut conn = self.conn().await?;

        let record = Token::find_by_jti(&mut conn, &claims.jti)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        if record.typ != claims.typ {
            return Err(ApiError::unauthorized());
        }

        let family = record.family_of(&mut conn).await?;
        if !Token::chain_accepts(&family, &record) {
            warn!(
                user_id = %record.user_id,
                device = %record.name,
                "Stale access credential presented after its chain moved on"
            );
            return Err(ApiError::unauthorized());
        }

        Token::mark_used(&mut conn, record.id).await?;

        let user = User::find_by_id(&mut conn, claims.sub)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok((user, claims))
    }

    /// Exchange a refresh credential for a new pair, enforcing single-use.
    /// Runs as one transaction: the parent row is locked, the replay check
    /// evaluated under the lock, and either both children are persisted with
    /// the parent marked used, or (on detection) the family is gone.
    pub async fn refresh(&self, envelope: &str) -> Result<TokenPair, ApiError> {
        let claims = self.codec.decode(envelope).map_err(ApiError::from)?;
        if claims.typ != TokenType::Refresh {
            return Err(ApiError::unauthorized());
        }

        let codec = self.codec.clone();
        let jti = claims.jti.clone();
        let user_id = claims.sub;

        let mut conn = self.conn().await?;

        use diesel_async::AsyncConnection;
        let outcome = conn
            .transaction::<RotationOutcome, ApiError, _>(|tx| {
                Box::pin(async move {
                    let Some(record) = Token::find_by_jti_for_update(tx, &jti).await? else {
                        return Err(ApiError::unauthorized());
                    };

                    if record.typ != TokenType::Refresh {
                        // A non-refresh credential in the refresh slot is a
                        // forgery attempt; burn whatever chain it hangs on
                        warn!(user_id = %record.user_id, "Non-refresh credential presented for rotation");
                        if let Some(parent_id) = record.refresh_token_id {
                            if let Some(parent) = Token::find_by_id(tx, parent_id).await? {
                                parent.delete_family(tx).await?;
                            }
                        }
                        return Ok(RotationOutcome::Replayed);
                    }

                    let family = record.family_of(tx).await?;
                    if !Token::chain_accepts(&family, &record) {
                        warn!(
                            user_id = %record.user_id,
                            device = %record.name,
                            "Refresh replay after rotation; revoking token family"
                        );
                        record.delete_family(tx).await?;
                        return Ok(RotationOutcome::Replayed);
                    }

                    if User::find_by_id(tx, user_id).await?.is_none() {
                        return Err(ApiError::unauthorized());
                    }

                    let pair =
                        Self::issue_pair(&codec, tx, user_id, &record.name, Some(&record)).await?;
                    Token::mark_used(tx, record.id).await?;

                    Ok(RotationOutcome::Rotated(pair))
                })
            })
            .await?;

        match outcome {
            RotationOutcome::Rotated(pair) => Ok(pair),
            RotationOutcome::Replayed => Err(ApiError::unauthorized()),
        }
    }

    /// Log out the session behind a verified credential: the whole family
    /// for chained tokens, just the row for parentless ones.
    pub async fn logout(&self, claims: &TokenClaims) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;

        let Some(record) = Token::find_by_jti(&mut conn, &claims.jti).await? else {
            return Ok(());
        };

        match (record.typ, record.refresh_token_id) {
            (TokenType::Refresh, _) => record.delete_family(&mut conn).await?,
            (_, Some(parent_id)) => {
                if let Some(parent) = Token::find_by_id(&mut conn, parent_id).await? {
                    parent.delete_family(&mut conn).await?;
                }
            },
            (_, None) => {
                Token::delete_by_id_for_user(&mut conn, record.id, record.user_id).await?;
            },
        }

        Ok(())
    }

    /// Mint a long-lived token for the user; admin/fresh gating happens in
    /// the handler. Never expires, never swept.
    pub async fn create_longlived_token(
        &self,
        user_id: Uuid,
        device: &str,
    ) -> Result<String, ApiError> {
        let mut conn = self.conn().await?;

        let (envelope, claims) = self.codec.issue(user_id, TokenType::Llt, false)?;
        Token::create_longlived(&mut conn, user_id, &claims.jti, device).await?;

        Ok(envelope)
    }

    /// The user's sessions: refresh chains and long-lived tokens
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Token>, ApiError> {
        let mut conn = self.conn().await?;
        let rows = Token::find_by_user(&mut conn, user_id).await?;
        Ok(rows
            .into_iter()
            .filter(|t| t.typ != TokenType::Access)
            .collect())
    }

    /// Revoke one of the user's own sessions by token id
    pub async fn revoke_session(&self, user_id: Uuid, token_id: Uuid) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;

        let record = Token::find_by_id(&mut conn, token_id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(ApiError::not_found)?;

        match record.typ {
            TokenType::Refresh => record.delete_family(&mut conn).await?,
            _ => {
                Token::delete_by_id_for_user(&mut conn, record.id, user_id).await?;
            },
        }

        Ok(())
    }

    /// Expiry sweep: run periodically; deletions are idempotent
    pub async fn sweep_expired(&self) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;

        let access_ttl = Duration::seconds(self.codec.access_expiry() as i64);
        let refresh_ttl = Duration::seconds(self.codec.refresh_expiry() as i64);

        let (accesses, families) = Token::sweep_expired(&mut conn, access_ttl, refresh_ttl).await?;
        if accesses > 0 || families > 0 {
            info!(
                expired_access = accesses,
                expired_families = families,
                "Token expiry sweep completed"
            );
        }

        Ok(())
    }
}
