// Credential claim structures carried by the signed token envelope

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of issued credential, stored both in the envelope and the token row
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer admitting the holder to most operations
    Access,
    /// Long-lived bearer whose sole operation is minting a new pair
    Refresh,
    /// Long-lived token issued by the admin flow, never expires
    Llt,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::Llt => "llt",
        }
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            "llt" => Ok(TokenType::Llt),
            _ => Err(format!("Invalid token type: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for TokenType
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for TokenType
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

/// Claim set inside the signed envelope: `{sub, jti, typ, iat, exp?, fresh?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject: the user id
    pub sub: Uuid,

    /// Credential id, matches the persisted token row (UUID format)
    pub jti: String,

    /// Credential kind
    pub typ: TokenType,

    /// Issuer identifier
    pub iss: String,

    /// Issued at (Unix epoch seconds)
    pub iat: u64,

    /// Expires at (Unix epoch seconds); absent on llt credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Set on credentials minted by a password re-entry
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fresh: bool,
}

impl TokenClaims {
    pub fn new(
        user_id: Uuid,
        typ: TokenType,
        issuer: String,
        issued_at: u64,
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            typ,
            iss: issuer,
            iat: issued_at,
            exp: ttl_seconds.map(|ttl| issued_at + ttl),
            fresh: false,
        }
    }

    pub fn with_fresh(mut self) -> Self {
        self.fresh = true;
        self
    }

    /// Check expiry against the given clock; llt claims never expire
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_structure() {
        let user_id = Uuid::new_v4();
        let claims = TokenClaims::new(user_id, TokenType::Access, "hearth".to_string(), 1000, Some(600));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.iat, 1000);
        assert_eq!(claims.exp, Some(1600));
        assert!(!claims.fresh);
        assert_eq!(claims.jti.len(), 36);
    }

    #[test]
    fn test_llt_claims_have_no_expiry() {
        let claims = TokenClaims::new(
            Uuid::new_v4(),
            TokenType::Llt,
            "hearth".to_string(),
            1000,
            None,
        );

        assert_eq!(claims.exp, None);
        assert!(!claims.is_expired(u64::MAX));

        // exp must vanish from the serialized envelope entirely
        let json = serde_json::to_value(&claims).expect("Should serialize");
        assert!(json.get("exp").is_none());
        assert!(json.get("fresh").is_none());
    }

    #[test]
    fn test_expiry_check() {
        let claims = TokenClaims::new(
            Uuid::new_v4(),
            TokenType::Access,
            "hearth".to_string(),
            1000,
            Some(600),
        );

        assert!(!claims.is_expired(1599));
        assert!(claims.is_expired(1600));
        assert!(claims.is_expired(2000));
    }

    #[test]
    fn test_fresh_flag_round_trip() {
        let claims = TokenClaims::new(
            Uuid::new_v4(),
            TokenType::Access,
            "hearth".to_string(),
            1000,
            Some(600),
        )
        .with_fresh();

        let json = serde_json::to_string(&claims).expect("Should serialize");
        let decoded: TokenClaims = serde_json::from_str(&json).expect("Should deserialize");

        assert!(decoded.fresh);
        assert_eq!(claims, decoded);
    }

    #[test]
    fn test_token_type_round_trip() {
        for typ in [TokenType::Access, TokenType::Refresh, TokenType::Llt] {
            assert_eq!(typ.as_str().parse::<TokenType>().unwrap(), typ);
        }
        assert!("session".parse::<TokenType>().is_err());
    }
}
