// Credential codec: signed HS256 envelopes around the claim set
// Verification failures collapse to three kinds: bad signature, expired,
// malformed. Expiry is checked here against the claim because llt
// envelopes legitimately carry no exp at all.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{TokenClaims, TokenType};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Bad signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,

    #[error("Encoding error: {0}")]
    Encoding(String),
}

#[derive(Clone)]
pub struct JwtCodec {
    issuer: String,
    access_expiry: u64,
    refresh_expiry: u64,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

impl JwtCodec {
    pub fn new(secret: &str, issuer: String, access_expiry: u64, refresh_expiry: u64) -> Self {
        Self {
            issuer,
            access_expiry,
            refresh_expiry,
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_config(config: &crate::app_config::JwtConfig) -> Self {
        Self::new(
            &config.secret,
            config.issuer.clone(),
            config.access_expiry,
            config.refresh_expiry,
        )
    }

    pub fn access_expiry(&self) -> u64 {
        self.access_expiry
    }

    pub fn refresh_expiry(&self) -> u64 {
        self.refresh_expiry
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Mint a signed envelope of the given kind. Access envelopes get the
    /// short TTL, refresh the long one, llt none at all.
    pub fn issue(
        &self,
        user_id: Uuid,
        typ: TokenType,
        fresh: bool,
    ) -> Result<(String, TokenClaims), CodecError> {
        let ttl = match typ {
            TokenType::Access => Some(self.access_expiry),
            TokenType::Refresh => Some(self.refresh_expiry),
            TokenType::Llt => None,
        };

        let mut claims = TokenClaims::new(user_id, typ, self.issuer.clone(), Self::now(), ttl);
        if fresh {
            claims = claims.with_fresh();
        }

        let envelope = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;

        Ok((envelope, claims))
    }

    /// Verify signature, issuer and expiry, returning the claim set.
    pub fn decode(&self, envelope: &str) -> Result<TokenClaims, CodecError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[self.issuer.clone()]);
        // exp is optional (llt); checked manually below
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["iss"]);

        let data =
            decode::<TokenClaims>(envelope, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => CodecError::BadSignature,
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => CodecError::Expired,
                    _ => CodecError::Malformed,
                }
            })?;

        if data.claims.is_expired(Self::now()) {
            return Err(CodecError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> JwtCodec {
        JwtCodec::new(
            "test-secret-hs256",
            "hearth-test".to_string(),
            600,
            2_419_200,
        )
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();

        for typ in [TokenType::Access, TokenType::Refresh, TokenType::Llt] {
            let (envelope, claims) = codec.issue(user_id, typ, false).expect("issue");
            let decoded = codec.decode(&envelope).expect("decode");
            assert_eq!(decoded, claims);
            assert_eq!(decoded.sub, user_id);
            assert_eq!(decoded.typ, typ);
        }
    }

    #[test]
    fn test_fresh_flag_survives_the_envelope() {
        let codec = test_codec();
        let (envelope, _) = codec
            .issue(Uuid::new_v4(), TokenType::Access, true)
            .expect("issue");

        let decoded = codec.decode(&envelope).expect("decode");
        assert!(decoded.fresh);
    }

    #[test]
    fn test_llt_envelope_never_expires() {
        let codec = test_codec();
        let (envelope, claims) = codec
            .issue(Uuid::new_v4(), TokenType::Llt, false)
            .expect("issue");

        assert_eq!(claims.exp, None);
        assert!(codec.decode(&envelope).is_ok());
    }

    #[test]
    fn test_expired_envelope_rejected() {
        let codec = test_codec();
        let now = JwtCodec::now();

        let mut claims = TokenClaims::new(
            Uuid::new_v4(),
            TokenType::Access,
            "hearth-test".to_string(),
            now - 1200,
            Some(600),
        );
        claims.exp = Some(now - 600);

        let envelope = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret-hs256"),
        )
        .expect("encode");

        assert!(matches!(codec.decode(&envelope), Err(CodecError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = test_codec();
        let other = JwtCodec::new("other-secret", "hearth-test".to_string(), 600, 2_419_200);

        let (envelope, _) = other
            .issue(Uuid::new_v4(), TokenType::Access, false)
            .expect("issue");

        assert!(matches!(
            codec.decode(&envelope),
            Err(CodecError::BadSignature)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let codec = test_codec();
        let other = JwtCodec::new(
            "test-secret-hs256",
            "someone-else".to_string(),
            600,
            2_419_200,
        );

        let (envelope, _) = other
            .issue(Uuid::new_v4(), TokenType::Access, false)
            .expect("issue");

        assert!(matches!(codec.decode(&envelope), Err(CodecError::Malformed)));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = test_codec();
        assert!(matches!(
            codec.decode("not.a.token"),
            Err(CodecError::Malformed)
        ));
        assert!(matches!(codec.decode(""), Err(CodecError::Malformed)));
    }
}
