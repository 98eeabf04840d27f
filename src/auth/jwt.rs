use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState, users::repo::User};

/// Verification failure, split so callers can tell an expired session from
/// a forged or garbled token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// Access-token payload: the identity plus the profile fields handlers may
/// render without a store round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub mobile_number: String,
    pub iat: usize,
    pub exp: usize,
}

/// Refresh-token payload carries the identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys for both token populations.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes),
        }
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessClaims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            mobile_number: user.mobile_number.clone(),
            iat: now.unix_timestamp() as usize,
            exp: (now + self.access_ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = RefreshClaims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: (now + self.refresh_ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user_id, "refresh token signed");
        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn make_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            full_name: "Alice A".into(),
            mobile_number: "1234567890".into(),
            password_hash: "$argon2id$fake".into(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_roundtrips_profile_payload() {
        let keys = make_keys();
        let user = make_user();
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify access");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.full_name, "Alice A");
        assert_eq!(claims.mobile_number, "1234567890");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_carries_only_the_id() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn secrets_are_distinct_across_populations() {
        let keys = make_keys();
        let user = make_user();
        let access = keys.sign_access(&user).unwrap();
        let refresh = keys.sign_refresh(user.id).unwrap();

        assert!(matches!(
            keys.verify_refresh(&access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            keys.verify_access(&refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expired_token_is_distinguishable_from_malformed() {
        // Negative TTL puts exp far enough in the past to clear the
        // validator's default leeway.
        let keys = JwtKeys::new(&JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: -5,
            refresh_ttl_minutes: -5,
        });
        let user = make_user();
        let stale = keys.sign_access(&user).unwrap();
        assert!(matches!(
            keys.verify_access(&stale),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            keys.verify_access("garbage.token.here"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let keys = make_keys();
        let other = JwtKeys::new(&JwtConfig {
            access_secret: "some-other-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        });
        let token = other.sign_access(&make_user()).unwrap();
        assert!(matches!(
            keys.verify_access(&token),
            Err(TokenError::Invalid)
        ));
    }
}
