use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::{
    auth::{cookies::ACCESS_COOKIE, jwt::JwtKeys},
    config::TokenTransport,
    error::ApiError,
    state::AppState,
    users::repo::User,
};

/// Verified request identity: the user row referenced by the access token.
/// Rejects with 401 when the token is missing, fails verification, or the
/// referenced user no longer exists.
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

fn locate_token(headers: &HeaderMap, transport: TokenTransport) -> Option<String> {
    match transport {
        TokenTransport::Cookie => CookieJar::from_headers(headers)
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string()),
        TokenTransport::Bearer => bearer_token(headers).map(str::to_string),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = locate_token(&parts.headers, state.config.token_transport)
            .ok_or_else(|| ApiError::unauthorized("Missing access token"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::unauthorized(e.to_string())
        })?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token references a deleted user");
                ApiError::unauthorized("Invalid access token")
            })?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parses_the_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_transport_reads_the_access_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; accessToken=tok123; other=1".parse().unwrap(),
        );
        assert_eq!(
            locate_token(&headers, TokenTransport::Cookie),
            Some("tok123".to_string())
        );
    }

    #[test]
    fn transports_do_not_fall_back_to_each_other() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer tok123".parse().unwrap());
        assert_eq!(locate_token(&headers, TokenTransport::Cookie), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "accessToken=tok123".parse().unwrap());
        assert_eq!(locate_token(&headers, TokenTransport::Bearer), None);
    }
}
