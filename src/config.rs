use serde::Deserialize;

/// Signing material for the two token populations. Access and refresh
/// tokens use distinct secrets, so one can never verify as the other.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Where the auth middleware looks for the access token. One policy per
/// deployment; there is no per-request fallback between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTransport {
    Cookie,
    Bearer,
}

impl TokenTransport {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "cookie" => Ok(Self::Cookie),
            "bearer" => Ok(Self::Bearer),
            other => anyhow::bail!("TOKEN_TRANSPORT must be 'cookie' or 'bearer', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub cors_origin: Option<String>,
    pub token_transport: TokenTransport,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let cors_origin = std::env::var("CORS_ORIGIN").ok();
        let token_transport = match std::env::var("TOKEN_TRANSPORT") {
            Ok(v) => TokenTransport::parse(&v)?,
            Err(_) => TokenTransport::Cookie,
        };
        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")?,
            access_ttl_minutes: std::env::var("ACCESS_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("REFRESH_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        Ok(Self {
            database_url,
            cors_origin,
            token_transport,
            jwt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_parses_known_values() {
        assert_eq!(
            TokenTransport::parse("cookie").unwrap(),
            TokenTransport::Cookie
        );
        assert_eq!(
            TokenTransport::parse("bearer").unwrap(),
            TokenTransport::Bearer
        );
    }

    #[test]
    fn transport_rejects_unknown_value() {
        let err = TokenTransport::parse("header").unwrap_err();
        assert!(err.to_string().contains("TOKEN_TRANSPORT"));
    }
}
