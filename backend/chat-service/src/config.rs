use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Which conversations count toward the aggregate unread badge.
///
/// The product default only counts direct conversations; group chatter is
/// excluded from the badge. `UNREAD_BADGE_SCOPE=all` opts groups in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeScope {
    DirectOnly,
    All,
}

impl FromStr for BadgeScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct_only" | "direct" => Ok(BadgeScope::DirectOnly),
            "all" => Ok(BadgeScope::All),
            other => Err(format!("unknown badge scope: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub unread_badge_scope: BadgeScope,
    pub max_message_length: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8085);
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be blank".into()));
        }
        let unread_badge_scope = match env::var("UNREAD_BADGE_SCOPE") {
            Ok(raw) => raw.parse().map_err(AppError::Config)?,
            Err(_) => BadgeScope::DirectOnly,
        };
        let max_message_length = env::var("MAX_MESSAGE_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4000);

        Ok(Self {
            database_url,
            redis_url,
            port,
            jwt_secret,
            unread_badge_scope,
            max_message_length,
        })
    }

    /// Fixed configuration for test code; no environment reads.
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/chat_test".into(),
            redis_url: "redis://127.0.0.1:6379/1".into(),
            port: 8085,
            jwt_secret: "test-secret".into(),
            unread_badge_scope: BadgeScope::DirectOnly,
            max_message_length: 4000,
        }
    }
}

// Connection strings and the JWT secret must not leak through Debug logging.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("redis_url", &"<redacted>")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("unread_badge_scope", &self.unread_badge_scope)
            .field("max_message_length", &self.max_message_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_scope_parses_known_values() {
        assert_eq!(
            "direct_only".parse::<BadgeScope>().unwrap(),
            BadgeScope::DirectOnly
        );
        assert_eq!("all".parse::<BadgeScope>().unwrap(), BadgeScope::All);
        assert_eq!(" ALL ".parse::<BadgeScope>().unwrap(), BadgeScope::All);
        assert!("everything".parse::<BadgeScope>().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = Config::test_defaults();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("test-secret"));
        assert!(!rendered.contains("postgres://"));
    }
}
