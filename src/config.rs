use std::env;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

const MIN_SECRET_LEN: usize = 32;
/// Longest session lifetime accepted from `JWT_TTL_HOURS` (one year).
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    /// Deliver in the request task after the primary write.
    Inline,
    /// Hand off to a background worker.
    Queued,
}

impl FromStr for NotifyMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(NotifyMode::Inline),
            "queued" => Ok(NotifyMode::Queued),
            _ => Err(()),
        }
    }
}

/// Cache lifetimes in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub post_detail: u64,
    pub feed: u64,
    pub social_graph: u64,
    pub user_profile: u64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self { post_detail: 1800, feed: 1800, social_graph: 900, user_profile: 3600 }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Shared secret the identity front end presents on `POST /auth/signin`.
    /// Sign-in is disabled while unset.
    pub identity_secret: Option<String>,
    /// Lowercased emails promoted to ADMIN when they sign in.
    pub bootstrap_admin_emails: Vec<String>,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub frontend_url: String,
    pub cache_ttl: CacheTtl,
    pub notify_mode: NotifyMode,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let defaults = CacheTtl::default();
        Ok(Self {
            jwt_secret,
            jwt_ttl_hours: jwt_ttl(parsed("JWT_TTL_HOURS", 24)?)?,
            identity_secret: env::var("IDENTITY_SHARED_SECRET").ok().filter(|s| !s.trim().is_empty()),
            bootstrap_admin_emails: email_list(&env::var("BOOTSTRAP_ADMIN_EMAILS").unwrap_or_default()),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cache_ttl: CacheTtl {
                post_detail: parsed("CACHE_TTL_POST_DETAIL", defaults.post_detail)?,
                feed: parsed("CACHE_TTL_FEED", defaults.feed)?,
                social_graph: parsed("CACHE_TTL_SOCIAL_GRAPH", defaults.social_graph)?,
                user_profile: parsed("CACHE_TTL_USER_PROFILE", defaults.user_profile)?,
            },
            notify_mode: parsed("NOTIFY_MODE", NotifyMode::Queued)?,
        })
    }

    /// Fixed configuration for tests and local tooling.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_ttl_hours: 24,
            identity_secret: None,
            bootstrap_admin_emails: Vec::new(),
            database_url: None,
            database_max_connections: 5,
            bind_addr: "127.0.0.1:0".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            cache_ttl: CacheTtl::default(),
            notify_mode: NotifyMode::Inline,
        }
    }
}

fn jwt_ttl(hours: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_JWT_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid { var: "JWT_TTL_HOURS", value: hours.to_string() })
    }
}

fn email_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect()
}

fn parsed<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
