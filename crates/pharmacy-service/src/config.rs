//! Service configuration.

use std::str::FromStr;

/// Default lower bound of a single balance credit, in cents.
pub const DEFAULT_TOP_UP_MIN_CENTS: i64 = 100;

/// Default upper bound of a single balance credit, in cents.
pub const DEFAULT_TOP_UP_MAX_CENTS: i64 = 1_000_000;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/pharmacy").
    pub data_dir: String,

    /// HS256 secret for bearer tokens. Without it every user request is rejected.
    pub auth_jwt_secret: Option<String>,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Smallest accepted balance credit in cents.
    pub top_up_min_cents: i64,

    /// Largest accepted balance credit in cents.
    pub top_up_max_cents: i64,

    /// Attempts per settlement before giving up on lock conflicts.
    pub settlement_max_attempts: u32,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            top_up_min_cents: env_or("TOP_UP_MIN_CENTS", defaults.top_up_min_cents),
            top_up_max_cents: env_or("TOP_UP_MAX_CENTS", defaults.top_up_max_cents),
            settlement_max_attempts: env_or(
                "SETTLEMENT_MAX_ATTEMPTS",
                defaults.settlement_max_attempts,
            ),
        }
    }
}

/// Parse an environment variable, falling back when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "Ignoring malformed configuration value");
            default
        }),
        Err(_) => default,
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/pharmacy".into(),
            auth_jwt_secret: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            top_up_min_cents: DEFAULT_TOP_UP_MIN_CENTS,
            top_up_max_cents: DEFAULT_TOP_UP_MAX_CENTS,
            settlement_max_attempts: pharmacy_store::rocks::DEFAULT_MAX_ATTEMPTS,
        }
    }
}
