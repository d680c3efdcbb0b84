use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (result cache + job queues)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Base URL of the content-indexing service
    pub indexer_api_url: String,

    /// Attempts per external fetch before giving up (default: 5)
    pub fetch_max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles each attempt (default: 1000)
    pub fetch_initial_delay_ms: u64,

    /// TTL for cached comment lookups in seconds (default: 2 days)
    pub comment_cache_ttl_secs: u64,

    /// TTL for cached author profiles in seconds (default: 1 hour)
    pub profile_cache_ttl_secs: u64,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Port the API server binds to
    pub api_port: u16,

    /// Push gateway credentials. Validated lazily on first send.
    pub apns: ApnsConfig,
}

/// APNs token-based provider credentials.
///
/// Every field is optional here; the push gateway reports a configuration
/// error the first time it is used with an incomplete set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApnsConfig {
    /// PEM-encoded ES256 signing key (takes precedence over `key_path`)
    pub key: Option<String>,
    /// Path to a `.p8` signing key file
    pub key_path: Option<String>,
    pub key_id: Option<String>,
    pub team_id: Option<String>,
    /// App bundle identifier, sent as the `apns-topic`
    pub bundle_id: Option<String>,
    /// Use the production gateway instead of the sandbox
    pub production: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            indexer_api_url: std::env::var("INDEXER_API_URL")
                .unwrap_or_else(|_| "https://api.ethcomments.xyz".to_string()),
            fetch_max_attempts: std::env::var("FETCH_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_MAX_ATTEMPTS must be a valid u32"))?,
            fetch_initial_delay_ms: std::env::var("FETCH_INITIAL_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_INITIAL_DELAY_MS must be a valid u64"))?,
            comment_cache_ttl_secs: std::env::var("COMMENT_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "172800".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("COMMENT_CACHE_TTL_SECS must be a valid u64"))?,
            profile_cache_ttl_secs: std::env::var("PROFILE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PROFILE_CACHE_TTL_SECS must be a valid u64"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY_HOURS must be a valid u64"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            apns: ApnsConfig {
                key: std::env::var("APNS_KEY").ok(),
                key_path: std::env::var("APNS_KEY_PATH").ok(),
                key_id: std::env::var("APNS_KEY_ID").ok(),
                team_id: std::env::var("APNS_TEAM_ID").ok(),
                bundle_id: std::env::var("APNS_BUNDLE_ID").ok(),
                production: std::env::var("APNS_PRODUCTION")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
        })
    }
}
