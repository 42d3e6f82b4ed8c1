//! API configuration.

use std::path::PathBuf;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP submissions per second
    pub rate_limit_rps: u32,
    /// Per-IP burst allowance
    pub rate_limit_burst: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Rate limit on forwarding headers rather than the peer address
    pub trust_proxy_headers: bool,
    /// Root of the job record store
    pub downloads_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 64 * 1024, // 64KB, submissions are a single form field
            environment: "development".to_string(),
            trust_proxy_headers: false,
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64 * 1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            downloads_dir: std::env::var("DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("downloads")),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.environment)
    }
}

/// Whether an `ENVIRONMENT` value names production.
pub fn is_production_environment(environment: &str) -> bool {
    environment.trim().eq_ignore_ascii_case("production")
}
