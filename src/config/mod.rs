use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Governance service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "rulegov")]
#[command(about = "Fraud-rule governance control plane")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "RULEGOV_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Deployment environment label (local, test, prod)
    #[arg(long, default_value = "local", env = "RULEGOV_ENVIRONMENT")]
    pub environment: String,

    /// Deployment region label (APAC, EMEA, INDIA, AMERICAS)
    #[arg(long, default_value = "INDIA", env = "RULEGOV_REGION")]
    pub region: String,

    /// Postgres connection URL for the application role. When unset the
    /// service runs against the in-memory store (local development only).
    #[arg(long, env = "RULEGOV_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Postgres connection URL for the admin role (migrations, seeding)
    #[arg(long, env = "RULEGOV_ADMIN_DATABASE_URL")]
    pub admin_database_url: Option<String>,

    /// Postgres connection URL for the analytics role (read-only)
    #[arg(long, env = "RULEGOV_ANALYTICS_DATABASE_URL")]
    pub analytics_database_url: Option<String>,

    /// Minimum database pool connections
    #[arg(long, default_value = "1", env = "RULEGOV_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum database pool connections
    #[arg(long, default_value = "10", env = "RULEGOV_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Artifact storage backend: filesystem or s3
    #[arg(long, default_value = "filesystem", env = "RULEGOV_ARTIFACT_BACKEND")]
    pub artifact_backend: String,

    /// Root directory for the filesystem backend
    #[arg(long, default_value = "./artifacts", env = "RULEGOV_ARTIFACT_DIR")]
    pub artifact_dir: PathBuf,

    /// Key prefix prepended to every artifact key (optional)
    #[arg(long, default_value = "", env = "RULEGOV_ARTIFACT_PREFIX")]
    pub artifact_prefix: String,

    /// S3-compatible endpoint URL (for the s3 backend)
    #[arg(long, env = "RULEGOV_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 bucket name
    #[arg(long, env = "RULEGOV_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// S3 region
    #[arg(long, default_value = "us-east-1", env = "RULEGOV_S3_REGION")]
    pub s3_region: String,

    /// S3 access key id
    #[arg(long, env = "RULEGOV_S3_ACCESS_KEY_ID")]
    pub s3_access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long, env = "RULEGOV_S3_SECRET_ACCESS_KEY")]
    pub s3_secret_access_key: Option<String>,

    /// Use path-style S3 addressing (required for MinIO)
    #[arg(long, default_value = "true", env = "RULEGOV_S3_PATH_STYLE")]
    pub s3_path_style: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "RULEGOV_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "RULEGOV_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// True when configured for the S3-compatible backend.
    pub fn uses_s3(&self) -> bool {
        self.artifact_backend.eq_ignore_ascii_case("s3")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            environment: "local".to_string(),
            region: "INDIA".to_string(),
            database_url: None,
            admin_database_url: None,
            analytics_database_url: None,
            db_min_connections: 1,
            db_max_connections: 10,
            artifact_backend: "filesystem".to_string(),
            artifact_dir: PathBuf::from("./artifacts"),
            artifact_prefix: String::new(),
            s3_endpoint: None,
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_path_style: true,
            log_level: "info".to_string(),
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.artifact_backend, "filesystem");
        assert!(!config.uses_s3());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_backend_selector_case_insensitive() {
        let config = Config {
            artifact_backend: "S3".to_string(),
            ..Default::default()
        };
        assert!(config.uses_s3());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config {
            shutdown_timeout_secs: 15,
            ..Default::default()
        };
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(15));
    }
}
