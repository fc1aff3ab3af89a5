//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/harvester";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:5173";

// ============================================================================
// Scrape Pipeline Constants
// ============================================================================

/// Default cap on document links ingested per discovery pass.
pub const DEFAULT_MAX_LINKS_PER_PAGE: usize = 5;

/// Default number of concurrent document downloads per batch.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 3;

/// Default wall-clock budget for a single document link, in seconds.
pub const DEFAULT_LINK_TIMEOUT_SECS: u64 = 60;

/// Default wall-clock budget for a whole video ingest, in seconds.
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 300;

/// Default media resolver executable.
pub const DEFAULT_RESOLVER_BIN: &str = "yt-dlp";

/// Hosts accepted for the video ingest path.
pub const DEFAULT_MEDIA_HOSTS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com"];

/// Hosts on which document discovery is never attempted.
pub const DEFAULT_BLOCKED_HOSTS: &[&str] = &["twitter.com", "x.com", "facebook.com", "instagram.com"];

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub scrape: ScrapeConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Scrape pipeline configuration
///
/// Knobs for the ingest orchestrator: per-discovery link cap, download
/// concurrency, the layered per-link and per-video wall-clock budgets, and
/// the host lists used for classification and discovery rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub max_links_per_page: usize,
    pub download_concurrency: usize,
    pub link_timeout_secs: u64,
    pub video_timeout_secs: u64,
    pub media_hosts: Vec<String>,
    pub blocked_hosts: Vec<String>,
    pub resolver_bin: String,
    pub spool_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("HARVESTER_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("HARVESTER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("HARVESTER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            scrape: ScrapeConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        self.scrape.validate()?;

        Ok(())
    }
}

impl ScrapeConfig {
    /// Load scrape settings from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            max_links_per_page: std::env::var("SCRAPE_MAX_LINKS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_LINKS_PER_PAGE),
            download_concurrency: std::env::var("SCRAPE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DOWNLOAD_CONCURRENCY),
            link_timeout_secs: std::env::var("SCRAPE_LINK_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LINK_TIMEOUT_SECS),
            video_timeout_secs: std::env::var("SCRAPE_VIDEO_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_VIDEO_TIMEOUT_SECS),
            media_hosts: host_list_from_env("SCRAPE_MEDIA_HOSTS", DEFAULT_MEDIA_HOSTS),
            blocked_hosts: host_list_from_env("SCRAPE_BLOCKED_HOSTS", DEFAULT_BLOCKED_HOSTS),
            resolver_bin: std::env::var("SCRAPE_RESOLVER_BIN")
                .unwrap_or_else(|_| DEFAULT_RESOLVER_BIN.to_string()),
            spool_dir: std::env::var("SCRAPE_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("harvester")),
        }
    }

    /// Validate scrape settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_links_per_page == 0 {
            anyhow::bail!("Scrape max_links_per_page must be greater than 0");
        }
        if self.download_concurrency == 0 {
            anyhow::bail!("Scrape download_concurrency must be greater than 0");
        }
        if self.link_timeout_secs == 0 || self.video_timeout_secs == 0 {
            anyhow::bail!("Scrape timeouts must be greater than 0");
        }
        if self.resolver_bin.trim().is_empty() {
            anyhow::bail!("Scrape resolver_bin cannot be empty");
        }
        Ok(())
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_links_per_page: DEFAULT_MAX_LINKS_PER_PAGE,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            link_timeout_secs: DEFAULT_LINK_TIMEOUT_SECS,
            video_timeout_secs: DEFAULT_VIDEO_TIMEOUT_SECS,
            media_hosts: DEFAULT_MEDIA_HOSTS.iter().map(|s| s.to_string()).collect(),
            blocked_hosts: DEFAULT_BLOCKED_HOSTS.iter().map(|s| s.to_string()).collect(),
            resolver_bin: DEFAULT_RESOLVER_BIN.to_string(),
            spool_dir: std::env::temp_dir().join("harvester"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            scrape: ScrapeConfig::default(),
        }
    }
}

fn host_list_from_env(var: &str, defaults: &[&str]) -> Vec<String> {
    match std::env::var(var) {
        Ok(value) => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.scrape.download_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_link_cap_rejected() {
        let mut config = Config::default();
        config.scrape.max_links_per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_connections_cannot_exceed_max() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_scrape_knobs() {
        let scrape = ScrapeConfig::default();
        assert_eq!(scrape.max_links_per_page, 5);
        assert_eq!(scrape.download_concurrency, 3);
        assert_eq!(scrape.link_timeout_secs, 60);
        assert_eq!(scrape.video_timeout_secs, 300);
        assert!(scrape.media_hosts.iter().any(|h| h == "youtube.com"));
        assert!(scrape.blocked_hosts.iter().any(|h| h == "twitter.com"));
    }
}
