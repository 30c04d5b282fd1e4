//! Configuration for the GameKeep server.
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Environment variables (`GAMEKEEP_*`)
//! 2. Config file (`$GAMEKEEP_CONFIG`, else `./gamekeep.toml`)
//! 3. Default values

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use gamekeep_core::ServerConfig;
use serde::{Deserialize, Serialize};

/// Selects the in-memory store instead of a database.
pub const MEMORY_STORE: &str = "memory";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interface to listen on.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// `memory`, or a `sqlite:` / `postgres:` connection URL.
    pub database_url: String,

    /// Connection pool size for SQL stores.
    pub max_connections: u32,

    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,

    /// Seconds to wait for open connections on shutdown.
    pub shutdown_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Allowed CORS origin. CORS headers are only sent when set.
    pub cors_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: MEMORY_STORE.to_string(),
            max_connections: 10,
            max_body_size: 1024 * 1024,
            shutdown_timeout_secs: 30,
            log_level: "info".to_string(),
            json_logs: false,
            cors_origin: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from all sources.
    ///
    /// # Errors
    ///
    /// Fails when a source holds a value of the wrong type.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::figment(&path)
            .extract()
            .with_context(|| format!("invalid configuration (file: {})", path.display()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GAMEKEEP_"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> PathBuf {
        std::env::var_os("GAMEKEEP_CONFIG")
            .map_or_else(|| PathBuf::from("gamekeep.toml"), PathBuf::from)
    }

    /// Whether games live in process memory.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case(MEMORY_STORE)
    }

    /// Socket address built from `host` and `port`.
    ///
    /// # Errors
    ///
    /// Fails when `host` is not an IP address.
    pub fn address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid host '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Runtime settings for the HTTP server.
    ///
    /// # Errors
    ///
    /// Fails when `host` is not an IP address.
    pub fn server_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig {
            address: self.address()?,
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            max_body_size: self.max_body_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.uses_memory_store());
        assert_eq!(config.address().unwrap().port(), 8000);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "gamekeep.toml",
                r#"
                port = 9000
                database_url = "sqlite::memory:"
                log_level = "debug"
                "#,
            )?;
            jail.set_env("GAMEKEEP_PORT", "9100");
            jail.set_env("GAMEKEEP_CORS_ORIGIN", "https://example.com");

            let config: AppConfig = AppConfig::figment(Path::new("gamekeep.toml")).extract()?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.database_url, "sqlite::memory:");
            assert!(!config.uses_memory_store());
            assert_eq!(config.cors_origin.as_deref(), Some("https://example.com"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config: AppConfig = AppConfig::figment(Path::new("absent.toml")).extract()?;
            assert_eq!(config, AppConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_server_config() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            shutdown_timeout_secs: 5,
            ..AppConfig::default()
        };
        let server = config.server_config().unwrap();
        assert_eq!(server.address.to_string(), "0.0.0.0:8000");
        assert_eq!(server.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_host() {
        let config = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(config.address().is_err());
    }
}
