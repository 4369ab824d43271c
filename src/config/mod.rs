//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod cache;
mod storage;

pub use cache::{CacheConfig, CacheType, RedisConfig};
pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "COUNTERS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "COUNTERS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "COUNTERS_LOG";
/// Environment variable for the PostgreSQL URI.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";
/// Environment variable for the Redis URL.
pub const REDIS_URL_ENV_VAR: &str = "REDIS_URL";

use serde::Deserialize;

use crate::transport::TransportConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Transport configuration.
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `DATABASE_URL` / `REDIS_URL`
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("storage.postgres.uri", std::env::var(DATABASE_URL_ENV_VAR).ok())?
            .set_override_option("cache.redis.url", std::env::var(REDIS_URL_ENV_VAR).ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing: in-memory SQLite, in-process cache.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.storage.sqlite.path = ":memory:".to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.storage.storage_type, StorageType::Sqlite);
        assert_eq!(config.cache.cache_type, CacheType::Memory);
        assert_eq!(config.transport.tcp.port, 50051);
    }

    #[test]
    fn test_config_for_test() {
        let config = Config::for_test();
        assert_eq!(config.storage.sqlite.path, ":memory:");
    }

    #[test]
    #[serial]
    fn test_config_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "storage:\n  type: postgres\n  postgres:\n    uri: postgres://db/counters\ncache:\n  type: redis\n  ttl_secs: 30\n  key_prefix: dev"
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.storage.storage_type, StorageType::Postgres);
        assert_eq!(config.storage.postgres.uri, "postgres://db/counters");
        assert_eq!(config.cache.cache_type, CacheType::Redis);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.key_prefix.as_deref(), Some("dev"));
    }

    #[test]
    #[serial]
    fn test_config_env_overrides() {
        std::env::set_var("COUNTERS__TRANSPORT__TCP__PORT", "6000");
        std::env::set_var(DATABASE_URL_ENV_VAR, "postgres://env/counters");

        let config = Config::load(None);

        std::env::remove_var("COUNTERS__TRANSPORT__TCP__PORT");
        std::env::remove_var(DATABASE_URL_ENV_VAR);

        let config = config.unwrap();
        assert_eq!(config.transport.tcp.port, 6000);
        assert_eq!(config.storage.postgres.uri, "postgres://env/counters");
    }
}
