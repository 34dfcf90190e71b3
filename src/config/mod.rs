//! Application configuration.
//!
//! Loaded from YAML files and environment variables into a single `Config`
//! struct; every section has sensible local-development defaults.

use serde::Deserialize;

use crate::codegen;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "REFERRAL_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "REFERRAL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "REFERRAL_LOG";
/// Environment variable for database URL.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosting-layer configuration (referral link base).
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Referral program tunables.
    pub referral: ReferralConfig,
}

/// Hosting-layer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL used to build shareable referral links.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Postgres,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => write!(f, "sqlite"),
            StorageType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path. Use `:memory:` for in-memory.
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/referrals.db".to_string(),
        }
    }
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URI.
    pub uri: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/referrals".to_string(),
        }
    }
}

/// Referral program tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    /// Length of the username-derived code prefix.
    pub code_seed_len: usize,
    /// Length of the random code suffix.
    pub code_suffix_len: usize,
    /// Bounded retry cap for code generation and insert-time collisions.
    pub max_code_attempts: u32,
    /// Default leaderboard page size.
    pub leaderboard_limit: u64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            code_seed_len: codegen::DEFAULT_SEED_LEN,
            code_suffix_len: codegen::DEFAULT_SUFFIX_LEN,
            max_code_attempts: codegen::DEFAULT_MAX_ATTEMPTS,
            leaderboard_limit: 100,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
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
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing (in-memory SQLite).
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.storage.sqlite.path = ":memory:".to_string();
        config
    }
}
