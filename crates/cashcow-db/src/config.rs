//! # Configuration
//!
//! Store, token and paging settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CASHCOW_DB_PATH=/var/lib/cashcow/cashcow.db                        │
//! │     CASHCOW_DB_QUERY_TIMEOUT_MS=3000                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     cashcow.toml (path passed by the caller)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./cashcow.db"
//! max_connections = 10
//! query_timeout_ms = 3000
//!
//! [auth]
//! activation_ttl_secs = 259200
//! authentication_ttl_secs = 86400
//! password_reset_ttl_secs = 2700
//!
//! [auth.hashing]
//! memory_kib = 19456
//! iterations = 2
//! parallelism = 1
//!
//! [paging]
//! max_page_size = 100
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use cashcow_core::filters::DEFAULT_MAX_PAGE_SIZE;
use cashcow_core::HashingParams;

use crate::pool::DbConfig;
use crate::service::TokenTtls;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Longest token lifetime the config accepts: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 366 * 24 * 60 * 60;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// Deadline for each store call.
    pub query_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: PathBuf::from("./cashcow.db"),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            query_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub activation_ttl_secs: i64,
    pub authentication_ttl_secs: i64,
    pub password_reset_ttl_secs: i64,
    pub hashing: HashingParams,
}

impl Default for AuthSection {
    fn default() -> Self {
        let ttls = TokenTtls::default();
        AuthSection {
            activation_ttl_secs: ttls.activation.num_seconds(),
            authentication_ttl_secs: ttls.authentication.num_seconds(),
            password_reset_ttl_secs: ttls.password_reset.num_seconds(),
            hashing: HashingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingSection {
    pub max_page_size: i64,
}

impl Default for PagingSection {
    fn default() -> Self {
        PagingSection {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub paging: PagingSection,
}

impl AppConfig {
    /// Loads defaults, then `path` if it exists, then `CASHCOW_*` variables.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with(path, |var| std::env::var(var).ok())
    }

    /// [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("CASHCOW_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        override_parsed(&env, "CASHCOW_DB_MAX_CONNECTIONS", &mut self.database.max_connections)?;
        override_parsed(&env, "CASHCOW_DB_MIN_CONNECTIONS", &mut self.database.min_connections)?;
        override_parsed(
            &env,
            "CASHCOW_DB_CONNECT_TIMEOUT_SECS",
            &mut self.database.connect_timeout_secs,
        )?;
        override_parsed(&env, "CASHCOW_DB_QUERY_TIMEOUT_MS", &mut self.database.query_timeout_ms)?;
        override_parsed(&env, "CASHCOW_ACTIVATION_TTL_SECS", &mut self.auth.activation_ttl_secs)?;
        override_parsed(
            &env,
            "CASHCOW_AUTHENTICATION_TTL_SECS",
            &mut self.auth.authentication_ttl_secs,
        )?;
        override_parsed(
            &env,
            "CASHCOW_PASSWORD_RESET_TTL_SECS",
            &mut self.auth.password_reset_ttl_secs,
        )?;
        override_parsed(&env, "CASHCOW_MAX_PAGE_SIZE", &mut self.paging.max_page_size)?;
        Ok(())
    }

    /// Rejects settings the store cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be greater than 0".into()));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "min_connections must not exceed max_connections".into(),
            ));
        }
        if self.database.connect_timeout_secs == 0 || self.database.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".into()));
        }
        let ttls = [
            self.auth.activation_ttl_secs,
            self.auth.authentication_ttl_secs,
            self.auth.password_reset_ttl_secs,
        ];
        if ttls.iter().any(|&secs| secs <= 0 || secs > MAX_TOKEN_TTL_SECS) {
            return Err(ConfigError::Invalid(format!(
                "token TTLs must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }
        if self.paging.max_page_size <= 0 {
            return Err(ConfigError::Invalid("max_page_size must be greater than 0".into()));
        }
        self.auth
            .hashing
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .query_timeout(Duration::from_millis(self.database.query_timeout_ms))
            .max_page_size(self.paging.max_page_size)
    }

    pub fn token_ttls(&self) -> ConfigResult<TokenTtls> {
        Ok(TokenTtls {
            activation: ttl("activation_ttl_secs", self.auth.activation_ttl_secs)?,
            authentication: ttl("authentication_ttl_secs", self.auth.authentication_ttl_secs)?,
            password_reset: ttl("password_reset_ttl_secs", self.auth.password_reset_ttl_secs)?,
        })
    }
}

fn ttl(name: &str, secs: i64) -> ConfigResult<TimeDelta> {
    TimeDelta::try_seconds(secs)
        .ok_or_else(|| ConfigError::Invalid(format!("{name} is out of range")))
}

fn override_parsed<F, T>(env: &F, var: &'static str, target: &mut T) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = env(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
        debug!(var, "Overriding config from environment");
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(None, no_env).unwrap();
        assert_eq!(config.database.query_timeout_ms, 3_000);
        assert_eq!(config.paging.max_page_size, 100);
        assert_eq!(config.token_ttls().unwrap(), TokenTtls::default());

        let db = config.to_db_config();
        assert_eq!(db.query_timeout, Duration::from_secs(3));
        assert_eq!(db.max_connections, 10);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [database]
            path = "/var/lib/cashcow/cashcow.db"

            [auth.hashing]
            memory_kib = 65536
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/var/lib/cashcow/cashcow.db"));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.hashing.memory_kib, 65_536);
        assert_eq!(config.auth.hashing.iterations, 2);
    }

    #[test]
    fn test_file_then_env() {
        let path = std::env::temp_dir().join(format!("cashcow-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[paging]\nmax_page_size = 50\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("CASHCOW_DB_QUERY_TIMEOUT_MS", "750"),
            ("CASHCOW_DB_PATH", ":memory:"),
        ]);
        let config =
            AppConfig::load_with(Some(&path), |var| env.get(var).map(|v| v.to_string())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.paging.max_page_size, 50);
        assert_eq!(config.database.query_timeout_ms, 750);
        assert_eq!(config.database.path, PathBuf::from(":memory:"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            AppConfig::load_with(Some(Path::new("/nonexistent/cashcow.toml")), no_env).unwrap();
        assert_eq!(config.paging.max_page_size, DEFAULT_MAX_PAGE_SIZE);
    }

    #[test]
    fn test_bad_env_value() {
        let err = AppConfig::load_with(None, |var| {
            (var == "CASHCOW_MAX_PAGE_SIZE").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "CASHCOW_MAX_PAGE_SIZE", .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.database.query_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.paging.max_page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.hashing.memory_kib = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_ttl_env_fails_validation() {
        let err = AppConfig::load_with(None, |var| {
            (var == "CASHCOW_AUTHENTICATION_TTL_SECS").then(|| i64::MAX.to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut config = AppConfig::default();
        config.auth.password_reset_ttl_secs = i64::MAX;
        assert!(matches!(config.token_ttls(), Err(ConfigError::Invalid(_))));
    }
}
