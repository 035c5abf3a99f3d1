//! # Database Configuration
//!
//! Endpoint list and pool limits for the routing database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TANDEM_DATABASE_URLS="sqlite://p.db;sqlite://r1.db"                │
//! │     TANDEM_DB_MAX_CONNECTIONS=10                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path passed to DbConfig::load                                      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # database.toml
//! endpoints = [
//!     "sqlite://data/primary.db",   # index 0 is always the primary
//!     "sqlite://data/replica1.db",
//!     "sqlite://data/replica2.db",
//! ]
//!
//! [pool]
//! max_connections = 10
//! min_connections = 1
//! acquire_timeout_secs = 30
//! idle_timeout_secs = 600
//! max_lifetime_secs = 1800
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Separator for endpoint lists given as a single string.
pub const DSN_SEPARATOR: char = ';';

// =============================================================================
// Pool Limits
// =============================================================================

/// Connection-pool tuning applied identically to every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Maximum open connections per endpoint.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connections each pool keeps open while idle.
    #[serde(default)]
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connections older than this are closed. `None` keeps them.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: Option<u64>,

    /// Connections older than this are recycled. `None` keeps them.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: Option<u64>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> Option<u64> {
    Some(600)
}

fn default_max_lifetime() -> Option<u64> {
    Some(1800)
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolLimits {
            max_connections: default_max_connections(),
            min_connections: 0,
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

impl PoolLimits {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_secs.map(Duration::from_secs)
    }

    /// Checks the limits are usable.
    pub fn validate(&self) -> DbResult<()> {
        if self.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DbError::InvalidConfig(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

// =============================================================================
// DbConfig
// =============================================================================

/// Routing database configuration.
///
/// ## Example
/// ```rust
/// use tandem_db::DbConfig;
///
/// let config = DbConfig::new("sqlite://primary.db")
///     .replica("sqlite://replica1.db")
///     .replica("sqlite://replica2.db")
///     .max_connections(10);
///
/// assert_eq!(config.endpoints.len(), 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Connection URLs. Index 0 is the primary, the rest are replicas.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Pool limits applied to every endpoint.
    #[serde(default)]
    pub pool: PoolLimits,
}

impl DbConfig {
    /// Creates a configuration with a primary and no replicas.
    pub fn new(primary: impl Into<String>) -> Self {
        DbConfig {
            endpoints: vec![primary.into()],
            pool: PoolLimits::default(),
        }
    }

    /// Parses a `;`-separated endpoint list, primary first.
    ///
    /// ```rust
    /// use tandem_db::DbConfig;
    ///
    /// let config = DbConfig::from_dsn_list("sqlite://a.db; sqlite://b.db").unwrap();
    /// assert_eq!(config.endpoints, vec!["sqlite://a.db", "sqlite://b.db"]);
    /// assert!(DbConfig::from_dsn_list("").is_err());
    /// ```
    pub fn from_dsn_list(list: &str) -> DbResult<Self> {
        let config = DbConfig {
            endpoints: split_dsn_list(list),
            pool: PoolLimits::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Adds a replica endpoint.
    pub fn replica(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    /// Sets the maximum number of connections per endpoint.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.pool.max_connections = max;
        self
    }

    /// Sets the minimum number of connections per endpoint.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.pool.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool.acquire_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool.idle_timeout_secs = timeout.map(|d| d.as_secs());
        self
    }

    /// Sets the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.pool.max_lifetime_secs = lifetime.map(|d| d.as_secs());
        self
    }

    /// Loads configuration from a TOML file, then applies environment overrides.
    ///
    /// With no path, only the environment is consulted.
    pub fn load(config_path: Option<&Path>) -> DbResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::read_file(path)?,
            None => DbConfig {
                endpoints: Vec::new(),
                pool: PoolLimits::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        info!(
            endpoints = config.endpoints.len(),
            max_connections = config.pool.max_connections,
            "Database config loaded"
        );
        Ok(config)
    }

    /// Resolves the config path from `TANDEM_DB_CONFIG`, if set.
    pub fn path_from_env() -> Option<PathBuf> {
        std::env::var_os("TANDEM_DB_CONFIG").map(PathBuf::from)
    }

    fn read_file(path: &Path) -> DbResult<Self> {
        debug!(?path, "Reading database config");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| DbError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.endpoints.is_empty() {
            return Err(DbError::InvalidConfig(
                "at least one endpoint (the primary) is required".into(),
            ));
        }

        if let Some(index) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(DbError::InvalidConfig(format!(
                "endpoint {} is empty",
                index
            )));
        }

        self.pool.validate()
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(list) = std::env::var("TANDEM_DATABASE_URLS") {
            let endpoints = split_dsn_list(&list);
            debug!(count = endpoints.len(), "Overriding endpoints from environment");
            self.endpoints = endpoints;
        }

        if let Ok(max) = std::env::var("TANDEM_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.pool.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TANDEM_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(min) = std::env::var("TANDEM_DB_MIN_CONNECTIONS") {
            match min.parse::<u32>() {
                Ok(n) => self.pool.min_connections = n,
                Err(_) => warn!(value = %min, "Ignoring invalid TANDEM_DB_MIN_CONNECTIONS"),
            }
        }

        if let Ok(secs) = std::env::var("TANDEM_DB_IDLE_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.pool.idle_timeout_secs = Some(s),
                Err(_) => warn!(value = %secs, "Ignoring invalid TANDEM_DB_IDLE_TIMEOUT_SECS"),
            }
        }

        if let Ok(secs) = std::env::var("TANDEM_DB_MAX_LIFETIME_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.pool.max_lifetime_secs = Some(s),
                Err(_) => warn!(value = %secs, "Ignoring invalid TANDEM_DB_MAX_LIFETIME_SECS"),
            }
        }
    }
}

fn split_dsn_list(list: &str) -> Vec<String> {
    list.split(DSN_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("sqlite://p.db")
            .replica("sqlite://r.db")
            .max_connections(10)
            .min_connections(2)
            .idle_timeout(None);

        assert_eq!(config.endpoints[0], "sqlite://p.db");
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.pool.min_connections, 2);
        assert_eq!(config.pool.idle_timeout(), None);
    }

    #[test]
    fn test_empty_endpoint_list_is_invalid() {
        let config = DbConfig {
            endpoints: vec![],
            pool: PoolLimits::default(),
        };
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));
    }

    #[test]
    fn test_pool_limit_validation() {
        assert!(DbConfig::new("sqlite://p.db").max_connections(0).validate().is_err());
        assert!(DbConfig::new("sqlite://p.db")
            .max_connections(2)
            .min_connections(3)
            .validate()
            .is_err());
    }

    #[test]
    fn test_dsn_list_skips_blank_entries() {
        let config = DbConfig::from_dsn_list("sqlite://a.db;;sqlite://b.db;").unwrap();
        assert_eq!(config.endpoints.len(), 2);
    }

    #[test]
    fn test_toml_round_trip_and_defaults() {
        let toml_str = r#"
            endpoints = ["sqlite://p.db", "sqlite://r1.db"]

            [pool]
            max_connections = 8
        "#;
        let config: DbConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.pool.acquire_timeout_secs, 30);

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[pool]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.toml");
        std::fs::write(&path, "endpoints = [\"sqlite://only.db\"]\n").unwrap();

        let config = DbConfig::read_file(&path).unwrap();
        assert_eq!(config.endpoints, vec!["sqlite://only.db"]);
        assert_eq!(config.pool, PoolLimits::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = DbConfig::read_file(Path::new("/nonexistent/tandem.toml"));
        assert!(matches!(result, Err(DbError::ConfigLoadFailed(_))));
    }

    // Every environment-dependent assertion lives here; tests run in parallel
    // and the process environment is shared.
    #[test]
    fn test_load_applies_environment_overrides() {
        const VARS: [&str; 5] = [
            "TANDEM_DATABASE_URLS",
            "TANDEM_DB_MAX_CONNECTIONS",
            "TANDEM_DB_MIN_CONNECTIONS",
            "TANDEM_DB_IDLE_TIMEOUT_SECS",
            "TANDEM_DB_MAX_LIFETIME_SECS",
        ];
        let clear = || VARS.iter().for_each(|var| std::env::remove_var(var));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.toml");
        std::fs::write(
            &path,
            "endpoints = [\"sqlite://file.db\"]\n\n[pool]\nmax_connections = 4\nidle_timeout_secs = 30\n",
        )
        .unwrap();

        clear();
        std::env::set_var("TANDEM_DATABASE_URLS", "sqlite://x.db; sqlite://y.db");
        std::env::set_var("TANDEM_DB_MAX_CONNECTIONS", "9");
        std::env::set_var("TANDEM_DB_MAX_LIFETIME_SECS", "600");
        let config = DbConfig::load(Some(&path));

        // Unparseable values are ignored and the file's values stand
        std::env::set_var("TANDEM_DB_MIN_CONNECTIONS", "many");
        std::env::set_var("TANDEM_DB_IDLE_TIMEOUT_SECS", "soon");
        let lenient = DbConfig::load(Some(&path));

        std::env::set_var("TANDEM_DATABASE_URLS", " ; ");
        let emptied = DbConfig::load(Some(&path));

        std::env::set_var("TANDEM_DATABASE_URLS", "sqlite://x.db");
        std::env::set_var("TANDEM_DB_MAX_CONNECTIONS", "0");
        let zero_max = DbConfig::load(None);
        clear();

        let config = config.unwrap();
        assert_eq!(config.endpoints, vec!["sqlite://x.db", "sqlite://y.db"]);
        assert_eq!(config.pool.max_connections, 9);
        assert_eq!(config.pool.idle_timeout_secs, Some(30));
        assert_eq!(config.pool.max_lifetime_secs, Some(600));

        let lenient = lenient.unwrap();
        assert_eq!(lenient.pool.min_connections, PoolLimits::default().min_connections);
        assert_eq!(lenient.pool.idle_timeout_secs, Some(30));

        assert!(matches!(emptied, Err(DbError::InvalidConfig(_))));
        assert!(matches!(zero_max, Err(DbError::InvalidConfig(_))));
    }
}
