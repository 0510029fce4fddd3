//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DATABASE_PATH=/var/lib/till/till.db                           │
//! │     TILL_FLUSH_MODE=synchronous                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till-pos/till.toml (Linux)                               │
//! │     ~/Library/Application Support/com.till.pos/till.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./till.db, background flush, no detail deadline                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # till.toml
//! [database]
//! path = "/var/lib/till/till.db"
//! max_connections = 5
//!
//! [engine]
//! flush_mode = "background"  # background | synchronous
//! detail_timeout_ms = 2000   # omit to wait indefinitely
//! warm_cache = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use till_db::DbConfig;
use tracing::{debug, info, warn};

use crate::error::{OrderError, OrderResult};
use crate::flush::FlushMode;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("till.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// How stock decrements reach the database.
    #[serde(default)]
    pub flush_mode: FlushMode,

    /// Upper bound on an order detail lookup. Absent means no bound.
    #[serde(default)]
    pub detail_timeout_ms: Option<u64>,

    /// Load every product into the cache at startup.
    #[serde(default = "default_true")]
    pub warm_cache: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            flush_mode: FlushMode::default(),
            detail_timeout_ms: None,
            warm_cache: true,
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> OrderResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> OrderResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| OrderError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| OrderError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> OrderResult<()> {
        if self.database.max_connections == 0 {
            return Err(OrderError::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(OrderError::Config("database path must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TILL_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TILL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("TILL_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Invalid TILL_MAX_CONNECTIONS"),
            }
        }

        if let Some(mode) = lookup("TILL_FLUSH_MODE") {
            match mode.parse::<FlushMode>() {
                Ok(parsed) => {
                    debug!(mode = %parsed, "Overriding flush mode from environment");
                    self.engine.flush_mode = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring TILL_FLUSH_MODE"),
            }
        }

        // 0 turns the deadline off
        if let Some(ms) = lookup("TILL_DETAIL_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(0) => self.engine.detail_timeout_ms = None,
                Ok(n) => self.engine.detail_timeout_ms = Some(n),
                Err(_) => warn!(value = %ms, "Invalid TILL_DETAIL_TIMEOUT_MS"),
            }
        }

        if let Some(warm) = lookup("TILL_WARM_CACHE") {
            match warm.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.engine.warm_cache = true,
                "0" | "false" | "no" => self.engine.warm_cache = false,
                _ => warn!(value = %warm, "Invalid TILL_WARM_CACHE"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn detail_timeout(&self) -> Option<Duration> {
        self.engine.detail_timeout_ms.map(Duration::from_millis)
    }

    /// Pool settings for [`till_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let max = self.database.max_connections;
        DbConfig::new(self.database.path.clone())
            .max_connections(max)
            .min_connections(max.min(1))
    }
}
