//! # Engine Configuration
//!
//! Configuration for the booking service and the reconciliation sweep.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VOYAGE_DB_PATH=/var/lib/voyage/voyage.db                           │
//! │     VOYAGE_STRICT_TRANSITIONS=true                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/backoffice/engine.toml (Linux)                           │
//! │     ~/Library/Application Support/com.voyage.backoffice/engine.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     permissive transitions, caller-supplied status                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [database]
//! path = "voyage.db"
//! max_connections = 5
//!
//! [engine]
//! strict_transitions = false
//! derive_status_from_tranches = false
//! post_commit_timeout_ms = 5000
//!
//! [sweep]
//! batch_size = 50
//! poll_interval_secs = 30
//! max_attempts = 10
//! cleanup_after_days = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use voyage_core::{StatusSource, TransitionPolicy};
use voyage_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite file lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("voyage.db")
}
fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Booking update behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Reject status moves outside the allow-list.
    #[serde(default)]
    pub strict_transitions: bool,

    /// Compute the new status from paid vs. total instead of trusting the caller.
    #[serde(default)]
    pub derive_status_from_tranches: bool,

    /// Upper bound on the post-commit commission call.
    #[serde(default = "default_post_commit_timeout")]
    pub post_commit_timeout_ms: u64,
}

fn default_post_commit_timeout() -> u64 {
    5_000
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            strict_transitions: false,
            derive_status_from_tranches: false,
            post_commit_timeout_ms: default_post_commit_timeout(),
        }
    }
}

// =============================================================================
// Sweep Settings
// =============================================================================

/// Reconciliation sweep behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Markers that failed this many times are left for an operator.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    #[serde(default = "default_cleanup_after_days")]
    pub cleanup_after_days: u32,
}

fn default_batch_size() -> u32 {
    50
}
fn default_poll_interval() -> u64 {
    30
}
fn default_max_attempts() -> i64 {
    10
}
fn default_cleanup_after_days() -> u32 {
    30
}

impl Default for SweepSettings {
    fn default() -> Self {
        SweepSettings {
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
            cleanup_after_days: default_cleanup_after_days(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub sweep: SweepSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
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

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.engine.post_commit_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "engine.post_commit_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.sweep.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep.batch_size must be greater than 0".into(),
            ));
        }
        if self.sweep.poll_interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.sweep.max_attempts <= 0 {
            return Err(EngineError::InvalidConfig(
                "sweep.max_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("VOYAGE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(value) = std::env::var("VOYAGE_STRICT_TRANSITIONS") {
            match parse_flag(&value) {
                Some(strict) => self.engine.strict_transitions = strict,
                None => warn!(value = %value, "Ignoring VOYAGE_STRICT_TRANSITIONS"),
            }
        }

        if let Ok(value) = std::env::var("VOYAGE_DERIVE_STATUS") {
            match parse_flag(&value) {
                Some(derive) => self.engine.derive_status_from_tranches = derive,
                None => warn!(value = %value, "Ignoring VOYAGE_DERIVE_STATUS"),
            }
        }

        if let Ok(value) = std::env::var("VOYAGE_POST_COMMIT_TIMEOUT_MS") {
            if let Ok(ms) = value.parse::<u64>() {
                self.engine.post_commit_timeout_ms = ms;
            }
        }

        if let Ok(value) = std::env::var("VOYAGE_SWEEP_BATCH_SIZE") {
            if let Ok(size) = value.parse::<u32>() {
                self.sweep.batch_size = size;
            }
        }

        if let Ok(value) = std::env::var("VOYAGE_SWEEP_POLL_SECS") {
            if let Ok(secs) = value.parse::<u64>() {
                debug!(secs, "Overriding sweep poll interval from environment");
                self.sweep.poll_interval_secs = secs;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "voyage", "backoffice")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn transition_policy(&self) -> TransitionPolicy {
        TransitionPolicy::from_strict(self.engine.strict_transitions)
    }

    pub fn status_source(&self) -> StatusSource {
        StatusSource::from_derived(self.engine.derive_status_from_tranches)
    }

    pub fn post_commit_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.post_commit_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.poll_interval_secs)
    }

    /// Pool settings for [`voyage_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
