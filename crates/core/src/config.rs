//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Create a test configuration with fast timers.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            sync: SyncConfig {
                poll_enabled: false,
                reconcile_enabled: false,
                ..SyncConfig::default()
            },
            ..Self::default()
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Metadata database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

/// Remote claim service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL used for accounts that do not carry their own.
    #[serde(default = "default_remote_base_url")]
    pub default_base_url: String,
    /// Per-call timeout in seconds. A timed-out call is a recoverable
    /// failure, retried by the next scheduled cycle.
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Background synchronization configuration.
///
/// The availability poller and the reservation reconciler run on
/// independent timers; each can be disabled without affecting the other.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Enable the availability poller (default: on).
    #[serde(default = "default_true")]
    pub poll_enabled: bool,
    /// Availability poll interval in seconds (default: 5 minutes).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Enable the reservation reconciler (default: off, opt-in).
    #[serde(default)]
    pub reconcile_enabled: bool,
    /// Reconcile interval in seconds (default: 30 minutes).
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Maximum number of commit ids per batched cache update statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    /// Validate sync configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("sync.batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/corral.db")
}

fn default_remote_base_url() -> String {
    "https://claims.example.com".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_reconcile_interval_secs() -> u64 {
    1800
}

fn default_batch_size() -> usize {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_base_url: default_remote_base_url(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_enabled: default_true(),
            poll_interval_secs: default_poll_interval_secs(),
            reconcile_enabled: false,
            reconcile_interval_secs: default_reconcile_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_schedule() {
        let config = AppConfig::default();
        assert!(config.sync.poll_enabled);
        assert!(!config.sync.reconcile_enabled);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.sync.reconcile_interval(), Duration::from_secs(1800));
        assert_eq!(config.remote.timeout(), Duration::from_secs(5));
        assert_eq!(config.sync.batch_size, 1000);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let sync = SyncConfig {
            poll_interval_secs: 0,
            ..SyncConfig::default()
        };
        assert_eq!(sync.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let sync = SyncConfig {
            batch_size: 0,
            ..SyncConfig::default()
        };
        assert!(sync.validate().is_err());
    }

    #[test]
    fn testing_config_disables_background_jobs() {
        let config = AppConfig::for_testing();
        assert!(!config.sync.poll_enabled);
        assert!(!config.sync.reconcile_enabled);
    }
}
