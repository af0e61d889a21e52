//! Store configuration via `quadmem.toml`
//!
//! A persistent store reads its settings from a config file in the data
//! directory. On first open a default `quadmem.toml` is created; to change
//! settings, edit the file and reopen the store.

use std::path::Path;
use std::time::Duration;

use quadmem_concurrency::LockPolicy;
use quadmem_core::{QuadError, Result};
use serde::{Deserialize, Serialize};

/// Config file name placed in the store's data directory.
pub const CONFIG_FILE_NAME: &str = "quadmem.toml";

/// When committed changes are written to the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Write during every commit that changed something
    Immediate,
    /// Write once, when the store shuts down
    AtShutdown,
    /// Write after the store has been quiet for the given delay
    Debounced(Duration),
}

/// Store configuration loaded from `quadmem.toml`.
///
/// # Example
///
/// ```toml
/// persist = true
/// sync_delay_ms = 0
/// lock_policy = "read-preferring"
/// track_locks = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Write the data file.
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Sync delay in milliseconds: 0 immediate, negative at shutdown only,
    /// positive debounced.
    #[serde(default)]
    pub sync_delay_ms: i64,
    /// Fairness of the structural lock shared by scans and compaction.
    #[serde(default)]
    pub lock_policy: LockPolicy,
    /// Record every open lock guard for leak diagnosis.
    #[serde(default)]
    pub track_locks: bool,
}

fn default_persist() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            sync_delay_ms: 0,
            lock_policy: LockPolicy::default(),
            track_locks: false,
        }
    }
}

impl StoreConfig {
    /// Configuration for a volatile store
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    /// Sync schedule implied by `sync_delay_ms`
    pub fn sync_mode(&self) -> SyncMode {
        match self.sync_delay_ms {
            0 => SyncMode::Immediate,
            d if d < 0 => SyncMode::AtShutdown,
            d => SyncMode::Debounced(Duration::from_millis(d as u64)),
        }
    }

    /// Whether guards should be tracked
    ///
    /// Debug builds always track.
    pub fn tracks_locks(&self) -> bool {
        self.track_locks || cfg!(debug_assertions)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# quadmem store configuration
#
# Write the data file (quadmem.data). When false the directory only holds
# this file and the lock file.
persist = true

# When committed changes reach the data file:
#   0    = during every commit
#   < 0  = only when the store shuts down
#   > 0  = after this many milliseconds without a new commit
sync_delay_ms = 0

# Structural lock policy: "read-preferring" (default) or "write-preferring"
lock_policy = "read-preferring"

# Record every open lock guard and report leaks at shutdown (default: false)
# Always on in debug builds.
track_locks = false
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on malformed TOML or unknown values.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| QuadError::invalid_input(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuadError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            QuadError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                QuadError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| QuadError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            QuadError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
