//! Arbitrator configuration via `strata-occ.toml`
//!
//! A plain config file, same model as the database's `strata.toml`: load it
//! once at startup, edit and restart to change behavior.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::{StrataError, StrataResult};

/// Config file name placed next to the data it governs.
pub const CONFIG_FILE_NAME: &str = "strata-occ.toml";

/// How conflicts found in one commit are surfaced
///
/// A commit that touches N stale records produces N conflicts. `PerRecord`
/// reports and logs each row on its own. `Batched` suppresses the per-row
/// detail and folds them into a single aggregated failure and a single log
/// line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReporting {
    /// One aggregated failure per rolled-back commit
    Batched,
    /// One failure per conflicting record
    #[default]
    PerRecord,
}

/// Arbitrator configuration loaded from `strata-occ.toml`.
///
/// # Example
///
/// ```toml
/// # "per-record" (default) or "batched"
/// conflict_reporting = "per-record"
///
/// # Optional cap on buffered writes per session
/// # max_pending_writes = 10000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitratorConfig {
    /// Conflict reporting mode
    #[serde(default)]
    pub conflict_reporting: ConflictReporting,
    /// Maximum number of distinct records a session may buffer writes for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pending_writes: Option<usize>,
}

impl ArbitratorConfig {
    /// One aggregated failure and one log line per rejected commit
    pub fn batched() -> Self {
        Self {
            conflict_reporting: ConflictReporting::Batched,
            ..Self::default()
        }
    }

    /// One failure and one log line per conflicting record (the default)
    pub fn per_record() -> Self {
        Self::default()
    }

    /// Cap the number of buffered writes per session
    pub fn with_max_pending_writes(mut self, limit: usize) -> Self {
        self.max_pending_writes = Some(limit);
        self
    }

    /// Check if conflicts are reported as a single batch
    pub fn is_batched(&self) -> bool {
        self.conflict_reporting == ConflictReporting::Batched
    }

    /// Reject settings that cannot work.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_pending_writes` is zero.
    pub fn validate(&self) -> StrataResult<()> {
        if self.max_pending_writes == Some(0) {
            return Err(StrataError::config(
                "max_pending_writes must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata OCC configuration
#
# Conflict reporting: "per-record" (default) or "batched"
#   "per-record" = one failure and one warning for every stale record
#   "batched"    = one aggregated rollback failure and one warning per commit
conflict_reporting = "per-record"

# Maximum number of records a single session may buffer writes for.
# Unset means unlimited.
# max_pending_writes = 10000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ArbitratorConfig = toml::from_str(&content).map_err(|e| {
            StrataError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StrataResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StrataError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StrataResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrataError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StrataError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
