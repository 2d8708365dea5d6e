//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every section implements [`Default`]
//! and is marked `#[serde(default)]`, so partial files are accepted.

mod database;
mod logging;

pub use database::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/arbor/arbor.db", "poolSize": 8 },
///   "logging": { "level": "debug", "format": "pretty" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArborSettings {
    /// SQLite location and connection pool tuning.
    pub database: DatabaseSettings,
    /// Log level and output format.
    pub logging: LoggingSettings,
}

impl ArborSettings {
    /// Reject values that would make the store or logger unusable.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(SettingsError::InvalidValue("database.path is empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".into(),
            ));
        }
        if !is_level(&self.logging.level) {
            return Err(SettingsError::InvalidValue(format!(
                "unknown logging.level: {}",
                self.logging.level
            )));
        }
        for (module, level) in &self.logging.modules {
            if !is_level(level) {
                return Err(SettingsError::InvalidValue(format!(
                    "unknown level for module {module}: {level}"
                )));
            }
        }
        Ok(())
    }
}
