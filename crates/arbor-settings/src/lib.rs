//! # arbor-settings
//!
//! Configuration for the Arbor branching engine, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`ArborSettings::default()`]
//! 2. **User file**: `~/.arbor/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ARBOR_*` overrides (highest priority)
//!
//! ```no_run
//! let settings = arbor_settings::load_settings().unwrap_or_default();
//! println!("database: {}", settings.database.path);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
