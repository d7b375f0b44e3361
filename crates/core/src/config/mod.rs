//! Core configuration
//!
//! A single TOML file controlling the runtime:
//! - Auto-generation of a default config on first load
//! - Manual reload
//! - Per-hook toggles
//!
//! # Example
//!
//! ```ignore
//! use xivmod_core::config::CoreConfig;
//!
//! let config = CoreConfig::load().unwrap_or_default();
//! if !config.enable_mods {
//!     tracing::info!("Mods disabled, overrides are inactive");
//! }
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{
    configs_dir, core_config_path, gamedata_path, logs_dir, set_base_dir, xivmod_base_dir, BASE_DIR_ENV,
};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Neither the loader nor the environment named a base directory
    #[error("Config directory not available - no base directory set and XIVMOD_DIR is empty")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which detours are enabled when the runtime starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookToggles {
    pub change_customize: bool,
    pub copy_character: bool,
    pub character_destructor: bool,
}

impl Default for HookToggles {
    fn default() -> Self {
        Self {
            change_customize: true,
            copy_character: true,
            character_destructor: true,
        }
    }
}

/// Core configuration
///
/// Loaded from `<base>/configs/core.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// `tracing` filter directive used when `XIVMOD_LOG` is unset
    pub log_filter: String,

    /// Master switch for every override
    pub enable_mods: bool,

    pub hooks: HookToggles,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_filter: "info".to_string(),
            enable_mods: true,
            hooks: HookToggles::default(),
        }
    }
}

impl CoreConfig {
    /// Load core config from file, creating default if missing
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&core_config_path()?)
    }

    /// Save core config to file
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&core_config_path()?)
    }

    /// Reload core config from file
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.reload_from(&core_config_path()?)
    }

    /// Load from an explicit path, creating default if missing
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload from an explicit path
    pub fn reload_from(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }

    /// Effective log filter: `debug` forces at least debug output
    pub fn effective_log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_filter
        }
    }
}
