//! Config path resolution
//!
//! Paths are resolved relative to the xivmod base directory. The loader passes
//! it in at load time; `XIVMOD_DIR` is used when it did not.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{ConfigError, ConfigResult};

/// Environment variable naming the base directory
pub const BASE_DIR_ENV: &str = "XIVMOD_DIR";

static BASE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Set the base directory; only the first call has an effect
pub fn set_base_dir(path: impl Into<PathBuf>) -> bool {
    BASE_DIR.set(path.into()).is_ok()
}

/// Returns the xivmod base directory
///
/// Layout:
/// ```text
/// <base>/configs/core.toml
/// <base>/gamedata/gamedata.json
/// <base>/logs/xivmod.log
/// ```
pub fn xivmod_base_dir() -> ConfigResult<PathBuf> {
    if let Some(base) = BASE_DIR.get() {
        return Ok(base.clone());
    }
    std::env::var_os(BASE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the configs directory
///
/// Path: `<base>/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(xivmod_base_dir()?.join("configs"))
}

/// Returns the core config path
///
/// Path: `<base>/configs/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join("core.toml"))
}

/// Returns the gamedata path
///
/// Path: `<base>/gamedata/gamedata.json`
pub fn gamedata_path() -> ConfigResult<PathBuf> {
    Ok(gamedata_path_in(&xivmod_base_dir()?))
}

/// Returns the log directory
///
/// Path: `<base>/logs/`
pub fn logs_dir() -> ConfigResult<PathBuf> {
    Ok(xivmod_base_dir()?.join("logs"))
}

pub(crate) fn gamedata_path_in(base: &Path) -> PathBuf {
    base.join("gamedata").join("gamedata.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gamedata_path_format() {
        let path = gamedata_path_in(Path::new("/opt/xivmod"));
        assert!(path.ends_with("gamedata/gamedata.json"));
    }
}
