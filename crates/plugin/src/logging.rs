//! Tracing subscriber setup
//!
//! Logs go to `<base>/logs/xivmod.log` when the base directory is known and
//! writable, stderr otherwise. `XIVMOD_LOG` overrides the configured filter.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use xivmod_core::config::CoreConfig;

/// Environment variable holding a `tracing` filter directive
const LOG_ENV: &str = "XIVMOD_LOG";

pub fn init(logs_dir: Option<&Path>, config: &CoreConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.effective_log_filter()));

    let file = logs_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        File::options()
            .create(true)
            .append(true)
            .open(dir.join("xivmod.log"))
            .ok()
    });

    // A subscriber may already be installed if the loader reloads us
    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}
