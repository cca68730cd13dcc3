use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Sends tracing output to the configured log file; the terminal belongs to
/// the UI. `RUST_LOG` takes precedence over `log.filter`. Returns the file in
/// use, or `None` when no log location is known.
pub fn init(cfg: &LogConfig) -> Result<Option<PathBuf>> {
    let Some(path) = cfg.file.clone() else {
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: failed to create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: failed to open {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    Ok(Some(path))
}
