//! Per-job diagnostic log files.
//!
//! Each catalog year gets its own `<log_dir>/<catalog_year>.log`, so the
//! interleaved output of concurrent jobs can be read one year at a time.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Path of the diagnostic log for `catalog_year`.
pub fn log_path(log_dir: &Path, catalog_year: &str) -> PathBuf {
    log_dir.join(format!("{catalog_year}.log"))
}

/// Builds a dispatcher that writes plain-text events to the year's log file,
/// truncating any log left by a previous run.
pub fn dispatch(log_dir: &Path, catalog_year: &str) -> io::Result<Dispatch> {
    fs::create_dir_all(log_dir)?;
    let file = File::create(log_path(log_dir, catalog_year))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn,acalog=debug"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .finish();

    Ok(Dispatch::new(subscriber))
}
