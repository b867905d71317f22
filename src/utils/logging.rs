//! Tracing setup for the command-line binary.
//!
//! Console output goes to stderr at the level chosen by `--verbose`/`--quiet`
//! unless `RUST_LOG` overrides it. With debug mode enabled, a second layer
//! appends everything at debug level to `app.log` in the configuration
//! directory.

use crate::core::{IoResultExt, KeeperResult};
use crate::utils::fs::ensure_parent_dir;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn console_filter(level: Level) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("scriptkeeper={level}"))
    }
}

/// Install the global subscriber.
///
/// Calling this twice is harmless; the second subscriber is discarded.
///
/// # Errors
///
/// Fails when the debug log file cannot be opened.
pub fn init_logging(level: Level, debug_log: Option<&Path>) -> KeeperResult<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter(level));

    let file = match debug_log {
        Some(path) => {
            ensure_parent_dir(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .fs_context("opening debug log", path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new("scriptkeeper=debug")),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry().with(console).with(file).try_init();
    Ok(())
}
