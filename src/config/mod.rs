//! Configuration for scriptkeeper
//!
//! Everything lives in one configuration directory:
//!
//! ```text
//! ~/.scriptkeeper/              (Windows: %LOCALAPPDATA%\scriptkeeper)
//!   config.toml                 user settings, see [`AppConfig`]
//!   managed_scripts.json        managed items, see [`ScriptRegistry`]
//!   app.log                     debug log, only with debug_mode enabled
//!   locks/                      per-installation lock files
//! ```
//!
//! The library never reads the environment to locate this directory; the CLI
//! resolves it (flag, `SCRIPTKEEPER_HOME`, platform default) and passes a
//! [`ConfigPaths`] down.

pub mod registry;
pub mod settings;

pub use registry::{ManagedScriptRecord, ScriptRegistry, UpdateStatus};
pub use settings::{AppConfig, SETTING_KEYS};

use crate::constants::{DEBUG_LOG_FILE_NAME, REGISTRY_FILE_NAME, SETTINGS_FILE_NAME};
use crate::core::{KeeperError, KeeperResult};
use std::path::{Path, PathBuf};

/// Locations of the files inside a configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    /// Paths inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Platform default configuration directory.
    ///
    /// - **Windows**: `%LOCALAPPDATA%\scriptkeeper`
    /// - **Unix/macOS**: `~/.scriptkeeper`
    ///
    /// # Errors
    ///
    /// Fails when the home or local data directory cannot be determined.
    pub fn default_dir() -> KeeperResult<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| KeeperError::ConfigError {
                    message: "Unable to determine local data directory".to_string(),
                })?
                .join("scriptkeeper")
        } else {
            dirs::home_dir()
                .ok_or_else(|| KeeperError::ConfigError {
                    message: "Unable to determine home directory".to_string(),
                })?
                .join(".scriptkeeper")
        };
        Ok(dir)
    }

    /// The configuration directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `config.toml`
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    /// `managed_scripts.json`
    #[must_use]
    pub fn registry(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE_NAME)
    }

    /// `app.log`
    #[must_use]
    pub fn debug_log(&self) -> PathBuf {
        self.dir.join(DEBUG_LOG_FILE_NAME)
    }

    /// `locks/`
    #[must_use]
    pub fn locks(&self) -> PathBuf {
        self.dir.join("locks")
    }
}
