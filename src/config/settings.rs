//! User settings (`config.toml`).
//!
//! Settings are plain TOML. Every key is optional and falls back to its
//! default, so an empty or missing file is a valid configuration.
//!
//! ```toml
//! update_method = "differential"
//! github_token = "ghp_xxxxxxxxxxxx"
//! debug_mode = false
//! http_timeout_secs = 30
//! max_parallel = 4
//! ```
//!
//! The file may hold a token and is written with `0600` permissions on Unix.

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_ENTRY_FILE, DEFAULT_EXECUTABLE_EXTENSION, DEFAULT_HTTP_TIMEOUT,
    DEFAULT_MAX_PARALLEL, DEFAULT_RAW_URL,
};
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::fetcher::FetcherConfig;
use crate::github::GitHubConfig;
use crate::installer::{InstallerConfig, UpdateStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Keys accepted by [`AppConfig::set`], in display order.
pub const SETTING_KEYS: &[&str] = &[
    "update-method",
    "github-token",
    "debug-mode",
    "api-url",
    "raw-url",
    "http-timeout-secs",
    "entry-file",
    "executable-extension",
    "max-parallel",
    "last-destination",
];

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Strategy used by `update`
    #[serde(default)]
    pub update_method: UpdateStrategy,

    /// Bearer token for the GitHub API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Also write debug logs to `app.log` in the configuration directory
    #[serde(default)]
    pub debug_mode: bool,

    /// GitHub REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL for raw file downloads
    #[serde(default = "default_raw_url")]
    pub raw_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// File marking the root of a usable script
    #[serde(default = "default_entry_file")]
    pub entry_file: String,

    /// Suffix selecting files for executable items
    #[serde(default = "default_executable_extension")]
    pub executable_extension: String,

    /// Items processed concurrently by `check` and `update`
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Parent directory last used by `add`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_destination: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_raw_url() -> String {
    DEFAULT_RAW_URL.to_string()
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT.as_secs()
}

fn default_entry_file() -> String {
    DEFAULT_ENTRY_FILE.to_string()
}

fn default_executable_extension() -> String {
    DEFAULT_EXECUTABLE_EXTENSION.to_string()
}

const fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            update_method: UpdateStrategy::default(),
            github_token: None,
            debug_mode: false,
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            http_timeout_secs: default_http_timeout_secs(),
            entry_file: default_entry_file(),
            executable_extension: default_executable_extension(),
            max_parallel: default_max_parallel(),
            last_destination: None,
        }
    }
}

impl AppConfig {
    /// Load settings from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ConfigError`] when the file exists but cannot be
    /// read or parsed.
    pub async fn load_from(path: &Path) -> KeeperResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to read settings from {}: {e}", path.display()),
        })?;

        toml::from_str(&content).map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to parse settings from {}: {e}", path.display()),
        })
    }

    /// Save settings to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> KeeperResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.fs_context("creating configuration directory", parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to serialize settings: {e}"),
        })?;
        fs::write(path, content).await.fs_context("writing settings", path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms =
                fs::metadata(path).await.fs_context("reading permissions of", path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.fs_context("restricting permissions of", path)?;
        }

        Ok(())
    }

    /// Connection settings for the GitHub client.
    ///
    /// `fallback_token` is used when no token is configured.
    #[must_use]
    pub fn github_config(&self, fallback_token: Option<String>) -> GitHubConfig {
        let token = self
            .github_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| fallback_token.filter(|t| !t.trim().is_empty()));
        GitHubConfig {
            api_url: self.api_url.clone(),
            raw_url: self.raw_url.clone(),
            token,
            timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
        }
    }

    /// Settings for the fetcher.
    #[must_use]
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            executable_extension: self.executable_extension.clone(),
            max_parallel_downloads: self.max_parallel.max(1),
        }
    }

    /// Settings for the installer.
    #[must_use]
    pub fn installer_config(&self) -> InstallerConfig {
        InstallerConfig {
            entry_file: self.entry_file.clone(),
        }
    }

    /// Current value of a setting as text. The token is masked.
    pub fn get(&self, key: &str) -> KeeperResult<String> {
        let value = match normalize_key(key).as_str() {
            "update-method" => self.update_method.to_string(),
            "github-token" => match &self.github_token {
                Some(token) if !token.is_empty() => mask(token),
                _ => String::new(),
            },
            "debug-mode" => self.debug_mode.to_string(),
            "api-url" => self.api_url.clone(),
            "raw-url" => self.raw_url.clone(),
            "http-timeout-secs" => self.http_timeout_secs.to_string(),
            "entry-file" => self.entry_file.clone(),
            "executable-extension" => self.executable_extension.clone(),
            "max-parallel" => self.max_parallel.to_string(),
            "last-destination" => {
                self.last_destination.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
            }
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a setting from text. An empty value clears optional settings.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ConfigError`] for unknown keys or invalid values.
    pub fn set(&mut self, key: &str, value: &str) -> KeeperResult<()> {
        let value = value.trim();
        let invalid = |expected: &str| KeeperError::ConfigError {
            message: format!("Invalid value '{value}' for {key}: expected {expected}"),
        };

        match normalize_key(key).as_str() {
            "update-method" => self.update_method = value.parse()?,
            "github-token" => {
                self.github_token = if value.is_empty() { None } else { Some(value.to_string()) };
            }
            "debug-mode" => self.debug_mode = value.parse().map_err(|_| invalid("true or false"))?,
            "api-url" => self.api_url = value.trim_end_matches('/').to_string(),
            "raw-url" => self.raw_url = value.trim_end_matches('/').to_string(),
            "http-timeout-secs" => {
                self.http_timeout_secs =
                    value.parse().ok().filter(|v| *v > 0).ok_or_else(|| invalid("seconds > 0"))?;
            }
            "entry-file" => {
                if value.is_empty() || value.contains(['/', '\\']) {
                    return Err(invalid("a plain file name"));
                }
                self.entry_file = value.to_string();
            }
            "executable-extension" => {
                if value.is_empty() {
                    return Err(invalid("a file suffix such as .exe"));
                }
                self.executable_extension = value.to_string();
            }
            "max-parallel" => {
                self.max_parallel =
                    value.parse().ok().filter(|v| *v > 0).ok_or_else(|| invalid("a number > 0"))?;
            }
            "last-destination" => {
                self.last_destination =
                    if value.is_empty() { None } else { Some(PathBuf::from(value)) };
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}

fn unknown_key(key: &str) -> KeeperError {
    KeeperError::ConfigError {
        message: format!("Unknown setting '{key}' (known: {})", SETTING_KEYS.join(", ")),
    }
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}****")
}
