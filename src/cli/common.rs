//! State shared by every subcommand.

use crate::config::{AppConfig, ConfigPaths, ManagedScriptRecord, ScriptRegistry};
use crate::fetcher::Fetcher;
use crate::github::GitHubClient;
use crate::installer::Installer;
use crate::manager::{BatchReport, ScriptManager};
use crate::utils::Spinner;
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Loaded configuration plus global flags.
pub struct CliContext {
    /// Configuration directory layout
    pub paths: ConfigPaths,
    /// Settings from `config.toml`
    pub settings: AppConfig,
    /// Token from the environment, used when the settings have none
    pub env_token: Option<String>,
    /// Whether spinners may be drawn
    pub progress: bool,
}

impl CliContext {
    /// Load settings from `paths`.
    pub async fn load(paths: ConfigPaths, env_token: Option<String>, progress: bool) -> Result<Self> {
        let settings = AppConfig::load_from(&paths.settings()).await?;
        Ok(Self {
            paths,
            settings,
            env_token,
            progress,
        })
    }

    /// A manager talking to GitHub with the current settings.
    pub fn manager(&self) -> Result<ScriptManager<GitHubClient>> {
        let client = GitHubClient::new(self.settings.github_config(self.env_token.clone()))?;
        let fetcher = Fetcher::new(client, self.settings.fetcher_config());
        let installer = Installer::new(fetcher, self.settings.installer_config());
        Ok(ScriptManager::new(installer, self.paths.locks(), self.settings.max_parallel))
    }

    /// The registry of managed scripts.
    pub async fn registry(&self) -> Result<ScriptRegistry> {
        Ok(ScriptRegistry::load_from(&self.paths.registry()).await?)
    }

    /// Persist `registry`.
    pub async fn save_registry(&self, registry: &ScriptRegistry) -> Result<()> {
        registry.save_to(&self.paths.registry()).await?;
        Ok(())
    }

    /// Persist the settings.
    pub async fn save_settings(&self) -> Result<()> {
        self.settings.save_to(&self.paths.settings()).await?;
        Ok(())
    }

    /// A spinner that respects `--no-progress`.
    pub fn spinner(&self, message: impl Into<String>) -> Spinner {
        Spinner::start(message, self.progress)
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

/// Records named in `names`, or all records when `names` is empty.
pub fn select(registry: &ScriptRegistry, names: &[String]) -> Result<Vec<ManagedScriptRecord>> {
    if names.is_empty() {
        return Ok(registry.iter().cloned().collect());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match registry.get(name) {
            Some(record) => selected.push(record.clone()),
            None => bail!(crate::core::KeeperError::ScriptNotFound {
                name: name.clone(),
            }),
        }
    }
    Ok(selected)
}

/// Look up one record.
pub fn find(registry: &ScriptRegistry, name: &str) -> Result<ManagedScriptRecord> {
    select(registry, &[name.to_string()]).map(|mut records| records.remove(0))
}

/// Print failures and the summary line of a batch.
pub fn print_batch(report: &BatchReport) {
    for failure in &report.failures {
        eprintln!("{} {failure}", "✗".red());
    }
    let summary = report.summary();
    if report.has_failures() {
        println!("\n{}", summary.yellow());
    } else {
        println!("\n{}", summary.green());
    }
}

/// Error returned when a batch had failures, after the report was printed.
pub fn batch_result(report: &BatchReport) -> Result<()> {
    if report.has_failures() {
        bail!("{} item(s) failed", report.failures.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        assert_eq!(expand_path(Path::new("scripts/tools")), PathBuf::from("scripts/tools"));
        let unset = Path::new("$SCRIPTKEEPER_UNSET_VAR_X/a");
        assert_eq!(expand_path(unset), unset.to_path_buf());
    }
}
