//! Command-line interface for scriptkeeper.
//!
//! # Commands
//!
//! - `add` - start managing a repository subfolder
//! - `list` - show managed scripts and their status
//! - `check` - look for updates without changing anything
//! - `update` - apply updates, archiving the previous version
//! - `versions` - show the archived versions of an item
//! - `restore` - put an archived version back
//! - `remove` - stop managing an item
//! - `config` - read and change settings
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - console log level
//! - `--config-dir` - configuration directory (env `SCRIPTKEEPER_HOME`)
//! - `--no-progress` - never draw spinners
//!
//! A GitHub token is read from the `github_token` setting, falling back to
//! `GITHUB_TOKEN`.

mod add;
mod check;
mod common;
mod config;
mod list;
mod remove;
mod restore;
mod update;
mod versions;

use crate::config::ConfigPaths;
use crate::constants::{HOME_ENV_VAR, TOKEN_ENV_VAR};
use crate::utils::init_logging;
use anyhow::Result;
use clap::{Parser, Subcommand};
use common::CliContext;
use std::path::PathBuf;
use tracing::Level;

/// Keep GitHub-hosted script folders up to date, with a local version history.
#[derive(Parser, Debug)]
#[command(name = "scriptkeeper", version, author, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration directory
    #[arg(long, global = true, env = HOME_ENV_VAR)]
    config_dir: Option<PathBuf>,

    /// Disable spinners
    #[arg(long, global = true)]
    no_progress: bool,

    /// GitHub token used when the settings hold none
    #[arg(long, global = true, env = TOKEN_ENV_VAR, hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start managing a repository subfolder
    Add(add::AddCommand),
    /// Show managed scripts
    List(list::ListCommand),
    /// Check for updates without changing anything
    Check(check::CheckCommand),
    /// Update managed scripts
    Update(update::UpdateCommand),
    /// Show archived versions of an item
    Versions(versions::VersionsCommand),
    /// Restore an archived version
    Restore(restore::RestoreCommand),
    /// Stop managing an item
    Remove(remove::RemoveCommand),
    /// Read and change settings
    Config(config::ConfigCommand),
}

impl Cli {
    /// Console log level for the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::WARN
        }
    }

    fn config_paths(&self) -> Result<ConfigPaths> {
        let dir = match &self.config_dir {
            Some(dir) => common::expand_path(dir),
            None => ConfigPaths::default_dir()?,
        };
        Ok(ConfigPaths::new(dir))
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let paths = self.config_paths()?;
        let token = self.github_token.clone().filter(|t| !t.trim().is_empty());
        let ctx = CliContext::load(paths, token, !self.no_progress).await?;

        let debug_log = ctx.settings.debug_mode.then(|| ctx.paths.debug_log());
        init_logging(self.log_level(), debug_log.as_deref())?;
        tracing::debug!("Configuration directory: {}", ctx.paths.dir().display());

        match self.command {
            Commands::Add(cmd) => cmd.execute(ctx).await,
            Commands::List(cmd) => cmd.execute(ctx).await,
            Commands::Check(cmd) => cmd.execute(ctx).await,
            Commands::Update(cmd) => cmd.execute(ctx).await,
            Commands::Versions(cmd) => cmd.execute(ctx).await,
            Commands::Restore(cmd) => cmd.execute(ctx).await,
            Commands::Remove(cmd) => cmd.execute(ctx).await,
            Commands::Config(cmd) => cmd.execute(ctx).await,
        }
    }
}
