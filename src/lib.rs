//! scriptkeeper - keep GitHub-hosted script folders up to date
//!
//! scriptkeeper installs a subfolder of a GitHub repository into a local
//! directory and keeps it in sync with the remote. Before each update the
//! installed version is copied into an `Older Versions` folder inside the
//! installation, so any previous version can be restored.
//!
//! # Architecture Overview
//!
//! An update flows through these layers:
//!
//! 1. [`source`] parses the repository URL and subfolder into a [`source::RemoteRef`]
//! 2. [`fetcher`] resolves the ref to a commit and downloads a
//!    [`fetcher::Snapshot`] through a [`github::RepositoryApi`]
//! 3. [`installer`] applies the snapshot (overwrite or differential sync) and
//!    normalises a wrapper folder around the entry file
//! 4. [`archive`] keeps the version history under `Older Versions`
//! 5. [`manager`] decides when to update and archive, per item and in batches
//!
//! [`config`] holds the settings and the registry of managed scripts; [`cli`]
//! wires everything to the command line.
//!
//! # Core Modules
//!
//! - [`archive`] - version slots, restore, per-installation locks
//! - [`cli`] - command-line interface
//! - [`config`] - `config.toml` settings and `managed_scripts.json` registry
//! - [`constants`] - names, formats and defaults
//! - [`core`] - error types and user-facing error formatting
//! - [`fetcher`] - fetch strategies and snapshots
//! - [`github`] - GitHub REST client
//! - [`installer`] - layout normalisation and differential sync
//! - [`manager`] - update policy
//! - [`source`] - repository locations and commit identities
//! - [`utils`] - file system helpers, logging and progress
//!
//! # Example
//!
//! ```rust,no_run
//! use scriptkeeper::fetcher::{Category, Fetcher, FetcherConfig};
//! use scriptkeeper::github::{GitHubClient, GitHubConfig};
//! use scriptkeeper::installer::{Installer, InstallerConfig, UpdateStrategy};
//! use scriptkeeper::source::RemoteRef;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GitHubClient::new(GitHubConfig::default())?;
//! let installer = Installer::new(
//!     Fetcher::new(client, FetcherConfig::default()),
//!     InstallerConfig::default(),
//! );
//!
//! let remote = RemoteRef::parse("https://github.com/acme/tools", "scripts/utils", None)?;
//! let outcome = installer
//!     .update(&remote, Path::new("scripts/utils"), Category::Script, UpdateStrategy::Differential)
//!     .await?;
//! println!("installed {}", outcome.commit.short());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetcher;
pub mod github;
pub mod installer;
pub mod manager;
pub mod source;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
