//! Remote snapshot fetching.
//!
//! The [`Fetcher`] turns a [`RemoteRef`] into a [`Snapshot`]: the files of the
//! requested subfolder at one resolved commit. How the files are obtained is a
//! [`FetchStrategy`], chosen by the item's [`Category`]:
//!
//! | Category     | Strategies, in order                         |
//! |--------------|----------------------------------------------|
//! | `script`     | folder archive                               |
//! | `executable` | release assets, then repository tree scan    |
//!
//! Every strategy first resolves the commit the ref points to and then
//! downloads content pinned to that commit, so [`Snapshot::commit`] always
//! describes the bytes in the snapshot.
//!
//! # Examples
//!
//! ```rust,no_run
//! use scriptkeeper::fetcher::{Category, Fetcher, FetcherConfig};
//! use scriptkeeper::github::{GitHubClient, GitHubConfig};
//! use scriptkeeper::source::RemoteRef;
//!
//! # async fn example() -> scriptkeeper::core::KeeperResult<()> {
//! let fetcher = Fetcher::new(GitHubClient::new(GitHubConfig::default())?, FetcherConfig::default());
//! let remote = RemoteRef::parse("https://github.com/acme/tools", "scripts/utils", None)?;
//! let snapshot = fetcher.fetch_for_category(&remote, Category::Script).await?;
//! println!("{} files at {}", snapshot.len(), snapshot.commit());
//! # Ok(())
//! # }
//! ```

mod archive;
mod snapshot;

pub use archive::{extract_subtree, validate_relative_path};
pub use snapshot::Snapshot;

use crate::constants::{DEFAULT_EXECUTABLE_EXTENSION, DEFAULT_MAX_PARALLEL};
use crate::core::{KeeperError, KeeperResult};
use crate::github::{RepositoryApi, TreeEntryKind};
use crate::source::{CommitIdentity, RemoteRef};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Kind of content a managed item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A folder of script sources
    #[default]
    Script,
    /// A set of platform executables published as release assets or committed files
    Executable,
}

impl Category {
    /// Strategies tried for this category, in order.
    #[must_use]
    pub const fn strategies(self) -> &'static [FetchStrategy] {
        match self {
            Self::Script => &[FetchStrategy::FolderArchive],
            Self::Executable => &[FetchStrategy::ReleaseAssets, FetchStrategy::TreeScan],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => f.write_str("script"),
            Self::Executable => f.write_str("executable"),
        }
    }
}

impl FromStr for Category {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "executable" => Ok(Self::Executable),
            other => Err(KeeperError::Other {
                message: format!("Unknown category '{other}' (expected 'script' or 'executable')"),
            }),
        }
    }
}

/// One way of obtaining a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Download the repository zip archive and extract the subfolder
    FolderArchive,
    /// Download matching assets of the latest release
    ReleaseAssets,
    /// List the repository tree and download matching files one by one
    TreeScan,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderArchive => f.write_str("folder archive"),
            Self::ReleaseAssets => f.write_str("release assets"),
            Self::TreeScan => f.write_str("repository tree"),
        }
    }
}

/// Settings for [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// File name suffix selecting files in the executable strategies (case-insensitive)
    pub executable_extension: String,
    /// Concurrent downloads in the tree scan strategy
    pub max_parallel_downloads: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            executable_extension: DEFAULT_EXECUTABLE_EXTENSION.to_string(),
            max_parallel_downloads: DEFAULT_MAX_PARALLEL,
        }
    }
}

/// Produces [`Snapshot`]s through a [`RepositoryApi`].
#[derive(Debug, Clone)]
pub struct Fetcher<A> {
    api: A,
    config: FetcherConfig,
}

impl<A: RepositoryApi> Fetcher<A> {
    /// Create a fetcher.
    pub const fn new(api: A, config: FetcherConfig) -> Self {
        Self {
            api,
            config,
        }
    }

    /// The underlying API.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// The ref to fetch: URL tree ref, then hint, then the default branch.
    pub async fn resolve_ref(&self, remote: &RemoteRef) -> KeeperResult<String> {
        match remote.explicit_ref() {
            Some(reference) => Ok(reference.to_string()),
            None => {
                let branch = self.api.default_branch(remote.location()).await?;
                debug!("Default branch of {} is '{branch}'", remote.location().full_name());
                Ok(branch)
            }
        }
    }

    /// Commit the remote ref currently points to, without downloading content.
    pub async fn resolve_commit_identity(&self, remote: &RemoteRef) -> KeeperResult<CommitIdentity> {
        let reference = self.resolve_ref(remote).await?;
        self.api.commit_identity(remote.location(), &reference).await
    }

    /// Fetch with the strategies of `category`, in order.
    ///
    /// A strategy that finds no matching files hands over to the next one;
    /// any other error is returned immediately.
    pub async fn fetch_for_category(
        &self,
        remote: &RemoteRef,
        category: Category,
    ) -> KeeperResult<Snapshot> {
        let strategies = category.strategies();
        let mut last_error = None;

        for (index, strategy) in strategies.iter().enumerate() {
            match self.fetch(remote, *strategy).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e @ KeeperError::NoMatchingFiles {
                    ..
                }) if index + 1 < strategies.len() => {
                    info!("{e}; trying {}", strategies[index + 1]);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| KeeperError::Other {
            message: format!("No fetch strategy configured for category '{category}'"),
        }))
    }

    /// Fetch with one strategy.
    pub async fn fetch(&self, remote: &RemoteRef, strategy: FetchStrategy) -> KeeperResult<Snapshot> {
        let reference = self.resolve_ref(remote).await?;
        let commit = self.api.commit_identity(remote.location(), &reference).await?;
        info!("Fetching {remote} at {} via {strategy}", commit.short());

        let files = match strategy {
            FetchStrategy::FolderArchive => self.folder_archive(remote, &reference, &commit).await?,
            FetchStrategy::ReleaseAssets => self.release_assets(remote).await?,
            FetchStrategy::TreeScan => self.tree_scan(remote, &reference, &commit).await?,
        };

        Snapshot::new(commit, files)
    }

    async fn folder_archive(
        &self,
        remote: &RemoteRef,
        reference: &str,
        commit: &CommitIdentity,
    ) -> KeeperResult<BTreeMap<String, Vec<u8>>> {
        let bytes = self.api.zipball(remote.location(), commit.as_str()).await?;
        extract_subtree(
            &bytes,
            &remote.effective_subfolder(),
            &remote.location().full_name(),
            reference,
        )
    }

    async fn release_assets(&self, remote: &RemoteRef) -> KeeperResult<BTreeMap<String, Vec<u8>>> {
        let no_match = || KeeperError::NoMatchingFiles {
            repository: remote.location().full_name(),
            extension: self.config.executable_extension.clone(),
            source_kind: FetchStrategy::ReleaseAssets.to_string(),
        };

        let Some(release) = self.api.latest_release(remote.location()).await? else {
            return Err(no_match());
        };

        let mut files = BTreeMap::new();
        for asset in release.assets.iter().filter(|a| self.matches_extension(&a.name)) {
            if validate_relative_path(&asset.name).is_err() {
                warn!("Skipping release asset with unsafe name '{}'", asset.name);
                continue;
            }
            debug!("Downloading asset '{}' from release {}", asset.name, release.tag);
            files.insert(asset.name.clone(), self.api.download_asset(asset).await?);
        }

        if files.is_empty() {
            return Err(no_match());
        }
        Ok(files)
    }

    async fn tree_scan(
        &self,
        remote: &RemoteRef,
        reference: &str,
        commit: &CommitIdentity,
    ) -> KeeperResult<BTreeMap<String, Vec<u8>>> {
        let subfolder = remote.effective_subfolder();
        let entries = self.api.tree(remote.location(), commit.as_str()).await?;

        if !subfolder.is_empty()
            && !entries.iter().any(|e| e.kind == TreeEntryKind::Tree && e.path == subfolder)
        {
            return Err(KeeperError::FolderNotFound {
                folder: subfolder,
                repository: remote.location().full_name(),
                reference: reference.to_string(),
            });
        }

        let prefix = if subfolder.is_empty() { String::new() } else { format!("{subfolder}/") };
        let wanted: Vec<(String, String)> = entries
            .into_iter()
            .filter(|e| e.kind == TreeEntryKind::Blob && self.matches_extension(&e.path))
            .filter_map(|e| {
                let relative = e.path.strip_prefix(&prefix)?.to_string();
                Some((e.path, relative))
            })
            .collect();

        if wanted.is_empty() {
            return Err(KeeperError::NoMatchingFiles {
                repository: remote.location().full_name(),
                extension: self.config.executable_extension.clone(),
                source_kind: FetchStrategy::TreeScan.to_string(),
            });
        }

        let location = remote.location();
        let files: Vec<(String, Vec<u8>)> = stream::iter(wanted)
            .map(|(path, relative)| async move {
                let content = self.api.download_file(location, commit.as_str(), &path).await?;
                Ok::<_, KeeperError>((relative, content))
            })
            .buffer_unordered(self.config.max_parallel_downloads.max(1))
            .try_collect()
            .await?;

        Ok(files.into_iter().collect())
    }

    fn matches_extension(&self, name: &str) -> bool {
        name.to_ascii_lowercase().ends_with(&self.config.executable_extension.to_ascii_lowercase())
    }
}
