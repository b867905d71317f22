//! Update orchestration for one installation directory.
//!
//! [`Installer::update`] fetches a snapshot and applies it with one of two
//! strategies:
//!
//! - **Overwrite**: replace the installation with the snapshot, carrying the
//!   `Older Versions` directory across, then run layout normalisation
//! - **Differential**: copy only files whose content changed, never delete
//!
//! The installer is the mechanism only. Whether to archive the current state
//! before updating, and whether an update is needed at all, is decided by the
//! caller (see [`crate::manager`]).
//!
//! # Failure behaviour
//!
//! The snapshot is always fetched before anything on disk is touched, so a
//! network or archive failure leaves the installation as it was. An overwrite
//! interrupted after deletion leaves the installation empty apart from the
//! archive directory; differential updates degrade more gracefully.
//!
//! Filesystem work runs on the blocking thread pool.

pub mod normalize;
pub mod sync;

pub use normalize::{NormalizeOutcome, normalize};
pub use sync::{SyncReport, sync};

use crate::constants::{DEFAULT_ENTRY_FILE, OLDER_VERSIONS_DIR};
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::fetcher::{Category, FetchStrategy, Fetcher, Snapshot};
use crate::github::RepositoryApi;
use crate::source::{CommitIdentity, RemoteRef};
use crate::utils::fs::{ensure_dir, remove_dir_all};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How a fetched snapshot is applied to an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Replace everything except the archive directory
    #[default]
    Overwrite,
    /// Write only new or changed files
    Differential,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Differential => f.write_str("differential"),
        }
    }
}

impl FromStr for UpdateStrategy {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "differential" => Ok(Self::Differential),
            other => Err(KeeperError::ConfigError {
                message: format!(
                    "Unknown update method '{other}' (expected 'overwrite' or 'differential')"
                ),
            }),
        }
    }
}

/// Settings for [`Installer`].
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// File whose presence marks a usable script root
    pub entry_file: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
        }
    }
}

/// What an update did.
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Commit now installed
    pub commit: CommitIdentity,
    /// Strategy that was applied
    pub strategy: UpdateStrategy,
    /// Installation root; unchanged by normalisation
    pub root: PathBuf,
    /// Files in the applied snapshot
    pub files: usize,
    /// Per-file results of a differential update
    pub sync_report: Option<SyncReport>,
    /// Whether layout normalisation promoted a wrapping directory
    pub normalized: bool,
    /// Whether the category fetch failed and the folder archive was used instead
    pub used_fallback: bool,
    /// Non-fatal problems: a failed category fetch before fallback, a
    /// rolled-back layout promotion
    pub warnings: Vec<KeeperError>,
}

/// Applies remote snapshots to installation directories.
#[derive(Debug, Clone)]
pub struct Installer<A> {
    fetcher: Fetcher<A>,
    config: InstallerConfig,
}

impl<A: RepositoryApi> Installer<A> {
    /// Create an installer.
    pub const fn new(fetcher: Fetcher<A>, config: InstallerConfig) -> Self {
        Self {
            fetcher,
            config,
        }
    }

    /// The fetcher used for downloads and commit lookups.
    pub const fn fetcher(&self) -> &Fetcher<A> {
        &self.fetcher
    }

    /// Bring `root` to the current state of `remote`.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when no snapshot could be obtained (nothing on
    /// disk changed), or a filesystem error from applying it.
    pub async fn update(
        &self,
        remote: &RemoteRef,
        root: &Path,
        category: Category,
        strategy: UpdateStrategy,
    ) -> KeeperResult<UpdateOutcome> {
        let mut warnings = Vec::new();
        let (snapshot, used_fallback) = self.fetch(remote, category, &mut warnings).await?;
        let commit = snapshot.commit().clone();
        let files = snapshot.len();
        info!("Applying {remote} at {} to {} ({strategy})", commit.short(), root.display());

        let root_buf = root.to_path_buf();
        let (sync_report, normalized) = match strategy {
            UpdateStrategy::Overwrite => {
                let entry_file = self.config.entry_file.clone();
                let outcome =
                    blocking(move || replace_installation(&snapshot, &root_buf, &entry_file))
                        .await?;
                if let Some(warning) = outcome.warning {
                    warnings.push(warning);
                }
                (None, outcome.promoted)
            }
            UpdateStrategy::Differential => {
                let report = blocking(move || sync(&snapshot, &root_buf)).await?;
                (Some(report), false)
            }
        };

        Ok(UpdateOutcome {
            commit,
            strategy,
            root: root.to_path_buf(),
            files,
            sync_report,
            normalized,
            used_fallback,
            warnings,
        })
    }

    /// Fetch for `category`, falling back to the folder archive when a
    /// category-specific fetch fails.
    async fn fetch(
        &self,
        remote: &RemoteRef,
        category: Category,
        warnings: &mut Vec<KeeperError>,
    ) -> KeeperResult<(Snapshot, bool)> {
        match self.fetcher.fetch_for_category(remote, category).await {
            Ok(snapshot) => Ok((snapshot, false)),
            Err(e) if category != Category::Script => {
                warn!("{category} fetch of {remote} failed ({e}); falling back to folder archive");
                warnings.push(e);
                let snapshot = self.fetcher.fetch(remote, FetchStrategy::FolderArchive).await?;
                Ok((snapshot, true))
            }
            Err(e) => Err(e),
        }
    }
}

/// Run blocking filesystem work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> KeeperResult<T>
where
    F: FnOnce() -> KeeperResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| KeeperError::Other {
        message: format!("Background task failed: {e}"),
    })?
}

/// Replace the contents of `root` with `snapshot`, keeping `Older Versions`.
///
/// The archive directory is moved next to `root` for the duration and moved
/// back afterwards, also when materialising fails.
fn replace_installation(
    snapshot: &Snapshot,
    root: &Path,
    entry_file: &str,
) -> KeeperResult<NormalizeOutcome> {
    let archive = root.join(OLDER_VERSIONS_DIR);
    let parked = if archive.is_dir() {
        let parked = parking_path(root)?;
        std::fs::rename(&archive, &parked).fs_context("moving archive aside from", &archive)?;
        debug!("Parked {} at {}", archive.display(), parked.display());
        Some(parked)
    } else {
        None
    };

    let applied = remove_dir_all(root)
        .and_then(|()| ensure_dir(root))
        .and_then(|()| snapshot.materialize(root));

    if let Some(parked) = parked {
        ensure_dir(root)?;
        std::fs::rename(&parked, &archive).map_err(|e| KeeperError::FileSystemError {
            operation: "restoring archive directory".to_string(),
            path: archive.display().to_string(),
            reason: format!("{e}; archived versions remain in {}", parked.display()),
        })?;
    }

    let written = applied?;
    debug!("Replaced {} with {written} files", root.display());
    normalize(root, entry_file)
}

/// A free sibling path of `root` for parking the archive directory.
fn parking_path(root: &Path) -> KeeperResult<PathBuf> {
    let parent = root.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    (0..1000)
        .map(|i| parent.join(format!(".{name}.older-versions.{}.{i}", std::process::id())))
        .find(|p| !p.exists())
        .ok_or_else(|| KeeperError::FileSystemError {
            operation: "parking archive directory".to_string(),
            path: root.display().to_string(),
            reason: "no free temporary name".to_string(),
        })
}
