use super::archive::validate_relative_path;
use crate::constants::OLDER_VERSIONS_DIR;
use crate::core::{IoResultExt, KeeperResult};
use crate::source::CommitIdentity;
use crate::utils::fs::ensure_parent_dir;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// The fetched file set of one ref, rooted at the requested subfolder.
///
/// Paths are relative, use `/` separators and never escape the root. A
/// snapshot lives only as long as the update that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    commit: CommitIdentity,
    files: BTreeMap<String, Vec<u8>>,
}

impl Snapshot {
    /// Build a snapshot, validating every path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::KeeperError::ArchiveCorrupt`] for any path that
    /// is absolute, empty, or contains `.`/`..` components.
    pub fn new(commit: CommitIdentity, files: BTreeMap<String, Vec<u8>>) -> KeeperResult<Self> {
        for path in files.keys() {
            validate_relative_path(path)?;
        }
        Ok(Self {
            commit,
            files,
        })
    }

    /// Commit the content was taken from.
    #[must_use]
    pub const fn commit(&self) -> &CommitIdentity {
        &self.commit
    }

    /// Relative path to content.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every file under `dir`, creating directories as needed.
    ///
    /// Files inside a top-level `Older Versions` directory are skipped so
    /// fetched content can never shadow the archive. Returns the number of
    /// files written.
    pub fn materialize(&self, dir: &Path) -> KeeperResult<usize> {
        let mut written = 0;
        for (relative, content) in &self.files {
            if relative.split('/').next() == Some(OLDER_VERSIONS_DIR) {
                warn!("Skipping '{relative}': reserved archive directory in fetched content");
                continue;
            }
            let target = dir.join(relative);
            ensure_parent_dir(&target)?;
            std::fs::write(&target, content).fs_context("writing", &target)?;
            written += 1;
        }
        debug!("Materialized {written} files into {}", dir.display());
        Ok(written)
    }
}
