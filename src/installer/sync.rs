//! Differential synchronisation of a snapshot onto an installation.
//!
//! The snapshot is first materialised into a temporary directory. Each file
//! there is then compared by content digest against the file at the same
//! relative path under the installation root:
//!
//! - same digest: left alone (`unchanged`)
//! - different digest: overwritten (`updated`)
//! - no local file: written (`added`)
//!
//! Local files absent from the snapshot are never deleted, which keeps local
//! customisations. The `Older Versions` directory is excluded on both sides.

use crate::constants::OLDER_VERSIONS_DIR;
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::fetcher::Snapshot;
use crate::utils::fs::{calculate_checksum, ensure_dir, ensure_parent_dir};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Counts and file lists produced by [`sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files that existed locally with different content and were overwritten
    pub updated: usize,
    /// Files that did not exist locally and were written
    pub added: usize,
    /// Files whose local content already matched
    pub unchanged: usize,
    /// Files compared in total
    pub compared: usize,
    /// Relative paths of updated files
    pub updated_files: Vec<String>,
    /// Relative paths of added files
    pub added_files: Vec<String>,
}

impl SyncReport {
    /// Whether anything was written.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.updated + self.added > 0
    }
}

/// Reconcile `snapshot` onto `root`, writing only files whose content differs.
///
/// `root` is created when missing.
///
/// # Errors
///
/// - [`KeeperError::FileSystemError`] if the snapshot cannot be materialised,
///   a local directory sits where a snapshot file belongs, or a write fails
///
/// An unreadable local file is not an error: it is logged and overwritten,
/// never assumed unchanged.
pub fn sync(snapshot: &Snapshot, root: &Path) -> KeeperResult<SyncReport> {
    let staging = tempfile::tempdir().fs_context("creating temporary directory for", root)?;
    snapshot.materialize(staging.path())?;
    ensure_dir(root)?;

    let mut report = SyncReport::default();

    let walker = WalkDir::new(staging.path())
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() != 1 || e.file_name() != OLDER_VERSIONS_DIR);

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(staging.path())
            .map_err(|e| KeeperError::Other {
                message: format!("unexpected staging path {}: {e}", entry.path().display()),
            })?
            .to_path_buf();
        let relative_display = relative.to_string_lossy().replace('\\', "/");
        let local = root.join(&relative);
        report.compared += 1;

        let existed = if local.is_dir() {
            return Err(KeeperError::FileSystemError {
                operation: "updating".to_string(),
                path: local.display().to_string(),
                reason: "a directory exists where the remote has a file".to_string(),
            });
        } else if local.exists() {
            let remote_digest = calculate_checksum(entry.path())?;
            match calculate_checksum(&local) {
                Ok(local_digest) if local_digest == remote_digest => {
                    debug!("Unchanged: {relative_display}");
                    report.unchanged += 1;
                    continue;
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("Cannot hash local {relative_display} ({e}); overwriting it");
                    true
                }
            }
        } else {
            false
        };

        ensure_parent_dir(&local)?;
        std::fs::copy(entry.path(), &local).fs_context("writing", &local)?;

        if existed {
            debug!("Updated: {relative_display}");
            report.updated += 1;
            report.updated_files.push(relative_display);
        } else {
            debug!("Added: {relative_display}");
            report.added += 1;
            report.added_files.push(relative_display);
        }
    }

    info!(
        "Synced {}: {} updated, {} added, {} unchanged",
        root.display(),
        report.updated,
        report.added,
        report.unchanged
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CommitIdentity;
    use crate::test_utils::{read_tree, write_tree};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn snapshot(files: &[(&str, &str)]) -> Snapshot {
        let files: BTreeMap<String, Vec<u8>> =
            files.iter().map(|(p, c)| ((*p).to_string(), c.as_bytes().to_vec())).collect();
        Snapshot::new(CommitIdentity::new("98765432aaaa").unwrap(), files).unwrap()
    }

    #[test]
    fn test_counts_and_writes() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a.lua", "X"), ("b.lua", "Y")]);

        let report =
            sync(&snapshot(&[("a.lua", "Z"), ("b.lua", "Y"), ("sub/c.lua", "C")]), temp.path())
                .unwrap();

        assert_eq!((report.updated, report.added, report.unchanged, report.compared), (1, 1, 1, 3));
        assert_eq!(report.updated_files, vec!["a.lua"]);
        assert_eq!(report.added_files, vec!["sub/c.lua"]);
        assert_eq!(std::fs::read_to_string(temp.path().join("a.lua")).unwrap(), "Z");
        assert_eq!(std::fs::read_to_string(temp.path().join("sub/c.lua")).unwrap(), "C");
    }

    #[test]
    fn test_local_only_files_survive() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("custom.lua", "mine"), ("cfg/user.ini", "keep")]);

        sync(&snapshot(&[("a.lua", "X")]), temp.path()).unwrap();

        assert_eq!(std::fs::read_to_string(temp.path().join("custom.lua")).unwrap(), "mine");
        assert_eq!(std::fs::read_to_string(temp.path().join("cfg/user.ini")).unwrap(), "keep");
    }

    #[test]
    fn test_identical_content_writes_nothing() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a.lua", "X"), ("lib/b.lua", "Y")]);
        let mtime = |p: &str| std::fs::metadata(temp.path().join(p)).unwrap().modified().unwrap();
        let before = (mtime("a.lua"), mtime("lib/b.lua"));

        let report = sync(&snapshot(&[("a.lua", "X"), ("lib/b.lua", "Y")]), temp.path()).unwrap();

        assert!(!report.changed());
        assert_eq!(report.unchanged, 2);
        assert_eq!((mtime("a.lua"), mtime("lib/b.lua")), before);
    }

    #[test]
    fn test_archive_directory_is_untouched() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("Older Versions/slot/a.lua", "old")]);

        let report = sync(
            &snapshot(&[("a.lua", "X"), ("Older Versions/slot/a.lua", "hijack")]),
            temp.path(),
        )
        .unwrap();

        assert_eq!(report.compared, 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("Older Versions/slot/a.lua")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_directory_in_place_of_file_is_an_error() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("a.lua")).unwrap();

        let err = sync(&snapshot(&[("a.lua", "X")]), temp.path()).unwrap_err();
        assert!(matches!(err, KeeperError::FileSystemError { .. }));
    }

    #[test]
    fn test_missing_root_is_created() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("new/install");

        let report = sync(&snapshot(&[("main.lua", "m")]), &root).unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(read_tree(&root), vec![("main.lua".to_string(), "m".to_string())]);
    }
}
