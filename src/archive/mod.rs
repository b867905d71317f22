//! Deduplicated version history of an installation.
//!
//! Every installation root may hold an `Older Versions` directory with one
//! slot per archived state:
//!
//! ```text
//! <root>/Older Versions/
//!   20260301-101500_abcdef12_from-github/      full copy of the files at abcdef12
//!   20260301-101500_abcdef12_from-github.commit  full commit hash of that slot
//!   20260412-090000_active-before-restore/     state of unknown origin
//! ```
//!
//! Slot names are `{timestamp}_{short commit}_{context}`, or
//! `{timestamp}_{context}` when the commit is unknown. At most one slot exists
//! per short commit: the index is built from the second `_`-separated field
//! of each slot directory name, so archiving an already archived commit is a
//! successful no-op.
//!
//! The operations here are blocking and assume the caller serialises access
//! per installation (see [`lock::InstallationLock`]).

pub mod lock;

use crate::constants::{
    OLDER_VERSIONS_DIR, SLOT_COMMIT_SIDECAR_EXT, SLOT_FIELD_SEPARATOR, SLOT_TIMESTAMP_FORMAT,
};
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::source::CommitIdentity;
use crate::utils::fs::{clear_dir_except, copy_dir_except, ensure_dir};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Why an archive slot was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveContext {
    /// Before applying an update from the remote
    FromGithub,
    /// Before a restore, for a known but not yet archived commit
    BeforeRestore,
    /// Before a restore, when the installed commit is unknown
    ActiveBeforeRestore,
}

impl ArchiveContext {
    /// Label used in slot names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FromGithub => "from-github",
            Self::BeforeRestore => "before-restore",
            Self::ActiveBeforeRestore => "active-before-restore",
        }
    }
}

impl fmt::Display for ArchiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot of the version history.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivedVersion {
    /// Slot directory name
    pub name: String,
    /// Short commit parsed from the name, if the slot has one
    pub short_commit: Option<String>,
    /// Context label parsed from the name
    pub context: Option<String>,
    /// Full commit from the sidecar file, when recorded
    pub commit: Option<CommitIdentity>,
    /// Directory creation time, or modification time where unsupported
    pub created: Option<DateTime<Local>>,
}

/// Fields of a slot name.
fn parse_slot_name(name: &str) -> (Option<String>, Option<String>) {
    let Some((_timestamp, rest)) = name.split_once(SLOT_FIELD_SEPARATOR) else {
        return (None, None);
    };
    match rest.split_once(SLOT_FIELD_SEPARATOR) {
        Some((short, context)) => (Some(short.to_string()), Some(context.to_string())),
        None => (None, Some(rest.to_string())),
    }
}

/// The version history of one installation root.
#[derive(Debug, Clone)]
pub struct VersionArchive {
    root: PathBuf,
}

impl VersionArchive {
    /// History of the installation at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The installation root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `Older Versions` directory.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.root.join(OLDER_VERSIONS_DIR)
    }

    /// Slot directory names, unordered. Empty when no history exists.
    fn slot_names(&self) -> KeeperResult<Vec<String>> {
        let dir = self.dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).fs_context("reading directory", &dir)? {
            let entry = entry.fs_context("reading directory", &dir)?;
            if entry.file_type().fs_context("reading metadata of", &entry.path())?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Map from short commit to slot name, built from the current listing.
    pub fn index(&self) -> KeeperResult<HashMap<String, String>> {
        let mut index = HashMap::new();
        for name in self.slot_names()? {
            if let (Some(short), _) = parse_slot_name(&name) {
                index.entry(short).or_insert(name);
            }
        }
        Ok(index)
    }

    /// Slot holding `commit`, if archived.
    pub fn find_slot(&self, commit: &CommitIdentity) -> KeeperResult<Option<String>> {
        Ok(self.index()?.remove(commit.short()))
    }

    /// Archive the current contents of the installation for `commit`.
    ///
    /// Returns `Ok(false)` without copying when a slot for the commit already
    /// exists, `Ok(true)` when a new slot was written.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ArchiveWriteFailed`] naming the slot. A partially
    /// written slot is removed.
    pub fn archive(&self, commit: &CommitIdentity, context: ArchiveContext) -> KeeperResult<bool> {
        if let Some(existing) = self.find_slot(commit)? {
            debug!("{} already archived as '{existing}'", commit.short());
            return Ok(false);
        }

        let timestamp = Local::now().format(SLOT_TIMESTAMP_FORMAT);
        let slot = format!(
            "{timestamp}{sep}{short}{sep}{context}",
            sep = SLOT_FIELD_SEPARATOR,
            short = commit.short()
        );
        self.write_slot(&slot, Some(commit))?;
        info!("Archived {} as '{slot}'", self.root.display());
        Ok(true)
    }

    /// Archive the current contents without a commit, under a timestamp-only name.
    ///
    /// Used when the installed commit is unknown. Returns the new slot name.
    pub fn archive_unidentified(&self, context: ArchiveContext) -> KeeperResult<String> {
        let base = format!(
            "{}{}{context}",
            Local::now().format(SLOT_TIMESTAMP_FORMAT),
            SLOT_FIELD_SEPARATOR
        );
        let dir = self.dir();
        let slot = std::iter::once(base.clone())
            .chain((2..100).map(|n| format!("{base}-{n}")))
            .find(|name| !dir.join(name).exists())
            .ok_or_else(|| KeeperError::ArchiveWriteFailed {
                slot: base.clone(),
                reason: "too many slots with the same timestamp".to_string(),
            })?;

        self.write_slot(&slot, None)?;
        info!("Archived {} as '{slot}'", self.root.display());
        Ok(slot)
    }

    fn write_slot(&self, slot: &str, commit: Option<&CommitIdentity>) -> KeeperResult<()> {
        let dir = self.dir();
        let slot_path = dir.join(slot);
        let sidecar = dir.join(format!("{slot}.{SLOT_COMMIT_SIDECAR_EXT}"));

        let written = (|| -> KeeperResult<()> {
            if !self.root.is_dir() {
                return Err(KeeperError::FileSystemError {
                    operation: "archiving".to_string(),
                    path: self.root.display().to_string(),
                    reason: "installation directory does not exist".to_string(),
                });
            }
            ensure_dir(&dir)?;
            fs::create_dir(&slot_path).fs_context("creating slot", &slot_path)?;
            copy_dir_except(&self.root, &slot_path, Some(OLDER_VERSIONS_DIR))?;
            if let Some(commit) = commit {
                fs::write(&sidecar, commit.as_str()).fs_context("writing", &sidecar)?;
            }
            Ok(())
        })();

        written.map_err(|e| {
            if slot_path.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&slot_path) {
                    warn!("Could not remove partial slot {}: {cleanup}", slot_path.display());
                }
            }
            let _ = fs::remove_file(&sidecar);
            KeeperError::ArchiveWriteFailed {
                slot: slot.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Details of one slot.
    pub fn version(&self, slot: &str) -> KeeperResult<ArchivedVersion> {
        let path = self.dir().join(slot);
        let metadata = fs::metadata(&path).fs_context("reading metadata of", &path)?;
        let created = metadata.created().or_else(|_| metadata.modified()).ok().map(DateTime::from);

        let sidecar = self.dir().join(format!("{slot}.{SLOT_COMMIT_SIDECAR_EXT}"));
        let commit = fs::read_to_string(&sidecar).ok().and_then(|s| CommitIdentity::new(s).ok());
        let (short_commit, context) = parse_slot_name(slot);

        Ok(ArchivedVersion {
            name: slot.to_string(),
            short_commit,
            context,
            commit,
            created,
        })
    }

    /// All slots, newest first. Empty when no history exists.
    ///
    /// Ordered by directory creation time (modification time where creation
    /// time is unavailable), ties broken by name.
    pub fn list_versions(&self) -> KeeperResult<Vec<ArchivedVersion>> {
        let mut versions = self
            .slot_names()?
            .iter()
            .map(|name| self.version(name))
            .collect::<KeeperResult<Vec<_>>>()?;
        versions.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.name.cmp(&a.name)));
        Ok(versions)
    }

    /// Location of an existing slot, checked before anything is touched.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::RestoreFailed`] for a name that is not a plain
    /// directory name or does not name an archived version.
    pub fn slot_path(&self, slot: &str) -> KeeperResult<PathBuf> {
        let failed = |reason: String| KeeperError::RestoreFailed {
            slot: slot.to_string(),
            reason,
        };
        if slot.is_empty() || slot.contains(['/', '\\']) || slot == "." || slot == ".." {
            return Err(failed("invalid slot name".to_string()));
        }
        let path = self.dir().join(slot);
        if !path.is_dir() {
            return Err(failed(format!("no archived version named '{slot}'")));
        }
        Ok(path)
    }

    /// Replace the installation's contents with those of `slot`.
    ///
    /// The current state is archived first: skipped when `current` is already
    /// archived, under `before-restore` when `current` is known, and under a
    /// timestamp-only `active-before-restore` slot when it is not.
    ///
    /// # Errors
    ///
    /// Any failure is returned as [`KeeperError::RestoreFailed`]. Once the
    /// clearing step has started, the installation may be partially restored.
    pub fn restore(
        &self,
        slot: &str,
        current: Option<&CommitIdentity>,
    ) -> KeeperResult<ArchivedVersion> {
        let failed = |reason: String| KeeperError::RestoreFailed {
            slot: slot.to_string(),
            reason,
        };
        let slot_path = self.slot_path(slot)?;

        match current {
            Some(commit) => {
                self.archive(commit, ArchiveContext::BeforeRestore)
                    .map_err(|e| failed(format!("could not archive current state: {e}")))?;
            }
            None => {
                self.archive_unidentified(ArchiveContext::ActiveBeforeRestore)
                    .map_err(|e| failed(format!("could not archive current state: {e}")))?;
            }
        }

        clear_dir_except(&self.root, Some(OLDER_VERSIONS_DIR))
            .map_err(|e| failed(format!("clearing installation failed: {e}")))?;
        copy_dir_except(&slot_path, &self.root, Some(OLDER_VERSIONS_DIR))
            .map_err(|e| failed(format!("copying archived files failed: {e}")))?;

        info!("Restored '{slot}' into {}", self.root.display());
        self.version(slot).map_err(|e| failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_tree, write_tree};
    use tempfile::tempdir;

    fn sha(s: &str) -> CommitIdentity {
        CommitIdentity::new(s).unwrap()
    }

    #[test]
    fn test_archive_is_idempotent() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("main.lua", "v1")]);
        let archive = VersionArchive::new(temp.path());
        let commit = sha("abcdef1234567890");

        assert!(archive.archive(&commit, ArchiveContext::FromGithub).unwrap());
        write_tree(temp.path(), &[("main.lua", "changed")]);
        assert!(!archive.archive(&commit, ArchiveContext::FromGithub).unwrap());

        let versions = archive.list_versions().unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions[0].name.ends_with("_abcdef12_from-github"));
        assert_eq!(versions[0].short_commit.as_deref(), Some("abcdef12"));
        assert_eq!(versions[0].commit, Some(commit));

        let slot = archive.dir().join(&versions[0].name);
        assert_eq!(read_tree(&slot), vec![("main.lua".to_string(), "v1".to_string())]);
    }

    #[test]
    fn test_slot_excludes_archive_dir() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a.lua", "a")]);
        let archive = VersionArchive::new(temp.path());

        archive.archive(&sha("1111111100"), ArchiveContext::FromGithub).unwrap();
        archive.archive(&sha("2222222200"), ArchiveContext::FromGithub).unwrap();

        for version in archive.list_versions().unwrap() {
            assert!(!archive.dir().join(&version.name).join(OLDER_VERSIONS_DIR).exists());
        }
    }

    #[test]
    fn test_index_matches_whole_field_only() {
        let temp = tempdir().unwrap();
        let archive = VersionArchive::new(temp.path());
        // A context that happens to contain another commit's short hash
        fs::create_dir_all(archive.dir().join("20260101-000000_11111111_note-abcdef12")).unwrap();

        let index = archive.index().unwrap();
        assert!(index.contains_key("11111111"));
        assert!(archive.find_slot(&sha("abcdef1234")).unwrap().is_none());
    }

    #[test]
    fn test_list_versions_empty_and_ordering() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a.lua", "a")]);
        let archive = VersionArchive::new(temp.path());
        assert!(archive.list_versions().unwrap().is_empty());

        archive.archive(&sha("1111111100"), ArchiveContext::FromGithub).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        archive.archive(&sha("2222222200"), ArchiveContext::FromGithub).unwrap();
        fs::write(archive.dir().join("stray.txt"), "not a slot").unwrap();

        let names: Vec<_> = archive
            .list_versions()
            .unwrap()
            .into_iter()
            .map(|v| v.short_commit.unwrap())
            .collect();
        assert_eq!(names, vec!["22222222", "11111111"]);
    }

    #[test]
    fn test_restore_round_trip() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_tree(root, &[("main.lua", "v1"), ("lib/x.lua", "x1")]);
        let archive = VersionArchive::new(root);
        let s1 = sha("1111111122223333");
        archive.archive(&s1, ArchiveContext::FromGithub).unwrap();
        let snapshot_at_archive = read_tree(root);

        write_tree(root, &[("main.lua", "v2"), ("new.lua", "n")]);
        let s2 = sha("4444444455556666");
        let slot = archive.find_slot(&s1).unwrap().unwrap();

        let restored = archive.restore(&slot, Some(&s2)).unwrap();

        assert_eq!(restored.commit, Some(s1));
        assert_eq!(read_tree(root), snapshot_at_archive);
        let pre_restore = archive.find_slot(&s2).unwrap().unwrap();
        assert!(pre_restore.ends_with("_44444444_before-restore"));
        assert_eq!(
            read_tree(&archive.dir().join(pre_restore)),
            vec![
                ("lib/x.lua".to_string(), "x1".to_string()),
                ("main.lua".to_string(), "v2".to_string()),
                ("new.lua".to_string(), "n".to_string()),
            ]
        );
    }

    #[test]
    fn test_restore_with_unknown_current_archives_unconditionally() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("main.lua", "v1")]);
        let archive = VersionArchive::new(temp.path());
        archive.archive(&sha("1111111100"), ArchiveContext::FromGithub).unwrap();
        let slot = archive.find_slot(&sha("1111111100")).unwrap().unwrap();

        archive.restore(&slot, None).unwrap();
        archive.restore(&slot, None).unwrap();

        let unidentified: Vec<_> = archive
            .list_versions()
            .unwrap()
            .into_iter()
            .filter(|v| v.context.as_deref().is_some_and(|c| c.starts_with("active-before-restore")))
            .collect();
        assert_eq!(unidentified.len(), 2);
        assert!(unidentified.iter().all(|v| v.short_commit.is_none()));
    }

    #[test]
    fn test_restore_unknown_slot_fails() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("main.lua", "v1")]);
        let archive = VersionArchive::new(temp.path());

        let err = archive.restore("20260101-000000_deadbeef_from-github", None).unwrap_err();
        assert!(matches!(err, KeeperError::RestoreFailed { .. }));
        let err = archive.restore("../escape", None).unwrap_err();
        assert!(matches!(err, KeeperError::RestoreFailed { .. }));
        assert_eq!(read_tree(temp.path()), vec![("main.lua".to_string(), "v1".to_string())]);
    }

    #[test]
    fn test_archive_of_missing_root_reports_slot() {
        let temp = tempdir().unwrap();
        let archive = VersionArchive::new(temp.path().join("missing"));

        let err = archive.archive(&sha("abcdef1234"), ArchiveContext::FromGithub).unwrap_err();
        assert!(matches!(err, KeeperError::ArchiveWriteFailed { ref slot, .. } if slot.contains("abcdef12")));
        assert!(!temp.path().join("missing").exists());
    }
}
