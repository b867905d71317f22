//! Layout normalisation after a full install.
//!
//! Some repositories wrap their payload in one extra directory, so after
//! extraction the entry file sits one level too deep:
//!
//! ```text
//! root/                      root/
//!   Older Versions/            Older Versions/
//!   my-script/          =>     main.lua
//!     main.lua                 lib/util.lua
//!     lib/util.lua
//! ```
//!
//! The rule is deliberately narrow. Promotion happens only when the entry file
//! is missing at the root, the root has exactly one subdirectory (ignoring the
//! archive directory), and that subdirectory holds the entry file itself.
//! Contents are moved up in place so the root path never changes.

use crate::constants::OLDER_VERSIONS_DIR;
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of [`normalize`].
#[derive(Debug)]
pub struct NormalizeOutcome {
    /// Installation root after normalisation; always the input root
    pub root: PathBuf,
    /// Whether a wrapping directory was promoted
    pub promoted: bool,
    /// Non-fatal [`KeeperError::RestructureFailed`] when promotion was attempted
    /// but rolled back
    pub warning: Option<KeeperError>,
}

/// Promote a single wrapping directory's contents into `root` when needed.
///
/// # Errors
///
/// Only fails when `root` itself cannot be inspected. Problems during the move
/// are rolled back and reported through [`NormalizeOutcome::warning`].
pub fn normalize(root: &Path, entry_file: &str) -> KeeperResult<NormalizeOutcome> {
    let unchanged = |warning| NormalizeOutcome {
        root: root.to_path_buf(),
        promoted: false,
        warning,
    };

    if root.join(entry_file).is_file() {
        debug!("{entry_file} already at {}", root.display());
        return Ok(unchanged(None));
    }

    let candidate = match single_subdirectory(root)? {
        Some(dir) if dir.join(entry_file).is_file() => dir,
        _ => return Ok(unchanged(None)),
    };

    info!("Promoting contents of {} into {}", candidate.display(), root.display());
    match promote(root, &candidate) {
        Ok(()) => Ok(NormalizeOutcome {
            root: root.to_path_buf(),
            promoted: true,
            warning: None,
        }),
        Err(reason) => {
            warn!("Layout promotion of {} failed: {reason}", root.display());
            Ok(unchanged(Some(KeeperError::RestructureFailed {
                path: root.display().to_string(),
                reason,
            })))
        }
    }
}

/// The only subdirectory of `root` other than the archive, if there is exactly one.
fn single_subdirectory(root: &Path) -> KeeperResult<Option<PathBuf>> {
    let mut found = None;
    for entry in fs::read_dir(root).fs_context("reading directory", root)? {
        let entry = entry.fs_context("reading directory", root)?;
        if entry.file_name() == OLDER_VERSIONS_DIR {
            continue;
        }
        if entry.file_type().fs_context("reading metadata of", &entry.path())?.is_dir() {
            if found.is_some() {
                return Ok(None);
            }
            found = Some(entry.path());
        }
    }
    Ok(found)
}

/// Move every child of `candidate` into `root`, then remove `candidate`.
///
/// On failure every completed move is undone and the error message returned.
fn promote(root: &Path, candidate: &Path) -> Result<(), String> {
    let name = candidate.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let staging = (0..100)
        .map(|i| root.join(format!(".{name}.promote-{i}")))
        .find(|p| !p.exists())
        .ok_or_else(|| "no free staging name".to_string())?;

    // Renaming first frees the candidate's own name for a child of the same name
    fs::rename(candidate, &staging)
        .map_err(|e| format!("cannot stage {}: {e}", candidate.display()))?;

    let restore_candidate = |reason: String| -> String {
        match fs::rename(&staging, candidate) {
            Ok(()) => reason,
            Err(e) => format!("{reason}; rollback left contents in {}: {e}", staging.display()),
        }
    };

    let children: Vec<PathBuf> = match fs::read_dir(&staging) {
        Ok(entries) => match entries.map(|e| e.map(|e| e.path())).collect() {
            Ok(paths) => paths,
            Err(e) => return Err(restore_candidate(format!("cannot list wrapper: {e}"))),
        },
        Err(e) => return Err(restore_candidate(format!("cannot list wrapper: {e}"))),
    };

    if let Some(clash) = children.iter().filter_map(|c| c.file_name()).find(|n| root.join(n).exists()) {
        return Err(restore_candidate(format!(
            "'{}' already exists at the installation root",
            clash.to_string_lossy()
        )));
    }

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(children.len());
    for child in &children {
        let Some(file_name) = child.file_name() else {
            continue;
        };
        let target = root.join(file_name);
        if let Err(e) = fs::rename(child, &target) {
            let mut reason = format!("cannot move {}: {e}", child.display());
            for (from, to) in moved.iter().rev() {
                if let Err(undo) = fs::rename(to, from) {
                    reason.push_str(&format!("; could not move back {}: {undo}", to.display()));
                }
            }
            return Err(restore_candidate(reason));
        }
        moved.push((child.clone(), target));
    }

    if let Err(e) = fs::remove_dir(&staging) {
        // Contents are already promoted; an empty leftover is harmless
        warn!("Could not remove empty wrapper {}: {e}", staging.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_tree, write_tree};
    use tempfile::tempdir;

    #[test]
    fn test_entry_at_root_is_left_alone() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("main.lua", "m"), ("sub/main.lua", "nested")]);

        let outcome = normalize(temp.path(), "main.lua").unwrap();

        assert!(!outcome.promoted);
        assert!(outcome.warning.is_none());
        assert!(temp.path().join("sub/main.lua").exists());
    }

    #[test]
    fn test_single_wrapper_is_promoted() {
        let temp = tempdir().unwrap();
        write_tree(
            temp.path(),
            &[
                ("wrapper/main.lua", "m"),
                ("wrapper/lib/util.lua", "u"),
                ("wrapper/wrapper/inner.lua", "same name as parent"),
                ("Older Versions/slot/main.lua", "old"),
            ],
        );

        let outcome = normalize(temp.path(), "main.lua").unwrap();

        assert!(outcome.promoted);
        assert_eq!(outcome.root, temp.path());
        assert_eq!(
            read_tree(temp.path()),
            vec![
                ("lib/util.lua".to_string(), "u".to_string()),
                ("main.lua".to_string(), "m".to_string()),
                ("wrapper/inner.lua".to_string(), "same name as parent".to_string()),
            ]
        );
        assert!(temp.path().join("Older Versions/slot/main.lua").exists());
    }

    #[test]
    fn test_multiple_subdirectories_are_not_searched() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a/main.lua", "m"), ("b/other.lua", "o")]);

        let outcome = normalize(temp.path(), "main.lua").unwrap();

        assert!(!outcome.promoted);
        assert!(temp.path().join("a/main.lua").exists());
    }

    #[test]
    fn test_wrapper_without_entry_file() {
        let temp = tempdir().unwrap();
        write_tree(temp.path(), &[("a/deeper/main.lua", "m")]);

        let outcome = normalize(temp.path(), "main.lua").unwrap();
        assert!(!outcome.promoted);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn test_collision_rolls_back() {
        let temp = tempdir().unwrap();
        write_tree(
            temp.path(),
            &[("README.md", "root readme"), ("wrap/main.lua", "m"), ("wrap/README.md", "inner")],
        );
        let before = read_tree(temp.path());

        let outcome = normalize(temp.path(), "main.lua").unwrap();

        assert!(!outcome.promoted);
        assert!(matches!(outcome.warning, Some(KeeperError::RestructureFailed { .. })));
        assert_eq!(read_tree(temp.path()), before);
    }
}
