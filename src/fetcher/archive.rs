//! Extraction of a subtree from a repository zip archive.

use crate::core::{KeeperError, KeeperResult};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Extract the files under `subfolder` from a repository zip archive.
///
/// Every member must sit under one synthetic root directory, taken from the
/// first path segment of the first member. The returned paths are relative to
/// `subfolder`.
///
/// # Errors
///
/// - [`KeeperError::ArchiveCorrupt`] if the bytes are not a zip archive, the
///   members do not share one top-level directory, or a member path would
///   escape the extraction root
/// - [`KeeperError::EmptyArchive`] if the archive has no members
/// - [`KeeperError::FolderNotFound`] if no member at all lies under
///   `subfolder`; a subfolder present only as directory members yields an
///   empty map instead
pub fn extract_subtree(
    bytes: &[u8],
    subfolder: &str,
    repository: &str,
    reference: &str,
) -> KeeperResult<BTreeMap<String, Vec<u8>>> {
    let corrupt = |e: zip::result::ZipError| KeeperError::ArchiveCorrupt {
        reason: e.to_string(),
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
    if archive.len() == 0 {
        return Err(KeeperError::EmptyArchive {
            repository: repository.to_string(),
        });
    }

    let root = {
        let first = archive.by_index(0).map_err(corrupt)?;
        let name = first.name().trim_start_matches('/');
        match name.split_once('/') {
            Some((root, _)) if !root.is_empty() => format!("{root}/"),
            _ => {
                return Err(KeeperError::ArchiveCorrupt {
                    reason: format!("archive has no top-level directory ('{name}' is at the top)"),
                });
            }
        }
    };

    let prefix = if subfolder.is_empty() { root.clone() } else { format!("{root}{subfolder}/") };
    debug!("Extracting members under '{prefix}' from {} entries", archive.len());

    let mut files = BTreeMap::new();
    let mut prefix_seen = false;

    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(corrupt)?;
        let name = member.name().trim_start_matches('/').to_string();
        if !name.starts_with(&root) {
            return Err(KeeperError::ArchiveCorrupt {
                reason: format!("member '{name}' is outside the top-level directory '{root}'"),
            });
        }
        let Some(relative) = name.strip_prefix(&prefix) else {
            continue;
        };
        prefix_seen = true;

        if member.is_dir() || relative.is_empty() {
            continue;
        }
        validate_relative_path(relative)?;

        let mut content = Vec::with_capacity(usize::try_from(member.size()).unwrap_or(0));
        member.read_to_end(&mut content).map_err(|e| KeeperError::ArchiveCorrupt {
            reason: format!("failed to read '{name}': {e}"),
        })?;
        files.insert(relative.to_string(), content);
    }

    if files.is_empty() && !subfolder.is_empty() && !prefix_seen {
        return Err(KeeperError::FolderNotFound {
            folder: subfolder.to_string(),
            repository: repository.to_string(),
            reference: reference.to_string(),
        });
    }

    Ok(files)
}

/// Reject relative paths that could escape the directory they are written to.
///
/// Accepted paths use `/` separators and consist only of normal components.
pub fn validate_relative_path(path: &str) -> KeeperResult<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains(':')
        || path.split('/').any(|c| c.is_empty() || c == "." || c == "..");

    if bad {
        return Err(KeeperError::ArchiveCorrupt {
            reason: format!("unsafe member path '{path}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ZipBuilder;

    fn sample() -> Vec<u8> {
        ZipBuilder::new()
            .dir("acme-tools-abc123/")
            .file("acme-tools-abc123/README.md", "readme")
            .dir("acme-tools-abc123/scripts/")
            .dir("acme-tools-abc123/scripts/utils/")
            .file("acme-tools-abc123/scripts/utils/a.lua", "X")
            .file("acme-tools-abc123/scripts/utils/nested/b.lua", "Y")
            .file("acme-tools-abc123/scripts/utilsx/c.lua", "no")
            .dir("acme-tools-abc123/scripts/emptydir/")
            .build()
    }

    #[test]
    fn test_extracts_and_strips_prefixes() {
        let files = extract_subtree(&sample(), "scripts/utils", "acme/tools", "main").unwrap();
        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(names, vec!["a.lua".to_string(), "nested/b.lua".to_string()]);
        assert_eq!(files["a.lua"], b"X");
    }

    #[test]
    fn test_repository_root_without_subfolder() {
        let files = extract_subtree(&sample(), "", "acme/tools", "main").unwrap();
        assert!(files.contains_key("README.md"));
        assert!(files.contains_key("scripts/utils/a.lua"));
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_missing_folder_vs_empty_folder() {
        let err = extract_subtree(&sample(), "missing", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::FolderNotFound { .. }));

        let files = extract_subtree(&sample(), "scripts/emptydir", "acme/tools", "main").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_corrupt_and_empty_archives() {
        let err = extract_subtree(b"definitely not a zip", "", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::ArchiveCorrupt { .. }));

        let empty = ZipBuilder::new().build();
        let err = extract_subtree(&empty, "", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::EmptyArchive { .. }));
    }

    #[test]
    fn test_rejects_members_outside_one_root() {
        let top_level_file = ZipBuilder::new()
            .file("README.md", "readme")
            .file("acme-tools-abc123/main.lua", "m")
            .build();
        let err = extract_subtree(&top_level_file, "", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::ArchiveCorrupt { .. }));

        let two_roots = ZipBuilder::new()
            .file("acme-tools-abc123/main.lua", "m")
            .file("other-root/extra.lua", "x")
            .build();
        let err = extract_subtree(&two_roots, "", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::ArchiveCorrupt { ref reason } if reason.contains("other-root")));
    }

    #[test]
    fn test_rejects_traversal_members() {
        let zip = ZipBuilder::new().file("root/ok.lua", "ok").file("root/../evil.lua", "x").build();
        let err = extract_subtree(&zip, "", "acme/tools", "main").unwrap_err();
        assert!(matches!(err, KeeperError::ArchiveCorrupt { .. }));
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("a/b.lua").is_ok());
        for bad in ["", "/abs", "a//b", "./a", "a/../b", "C:/x", "a\\b"] {
            assert!(validate_relative_path(bad).is_err(), "{bad}");
        }
    }
}
