//! Directory operations for creating, copying, clearing and removing directories.
//!
//! Copy and clear helpers take an optional reserved entry name so the archive
//! directory of an installation can be skipped without special-casing at each
//! call site.

use crate::core::{IoResultExt, KeeperError, KeeperResult};
use std::fs;
use std::path::Path;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Errors
///
/// Returns [`KeeperError::FileSystemError`] if the path exists but is not a
/// directory, or if creation fails.
///
/// # Examples
///
/// ```rust,no_run
/// use scriptkeeper::utils::fs::ensure_dir;
/// use std::path::Path;
///
/// # fn example() -> scriptkeeper::core::KeeperResult<()> {
/// ensure_dir(Path::new("scripts/tools/lib"))?;
/// # Ok(())
/// # }
/// ```
pub fn ensure_dir(path: &Path) -> KeeperResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).fs_context("creating directory", path)?;
    } else if !path.is_dir() {
        return Err(KeeperError::FileSystemError {
            operation: "creating directory".to_string(),
            path: path.display().to_string(),
            reason: "path exists but is not a directory".to_string(),
        });
    }
    Ok(())
}

/// Ensures that the parent directory of a file path exists.
///
/// Paths without a parent (bare file names) are accepted as-is.
pub fn ensure_parent_dir(path: &Path) -> KeeperResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Recursively copies `src` into `dst`, skipping a top-level entry named `skip`.
///
/// - Creates `dst` if it doesn't exist
/// - Overwrites existing files in the destination
/// - Only the direct children of `src` are compared against `skip`
/// - Symbolic links and special files are skipped
///
/// # Errors
///
/// Returns [`KeeperError::FileSystemError`] naming the first path that could not
/// be read or written.
pub fn copy_dir_except(src: &Path, dst: &Path, skip: Option<&str>) -> KeeperResult<()> {
    ensure_dir(dst)?;

    for entry in fs::read_dir(src).fs_context("reading directory", src)? {
        let entry = entry.fs_context("reading directory", src)?;
        if skip.is_some_and(|name| entry.file_name() == name) {
            continue;
        }
        copy_entry(&entry.path(), &dst.join(entry.file_name()))?;
    }

    Ok(())
}

/// Recursively copies a directory.
///
/// Equivalent to [`copy_dir_except`] with nothing skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> KeeperResult<()> {
    copy_dir_except(src, dst, None)
}

fn copy_entry(src: &Path, dst: &Path) -> KeeperResult<()> {
    let file_type = fs::symlink_metadata(src).fs_context("reading metadata of", src)?.file_type();

    if file_type.is_dir() {
        copy_dir(src, dst)?;
    } else if file_type.is_file() {
        fs::copy(src, dst).fs_context("copying file to", dst)?;
    }
    // Skip symlinks and other file types

    Ok(())
}

/// Removes every entry under `dir` except a top-level entry named `keep`.
///
/// Stops at the first failure; entries removed before the failure stay removed.
pub fn clear_dir_except(dir: &Path, keep: Option<&str>) -> KeeperResult<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir).fs_context("reading directory", dir)? {
        let entry = entry.fs_context("reading directory", dir)?;
        if keep.is_some_and(|name| entry.file_name() == name) {
            continue;
        }
        let path = entry.path();
        if entry.file_type().fs_context("reading metadata of", &path)?.is_dir() {
            fs::remove_dir_all(&path).fs_context("removing directory", &path)?;
        } else {
            fs::remove_file(&path).fs_context("removing file", &path)?;
        }
    }

    Ok(())
}

/// Recursively removes a directory and all its contents.
///
/// Safe to call on non-existent directories.
pub fn remove_dir_all(path: &Path) -> KeeperResult<()> {
    if path.exists() {
        fs::remove_dir_all(path).fs_context("removing directory", path)?;
    }
    Ok(())
}
