//! Atomic file writes.

use super::dirs::ensure_parent_dir;
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use std::io::Write;
use std::path::Path;

/// Writes `content` to `path` atomically.
///
/// The bytes go to a temporary file in the same directory, are synced to disk,
/// and the temporary file is then persisted over `path`. Readers never observe
/// a partially written file.
///
/// # Errors
///
/// Returns [`KeeperError::FileSystemError`] if the parent directory cannot be
/// created or the temporary file cannot be written or persisted.
pub fn atomic_write(path: &Path, content: &[u8]) -> KeeperResult<()> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).fs_context("creating temp file in", dir)?;
    temp.write_all(content).fs_context("writing temp file for", path)?;
    temp.as_file().sync_all().fs_context("syncing temp file for", path)?;
    temp.persist(path).map_err(|e| KeeperError::fs("replacing", path, &e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_parents_and_replaces() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested/dir/file.json");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
