//! Per-installation file locks.
//!
//! Update, archive and restore must not run concurrently against the same
//! installation directory. [`InstallationLock`] serialises them across tasks
//! and processes with an OS file lock; different installations never contend.
//! The lock is released when the guard is dropped.

use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::utils::fs::metadata::checksum_bytes;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive lock on one installation directory.
pub struct InstallationLock {
    file: File,
    path: PathBuf,
}

impl InstallationLock {
    /// Lock file location for `installation` under `locks_dir`.
    ///
    /// The name is the SHA-256 of the installation path with its longest
    /// existing ancestor canonicalised, so spelling variants of one path share
    /// a lock whether or not the installation exists yet.
    #[must_use]
    pub fn lock_path(locks_dir: &Path, installation: &Path) -> PathBuf {
        let key = checksum_bytes(canonical_key(installation).to_string_lossy().as_bytes());
        locks_dir.join(format!("{key}.lock"))
    }

    /// Wait for and take the lock for `installation`.
    ///
    /// Blocking happens on the blocking thread pool. There is no timeout.
    ///
    /// # Errors
    ///
    /// Fails if the locks directory or lock file cannot be created, or the
    /// filesystem does not support locking.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use scriptkeeper::archive::lock::InstallationLock;
    /// use std::path::Path;
    ///
    /// # async fn example() -> scriptkeeper::core::KeeperResult<()> {
    /// let _guard = InstallationLock::acquire(
    ///     Path::new("/home/me/.scriptkeeper/locks"),
    ///     Path::new("/games/scripts/tools"),
    /// )
    /// .await?;
    /// // update or restore the installation here
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire(locks_dir: &Path, installation: &Path) -> KeeperResult<Self> {
        tokio::fs::create_dir_all(locks_dir).await.fs_context("creating locks directory", locks_dir)?;

        let lock_path = Self::lock_path(locks_dir, installation);
        let lock_path_clone = lock_path.clone();
        let installation = installation.display().to_string();

        let file = tokio::task::spawn_blocking(move || -> KeeperResult<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .fs_context("opening lock file", &lock_path_clone)?;

            file.lock_exclusive().map_err(|e| KeeperError::FileSystemError {
                operation: "locking".to_string(),
                path: installation,
                reason: e.to_string(),
            })?;

            Ok(file)
        })
        .await
        .map_err(|e| KeeperError::Other {
            message: format!("Lock task failed: {e}"),
        })??;

        debug!("Acquired {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

fn canonical_key(installation: &Path) -> PathBuf {
    let absolute =
        std::path::absolute(installation).unwrap_or_else(|_| installation.to_path_buf());

    let mut missing = Vec::new();
    for ancestor in absolute.ancestors() {
        if let Ok(canonical) = ancestor.canonicalize() {
            return missing.iter().rev().fold(canonical, |path, name| path.join(name));
        }
        match ancestor.file_name() {
            Some(name) => missing.push(name),
            None => break,
        }
    }
    absolute
}

impl Drop for InstallationLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {e}", self.path.display());
        }
    }
}
