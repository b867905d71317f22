//! Update policy for managed scripts.
//!
//! [`ScriptManager`] sits between the registry and the installer. It decides
//! what the installer alone does not:
//!
//! - whether an item needs an update (commit comparison)
//! - when to archive before a destructive step (existing installs only)
//! - how failures of one item affect a batch (they don't; see [`BatchReport`])
//! - serialising work per installation through [`InstallationLock`]
//!
//! Records are updated in place and returned to the caller for persisting;
//! the manager never writes the registry itself.

use crate::archive::lock::InstallationLock;
use crate::archive::{ArchiveContext, ArchivedVersion, VersionArchive};
use crate::config::{ManagedScriptRecord, UpdateStatus};
use crate::core::{IoResultExt, KeeperError, KeeperResult};
use crate::fetcher::Category;
use crate::github::RepositoryApi;
use crate::installer::{Installer, UpdateOutcome, UpdateStrategy, blocking};
use crate::source::{CommitIdentity, RemoteRef};
use crate::utils::fs::remove_dir_all;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A new item to install.
#[derive(Debug, Clone)]
pub struct AddRequest {
    /// Repository URL
    pub repo_url: String,
    /// Subfolder inside the repository
    pub folder: String,
    /// Branch or tag to follow
    pub ref_name: Option<String>,
    /// Directory the installation folder is created in
    pub destination: PathBuf,
    /// Display name; derived from the remote when absent
    pub name: Option<String>,
    /// Kind of content
    pub category: Category,
}

/// Result of updating one item.
#[derive(Debug)]
pub enum ItemUpdate {
    /// The installed commit is already current; nothing was touched
    UpToDate,
    /// A new snapshot was applied
    Updated {
        /// Commit installed before the update
        previous: Option<CommitIdentity>,
        /// Whether a new archive slot was written before updating
        archived: bool,
        /// What the installer did
        outcome: UpdateOutcome,
    },
}

/// Failure of one item in a batch.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    /// Item name
    pub name: String,
    /// Remote the item follows
    pub remote: String,
    /// Cause
    pub error: KeeperError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): [{}] {}", self.name, self.remote, self.error.kind(), self.error)
    }
}

/// Aggregated result of a batch update or check.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items updated (or found to have an update, for checks)
    pub succeeded: Vec<String>,
    /// Items already current
    pub up_to_date: Vec<String>,
    /// Items that failed, with their cause
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// `Updated: n, Up-to-date: m, Errors: k`
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Updated: {}, Up-to-date: {}, Errors: {}",
            self.succeeded.len(),
            self.up_to_date.len(),
            self.failures.len()
        )
    }

    /// Whether any item failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn remote_display(record: &ManagedScriptRecord) -> String {
    record.remote_ref().map_or_else(|_| record.repo_url.clone(), |r| r.to_string())
}

/// Applies update policy to managed script records.
pub struct ScriptManager<A> {
    installer: Installer<A>,
    locks_dir: PathBuf,
    max_parallel: usize,
}

impl<A: RepositoryApi> ScriptManager<A> {
    /// Create a manager. Lock files go to `locks_dir`.
    pub fn new(installer: Installer<A>, locks_dir: impl Into<PathBuf>, max_parallel: usize) -> Self {
        Self {
            installer,
            locks_dir: locks_dir.into(),
            max_parallel: max_parallel.max(1),
        }
    }

    async fn lock(&self, installation: &Path) -> KeeperResult<InstallationLock> {
        InstallationLock::acquire(&self.locks_dir, installation).await
    }

    /// Install a new item and return its record.
    ///
    /// The destination folder must not exist or be empty; the first install
    /// uses the overwrite strategy and writes no archive.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL, a non-empty destination, or any fetch or
    /// install error.
    pub async fn add(&self, request: AddRequest) -> KeeperResult<(ManagedScriptRecord, UpdateOutcome)> {
        let remote = RemoteRef::parse(&request.repo_url, &request.folder, request.ref_name.clone())?;
        let name = request
            .name
            .clone()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| remote.default_name());
        let local_path = request.destination.join(&name);

        let occupied = local_path.is_file()
            || (local_path.is_dir()
                && std::fs::read_dir(&local_path)
                    .fs_context("reading directory", &local_path)?
                    .next()
                    .is_some());
        if occupied {
            return Err(KeeperError::FileSystemError {
                operation: "installing into".to_string(),
                path: local_path.display().to_string(),
                reason: "destination already exists and is not empty".to_string(),
            });
        }

        let _lock = self.lock(&local_path).await?;
        info!("Installing '{name}' from {remote} into {}", local_path.display());
        let outcome = self
            .installer
            .update(&remote, &local_path, request.category, UpdateStrategy::Overwrite)
            .await?;

        let record = ManagedScriptRecord {
            name,
            repo_url: request.repo_url,
            folder_path: remote.subfolder().to_string(),
            ref_name: remote.ref_hint().map(str::to_string),
            local_path: outcome.root.clone(),
            category: request.category,
            current_version_sha: Some(outcome.commit.clone()),
            last_checked: Some(Utc::now()),
            update_status: UpdateStatus::UpToDate,
        };
        Ok((record, outcome))
    }

    /// Compare the installed commit with the remote and record the status.
    ///
    /// A missing installation directory counts as an available update.
    /// `last_checked` is set whether or not the check succeeds.
    pub async fn check(&self, record: &mut ManagedScriptRecord) -> KeeperResult<UpdateStatus> {
        record.last_checked = Some(Utc::now());
        let latest = match self.resolve(record).await {
            Ok(latest) => latest,
            Err(e) => {
                record.update_status = UpdateStatus::CheckFailed;
                return Err(e);
            }
        };

        let installed = record.local_path.is_dir();
        let status = if installed && record.current_version_sha.as_ref() == Some(&latest) {
            UpdateStatus::UpToDate
        } else {
            UpdateStatus::Available
        };
        debug!("'{}' is {status} (remote {})", record.name, latest.short());
        record.update_status = status;
        Ok(status)
    }

    async fn resolve(&self, record: &ManagedScriptRecord) -> KeeperResult<CommitIdentity> {
        let remote = record.remote_ref()?;
        self.installer.fetcher().resolve_commit_identity(&remote).await
    }

    /// Check many items concurrently; failures don't stop the others.
    ///
    /// `succeeded` lists items with an update available.
    pub async fn check_all(&self, records: &mut [ManagedScriptRecord]) -> BatchReport {
        let results: Vec<_> = stream::iter(records.iter_mut())
            .map(|record| async move {
                let result = self.check(record).await;
                (record.name.clone(), remote_display(record), result)
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (name, remote, result) in results {
            match result {
                Ok(UpdateStatus::UpToDate) => report.up_to_date.push(name),
                Ok(_) => report.succeeded.push(name),
                Err(error) => report.failures.push(ItemFailure {
                    name,
                    remote,
                    error,
                }),
            }
        }
        report
    }

    /// Update one item if the remote moved.
    ///
    /// An existing installation with a known commit is archived under
    /// `from-github` first. The update is abandoned when archiving fails.
    pub async fn update_record(
        &self,
        record: &mut ManagedScriptRecord,
        strategy: UpdateStrategy,
    ) -> KeeperResult<ItemUpdate> {
        let result = self.update_record_inner(record, strategy).await;
        record.last_checked = Some(Utc::now());
        record.update_status = match &result {
            Ok(_) => UpdateStatus::UpToDate,
            Err(_) => UpdateStatus::CheckFailed,
        };
        result
    }

    async fn update_record_inner(
        &self,
        record: &mut ManagedScriptRecord,
        strategy: UpdateStrategy,
    ) -> KeeperResult<ItemUpdate> {
        let remote = record.remote_ref()?;
        let _lock = self.lock(&record.local_path).await?;

        let latest = self.installer.fetcher().resolve_commit_identity(&remote).await?;
        let installed = record.local_path.is_dir();
        if installed && record.current_version_sha.as_ref() == Some(&latest) {
            debug!("'{}' already at {}", record.name, latest.short());
            return Ok(ItemUpdate::UpToDate);
        }

        let previous = record.current_version_sha.clone();
        let archived = match (&previous, installed) {
            (Some(current), true) => {
                let archive = VersionArchive::new(&record.local_path);
                let current = current.clone();
                blocking(move || archive.archive(&current, ArchiveContext::FromGithub)).await?
            }
            _ => false,
        };

        let outcome =
            self.installer.update(&remote, &record.local_path, record.category, strategy).await?;
        for warning in &outcome.warnings {
            warn!("'{}': {warning}", record.name);
        }

        info!(
            "Updated '{}' {} -> {}",
            record.name,
            previous.as_ref().map_or("none", CommitIdentity::short),
            outcome.commit.short()
        );
        record.current_version_sha = Some(outcome.commit.clone());
        record.local_path.clone_from(&outcome.root);

        Ok(ItemUpdate::Updated {
            previous,
            archived,
            outcome,
        })
    }

    /// Update many items concurrently; failures don't stop the others.
    pub async fn update_all(
        &self,
        records: &mut [ManagedScriptRecord],
        strategy: UpdateStrategy,
    ) -> BatchReport {
        let results: Vec<_> = stream::iter(records.iter_mut())
            .map(|record| async move {
                let result = self.update_record(record, strategy).await;
                (record.name.clone(), remote_display(record), result)
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (name, remote, result) in results {
            match result {
                Ok(ItemUpdate::UpToDate) => report.up_to_date.push(name),
                Ok(ItemUpdate::Updated {
                    ..
                }) => report.succeeded.push(name),
                Err(error) => {
                    warn!("Update of '{name}' ({remote}) failed: {error}");
                    report.failures.push(ItemFailure {
                        name,
                        remote,
                        error,
                    });
                }
            }
        }
        report
    }

    /// Archived versions of an item, newest first.
    pub async fn list_versions(&self, record: &ManagedScriptRecord) -> KeeperResult<Vec<ArchivedVersion>> {
        let archive = VersionArchive::new(&record.local_path);
        blocking(move || archive.list_versions()).await
    }

    /// Restore an archived version and record its commit.
    ///
    /// The restored commit is taken from the slot's sidecar; when unknown the
    /// record's commit is cleared so the next check reports an update.
    ///
    /// An unknown slot leaves the record untouched. Any later failure may
    /// have left the installation partly cleared, so the record's commit is
    /// cleared too and the next update reinstalls.
    pub async fn restore(
        &self,
        record: &mut ManagedScriptRecord,
        slot: &str,
    ) -> KeeperResult<ArchivedVersion> {
        let _lock = self.lock(&record.local_path).await?;
        let archive = VersionArchive::new(&record.local_path);
        archive.slot_path(slot)?;

        let current = record.current_version_sha.clone();
        let slot = slot.to_string();
        let result = blocking(move || archive.restore(&slot, current.as_ref())).await;

        record.update_status = UpdateStatus::Unknown;
        match result {
            Ok(restored) => {
                record.current_version_sha = restored.commit.clone();
                Ok(restored)
            }
            Err(e) => {
                warn!("Restore of '{}' failed, installed commit no longer known: {e}", record.name);
                record.current_version_sha = None;
                Err(e)
            }
        }
    }

    /// Delete an item's files unless `keep_files` is set.
    pub async fn remove(&self, record: &ManagedScriptRecord, keep_files: bool) -> KeeperResult<()> {
        if keep_files {
            return Ok(());
        }
        let _lock = self.lock(&record.local_path).await?;
        let path = record.local_path.clone();
        blocking(move || remove_dir_all(&path)).await?;
        info!("Removed {}", record.local_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{Fetcher, FetcherConfig};
    use crate::installer::InstallerConfig;
    use crate::test_utils::{FakeRepository, read_tree, write_tree};
    use tempfile::{TempDir, tempdir};

    const SHA1: &str = "abcdef1234567890abcdef1234567890abcdef12";
    const SHA2: &str = "9876543210fedcba9876543210fedcba98765432";

    fn manager(repo: &FakeRepository, temp: &TempDir) -> ScriptManager<FakeRepository> {
        let installer = Installer::new(
            Fetcher::new(repo.clone(), FetcherConfig::default()),
            InstallerConfig::default(),
        );
        ScriptManager::new(installer, temp.path().join("locks"), 2)
    }

    fn request(temp: &TempDir, folder: &str) -> AddRequest {
        AddRequest {
            repo_url: "https://github.com/acme/tools".to_string(),
            folder: folder.to_string(),
            ref_name: None,
            destination: temp.path().join("scripts"),
            name: None,
            category: Category::Script,
        }
    }

    #[tokio::test]
    async fn test_add_installs_without_archive() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("scripts/utils/main.lua", "m")]);
        let temp = tempdir().unwrap();

        let (record, _) = manager(&repo, &temp).add(request(&temp, "scripts/utils")).await.unwrap();

        assert_eq!(record.name, "tools_scripts_utils");
        assert_eq!(record.current_version_sha.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(record.update_status, UpdateStatus::UpToDate);
        assert!(record.local_path.join("main.lua").is_file());
        assert!(!record.local_path.join("Older Versions").exists());
    }

    #[tokio::test]
    async fn test_add_refuses_non_empty_destination() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "m")]);
        let temp = tempdir().unwrap();
        write_tree(&temp.path().join("scripts/tools"), &[("precious.txt", "mine")]);

        let err = manager(&repo, &temp).add(request(&temp, "")).await.unwrap_err();

        assert!(matches!(err, KeeperError::FileSystemError { .. }));
        assert!(temp.path().join("scripts/tools/precious.txt").exists());
    }

    #[tokio::test]
    async fn test_check_reports_available_and_failures() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "m")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (current, _) = manager.add(request(&temp, "")).await.unwrap();

        let mut stale = current.clone();
        stale.name = "stale".into();
        stale.current_version_sha = Some(CommitIdentity::new(SHA2).unwrap());
        let mut broken = current.clone();
        broken.name = "broken".into();
        broken.repo_url = "https://github.com/acme/missing".into();

        let mut records = vec![current, stale, broken];
        let report = manager.check_all(&mut records).await;

        assert_eq!(report.up_to_date, vec!["tools".to_string()]);
        assert_eq!(report.succeeded, vec!["stale".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken");
        let rendered = report.failures[0].to_string();
        assert!(rendered.starts_with("broken (acme/missing"));
        assert!(rendered.contains("[not found]"));
        assert_eq!(records[1].update_status, UpdateStatus::Available);
        assert_eq!(records[2].update_status, UpdateStatus::CheckFailed);
        assert!(records.iter().all(|r| r.last_checked.is_some()));
    }

    #[tokio::test]
    async fn test_update_archives_then_applies() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (mut record, _) = manager.add(request(&temp, "")).await.unwrap();

        let result = manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();
        assert!(matches!(result, ItemUpdate::UpToDate));
        assert_eq!(repo.zipball_requests().len(), 1);

        repo.commit(SHA2, &[("main.lua", "v2")]);
        let result = manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();

        let ItemUpdate::Updated {
            previous,
            archived,
            ..
        } = result
        else {
            panic!("expected an update");
        };
        assert!(archived);
        assert_eq!(previous.unwrap().as_str(), SHA1);
        assert_eq!(record.current_version_sha.as_ref().unwrap().as_str(), SHA2);
        assert_eq!(read_tree(&record.local_path), vec![("main.lua".to_string(), "v2".to_string())]);

        let versions = manager.list_versions(&record).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions[0].name.ends_with("_abcdef12_from-github"));
    }

    #[tokio::test]
    async fn test_update_all_continues_after_failure() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("a/main.lua", "a"), ("b/main.lua", "b")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (a, _) = manager.add(request(&temp, "a")).await.unwrap();
        let (b, _) = manager.add(request(&temp, "b")).await.unwrap();

        repo.commit(SHA2, &[("a/main.lua", "a2")]);
        let mut records = vec![a, b];
        let report = manager.update_all(&mut records, UpdateStrategy::Differential).await;

        assert_eq!(report.succeeded, vec!["tools_a".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, KeeperError::FolderNotFound { .. }));
        assert_eq!(report.summary(), "Updated: 1, Up-to-date: 0, Errors: 1");
        assert_eq!(records[1].current_version_sha.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(records[1].update_status, UpdateStatus::CheckFailed);
    }

    #[tokio::test]
    async fn test_restore_records_restored_commit() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (mut record, _) = manager.add(request(&temp, "")).await.unwrap();
        repo.commit(SHA2, &[("main.lua", "v2")]);
        manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();

        let slot = manager.list_versions(&record).await.unwrap().remove(0).name;
        let restored = manager.restore(&mut record, &slot).await.unwrap();

        assert_eq!(restored.commit.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(record.current_version_sha.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(read_tree(&record.local_path), vec![("main.lua".to_string(), "v1".to_string())]);
        let names: Vec<_> =
            manager.list_versions(&record).await.unwrap().into_iter().map(|v| v.name).collect();
        assert!(names.iter().any(|n| n.ends_with("_98765432_before-restore")));
    }

    #[tokio::test]
    async fn test_check_reports_missing_installation_as_available() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (mut record, _) = manager.add(request(&temp, "")).await.unwrap();
        std::fs::remove_dir_all(&record.local_path).unwrap();

        assert_eq!(manager.check(&mut record).await.unwrap(), UpdateStatus::Available);
        assert_eq!(record.update_status, UpdateStatus::Available);

        let result = manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();
        assert!(matches!(result, ItemUpdate::Updated { archived: false, .. }));
        assert_eq!(read_tree(&record.local_path), vec![("main.lua".to_string(), "v1".to_string())]);
    }

    #[tokio::test]
    async fn test_restore_of_unknown_slot_keeps_record() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (mut record, _) = manager.add(request(&temp, "")).await.unwrap();

        let err = manager.restore(&mut record, "20200101-000000_deadbeef_from-github").await.unwrap_err();

        assert!(matches!(err, KeeperError::RestoreFailed { .. }));
        assert_eq!(record.current_version_sha.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(record.update_status, UpdateStatus::UpToDate);
        assert_eq!(read_tree(&record.local_path), vec![("main.lua".to_string(), "v1".to_string())]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_restore_forces_reinstall() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (mut record, _) = manager.add(request(&temp, "")).await.unwrap();

        // A slot whose contents vanish once the installation is cleared.
        write_tree(&record.local_path, &[("data/keep.lua", "k")]);
        let older = record.local_path.join("Older Versions");
        std::fs::create_dir_all(&older).unwrap();
        let slot = "20200101-000000_11111111_from-github";
        std::os::unix::fs::symlink(record.local_path.join("data"), older.join(slot)).unwrap();

        let err = manager.restore(&mut record, slot).await.unwrap_err();

        assert!(matches!(err, KeeperError::RestoreFailed { .. }));
        assert!(!record.local_path.join("main.lua").exists());
        assert!(record.current_version_sha.is_none());
        assert_eq!(record.update_status, UpdateStatus::Unknown);

        let result = manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();
        assert!(matches!(result, ItemUpdate::Updated { .. }));
        assert_eq!(record.current_version_sha.as_ref().unwrap().as_str(), SHA1);
        assert_eq!(read_tree(&record.local_path), vec![("main.lua".to_string(), "v1".to_string())]);
    }

    #[tokio::test]
    async fn test_remove_deletes_files() {
        let repo = FakeRepository::new("acme", "tools");
        repo.commit(SHA1, &[("main.lua", "v1")]);
        let temp = tempdir().unwrap();
        let manager = manager(&repo, &temp);
        let (record, _) = manager.add(request(&temp, "")).await.unwrap();

        manager.remove(&record, true).await.unwrap();
        assert!(record.local_path.exists());
        manager.remove(&record, false).await.unwrap();
        assert!(!record.local_path.exists());
    }
}
