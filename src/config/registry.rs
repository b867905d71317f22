//! Registry of managed scripts (`managed_scripts.json`).
//!
//! The registry is a JSON array of [`ManagedScriptRecord`]s. It is written
//! atomically so a crash never leaves a truncated file behind. A registry that
//! fails to parse is reported, not replaced.

use crate::core::{KeeperError, KeeperResult};
use crate::fetcher::Category;
use crate::source::{CommitIdentity, RemoteRef};
use crate::utils::fs::atomic_write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of the last update check of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateStatus {
    /// The remote has a different commit than the one installed
    #[serde(rename = "available")]
    Available,
    /// The installed commit is current
    #[serde(rename = "uptodate")]
    UpToDate,
    /// The last check failed
    #[serde(rename = "check_failed")]
    CheckFailed,
    /// Never checked
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("update available"),
            Self::UpToDate => f.write_str("up to date"),
            Self::CheckFailed => f.write_str("check failed"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// One managed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedScriptRecord {
    /// Unique display name
    pub name: String,
    /// Repository URL as entered
    pub repo_url: String,
    /// Subfolder inside the repository; empty for the root
    #[serde(default)]
    pub folder_path: String,
    /// Branch or tag to follow; the default branch when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    /// Installation root
    pub local_path: PathBuf,
    /// Kind of content
    #[serde(default)]
    pub category: Category,
    /// Commit currently installed
    #[serde(default)]
    pub current_version_sha: Option<CommitIdentity>,
    /// Time of the last check or update attempt
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    /// Outcome of the last check
    #[serde(default)]
    pub update_status: UpdateStatus,
}

impl ManagedScriptRecord {
    /// The remote this item follows.
    pub fn remote_ref(&self) -> KeeperResult<RemoteRef> {
        RemoteRef::parse(&self.repo_url, &self.folder_path, self.ref_name.clone())
    }
}

/// All managed items, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptRegistry {
    scripts: Vec<ManagedScriptRecord>,
}

impl ScriptRegistry {
    /// Load the registry from `path`; empty when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ConfigError`] when the file cannot be read or parsed.
    pub async fn load_from(path: &Path) -> KeeperResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to parse {}: {e}", path.display()),
        })
    }

    /// Write the registry to `path` atomically.
    pub async fn save_to(&self, path: &Path) -> KeeperResult<()> {
        let content = serde_json::to_vec_pretty(self).map_err(|e| KeeperError::ConfigError {
            message: format!("Failed to serialize registry: {e}"),
        })?;
        let path = path.to_path_buf();
        crate::installer::blocking(move || atomic_write(&path, &content)).await
    }

    /// Record by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManagedScriptRecord> {
        self.scripts.iter().find(|s| s.name == name)
    }

    /// Mutable record by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedScriptRecord> {
        self.scripts.iter_mut().find(|s| s.name == name)
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ScriptAlreadyManaged`] when the name is taken.
    pub fn add(&mut self, record: ManagedScriptRecord) -> KeeperResult<()> {
        if self.get(&record.name).is_some() {
            return Err(KeeperError::ScriptAlreadyManaged {
                name: record.name,
            });
        }
        self.scripts.push(record);
        Ok(())
    }

    /// Replace the record with the same name.
    pub fn upsert(&mut self, record: ManagedScriptRecord) {
        match self.get_mut(&record.name) {
            Some(existing) => *existing = record,
            None => self.scripts.push(record),
        }
    }

    /// Remove a record by name.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::ScriptNotFound`] when no record has the name.
    pub fn remove(&mut self, name: &str) -> KeeperResult<ManagedScriptRecord> {
        let index = self.scripts.iter().position(|s| s.name == name).ok_or_else(|| {
            KeeperError::ScriptNotFound {
                name: name.to_string(),
            }
        })?;
        Ok(self.scripts.remove(index))
    }

    /// All records.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedScriptRecord> {
        self.scripts.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str) -> ManagedScriptRecord {
        ManagedScriptRecord {
            name: name.to_string(),
            repo_url: "https://github.com/acme/tools".to_string(),
            folder_path: "scripts/utils".to_string(),
            ref_name: None,
            local_path: PathBuf::from("/games/scripts").join(name),
            category: Category::Script,
            current_version_sha: Some(CommitIdentity::new("abcdef1234").unwrap()),
            last_checked: None,
            update_status: UpdateStatus::UpToDate,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("managed_scripts.json");

        let mut registry = ScriptRegistry::default();
        registry.add(record("a")).unwrap();
        registry.add(record("b")).unwrap();
        registry.save_to(&path).await.unwrap();

        let loaded = ScriptRegistry::load_from(&path).await.unwrap();
        assert_eq!(loaded, registry);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('['));
        assert!(raw.contains("\"update_status\": \"uptodate\""));
    }

    #[tokio::test]
    async fn test_corrupt_registry_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("managed_scripts.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ScriptRegistry::load_from(&path).await.unwrap_err();
        assert!(matches!(err, KeeperError::ConfigError { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_minimal_record_uses_defaults() {
        let registry: ScriptRegistry = serde_json::from_str(
            r#"[{"name":"x","repo_url":"https://github.com/a/b","local_path":"/tmp/x"}]"#,
        )
        .unwrap();
        let x = registry.get("x").unwrap();
        assert_eq!(x.category, Category::Script);
        assert_eq!(x.update_status, UpdateStatus::Unknown);
        assert!(x.current_version_sha.is_none());
        assert_eq!(x.remote_ref().unwrap().effective_subfolder(), "");
    }

    #[tokio::test]
    async fn test_invalid_commit_in_registry_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("managed_scripts.json");
        std::fs::write(
            &path,
            r#"[{"name":"x","repo_url":"https://github.com/a/b","local_path":"/tmp/x","current_version_sha":""}]"#,
        )
        .unwrap();

        let err = ScriptRegistry::load_from(&path).await.unwrap_err();
        assert!(matches!(err, KeeperError::ConfigError { ref message } if message.contains("commit identity")));
    }

    #[test]
    fn test_add_remove() {
        let mut registry = ScriptRegistry::default();
        registry.add(record("a")).unwrap();
        assert!(matches!(
            registry.add(record("a")).unwrap_err(),
            KeeperError::ScriptAlreadyManaged { .. }
        ));
        assert_eq!(registry.remove("a").unwrap().name, "a");
        assert!(matches!(registry.remove("a").unwrap_err(), KeeperError::ScriptNotFound { .. }));
        assert!(registry.is_empty());
    }
}
