//! In-memory [`RepositoryApi`] used by unit and integration tests.

use super::ZipBuilder;
use crate::core::{KeeperError, KeeperResult};
use crate::github::{Release, ReleaseAsset, RepositoryApi, TreeEntry, TreeEntryKind};
use crate::source::{CommitIdentity, RepositoryLocation};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default, Clone)]
struct CommitContent {
    files: BTreeMap<String, Vec<u8>>,
    empty_dirs: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    default_branch: String,
    refs: HashMap<String, String>,
    commits: HashMap<String, CommitContent>,
    head: Option<String>,
    release: Option<(String, Vec<(String, Vec<u8>)>)>,
    offline: bool,
    failing: BTreeSet<String>,
    zipball_requests: Vec<String>,
}

/// A single fake repository reachable through [`RepositoryApi`].
///
/// Clones share state, so a test can keep a handle, pass a clone to a
/// fetcher, and keep pushing commits. Zipballs are shaped like GitHub's: one
/// synthetic root directory `<owner>-<repo>-<short sha>/` with directory
/// members for every folder.
#[derive(Clone)]
pub struct FakeRepository {
    owner: String,
    repo: String,
    state: Arc<Mutex<State>>,
}

impl FakeRepository {
    /// Empty repository whose default branch is `main`.
    #[must_use]
    pub fn new(owner: &str, repo: &str) -> Self {
        let state = State {
            default_branch: "main".to_string(),
            ..State::default()
        };
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Record a commit with exactly `files` and move the default branch to it.
    pub fn commit(&self, sha: &str, files: &[(&str, &str)]) {
        let content = CommitContent {
            files: files.iter().map(|(p, c)| ((*p).to_string(), c.as_bytes().to_vec())).collect(),
            empty_dirs: BTreeSet::new(),
        };
        let mut state = self.state();
        state.commits.insert(sha.to_string(), content);
        let branch = state.default_branch.clone();
        state.refs.insert(branch, sha.to_string());
        state.head = Some(sha.to_string());
    }

    /// Add an empty directory to the head commit.
    pub fn add_empty_dir(&self, path: &str) {
        let mut state = self.state();
        let head = state.head.clone().unwrap_or_default();
        state.commits.entry(head).or_default().empty_dirs.insert(path.to_string());
    }

    /// Point a named ref at a commit.
    pub fn set_ref(&self, name: &str, sha: &str) {
        self.state().refs.insert(name.to_string(), sha.to_string());
    }

    /// Publish a release with the given assets.
    pub fn set_release(&self, tag: &str, assets: &[(&str, &str)]) {
        let assets =
            assets.iter().map(|(n, c)| ((*n).to_string(), c.as_bytes().to_vec())).collect();
        self.state().release = Some((tag.to_string(), assets));
    }

    /// Make every call fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Make calls of one kind fail with a network error.
    ///
    /// `operation` is one of `repository lookup`, `commit lookup`,
    /// `archive download`, `release lookup`, `tree listing` or `file download`.
    pub fn fail_operation(&self, operation: &str) {
        self.state().failing.insert(operation.to_string());
    }

    /// Refs passed to [`RepositoryApi::zipball`], in call order.
    #[must_use]
    pub fn zipball_requests(&self) -> Vec<String> {
        self.state().zipball_requests.clone()
    }

    fn guard(&self, location: &RepositoryLocation, operation: &str) -> KeeperResult<()> {
        let failing = {
            let state = self.state();
            state.offline || state.failing.contains(operation)
        };
        if failing {
            return Err(KeeperError::NetworkError {
                operation: operation.to_string(),
                reason: "simulated outage".to_string(),
                status: None,
            });
        }
        if location.owner != self.owner || location.repo != self.repo {
            return Err(KeeperError::RemoteNotFound {
                what: location.full_name(),
            });
        }
        Ok(())
    }

    fn resolve(&self, reference: &str) -> KeeperResult<(String, CommitContent)> {
        let state = self.state();
        let sha = state.refs.get(reference).cloned().unwrap_or_else(|| reference.to_string());
        let content = state.commits.get(&sha).cloned().ok_or_else(|| KeeperError::RemoteNotFound {
            what: format!("{}/{} ref '{reference}'", self.owner, self.repo),
        })?;
        Ok((sha, content))
    }

    fn directories(content: &CommitContent) -> BTreeSet<String> {
        let mut dirs = content.empty_dirs.clone();
        for path in content.files.keys().chain(content.empty_dirs.iter()) {
            let mut parts: Vec<&str> = path.split('/').collect();
            parts.pop();
            while !parts.is_empty() {
                dirs.insert(parts.join("/"));
                parts.pop();
            }
        }
        dirs
    }
}

impl RepositoryApi for FakeRepository {
    async fn default_branch(&self, location: &RepositoryLocation) -> KeeperResult<String> {
        self.guard(location, "repository lookup")?;
        Ok(self.state().default_branch.clone())
    }

    async fn commit_identity(
        &self,
        location: &RepositoryLocation,
        reference: &str,
    ) -> KeeperResult<CommitIdentity> {
        self.guard(location, "commit lookup")?;
        let sha = self.state().refs.get(reference).cloned();
        match sha {
            Some(sha) => CommitIdentity::new(sha),
            None if self.state().commits.contains_key(reference) => CommitIdentity::new(reference),
            None => Err(KeeperError::RemoteNotFound {
                what: format!("{}/{} ref '{reference}'", self.owner, self.repo),
            }),
        }
    }

    async fn zipball(&self, location: &RepositoryLocation, reference: &str) -> KeeperResult<Vec<u8>> {
        self.guard(location, "archive download")?;
        self.state().zipball_requests.push(reference.to_string());
        let (sha, content) = self.resolve(reference)?;

        let short: String = sha.chars().take(7).collect();
        let root = format!("{}-{}-{short}", self.owner, self.repo);
        let mut builder = ZipBuilder::new().dir(&root);
        for dir in Self::directories(&content) {
            builder = builder.dir(&format!("{root}/{dir}"));
        }
        for (path, bytes) in &content.files {
            builder = builder.file(&format!("{root}/{path}"), bytes);
        }
        Ok(builder.build())
    }

    async fn latest_release(&self, location: &RepositoryLocation) -> KeeperResult<Option<Release>> {
        self.guard(location, "release lookup")?;
        let state = self.state();
        Ok(state.release.as_ref().map(|(tag, assets)| Release {
            tag: tag.clone(),
            assets: assets
                .iter()
                .map(|(name, _)| ReleaseAsset {
                    name: name.clone(),
                    browser_download_url: format!("fake://{tag}/{name}"),
                })
                .collect(),
        }))
    }

    async fn tree(&self, location: &RepositoryLocation, reference: &str) -> KeeperResult<Vec<TreeEntry>> {
        self.guard(location, "tree listing")?;
        let (_, content) = self.resolve(reference)?;
        let mut entries: Vec<TreeEntry> = Self::directories(&content)
            .into_iter()
            .map(|path| TreeEntry {
                path,
                kind: TreeEntryKind::Tree,
            })
            .collect();
        entries.extend(content.files.keys().map(|path| TreeEntry {
            path: path.clone(),
            kind: TreeEntryKind::Blob,
        }));
        Ok(entries)
    }

    async fn download_file(
        &self,
        location: &RepositoryLocation,
        reference: &str,
        path: &str,
    ) -> KeeperResult<Vec<u8>> {
        self.guard(location, "file download")?;
        let (_, content) = self.resolve(reference)?;
        content.files.get(path).cloned().ok_or_else(|| KeeperError::RemoteNotFound {
            what: path.to_string(),
        })
    }

    async fn download_asset(&self, asset: &ReleaseAsset) -> KeeperResult<Vec<u8>> {
        let state = self.state();
        state
            .release
            .as_ref()
            .and_then(|(_, assets)| assets.iter().find(|(name, _)| *name == asset.name))
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| KeeperError::RemoteNotFound {
                what: asset.browser_download_url.clone(),
            })
    }
}
