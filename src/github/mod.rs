//! Remote repository API.
//!
//! [`RepositoryApi`] is the seam between the fetcher and the hosting service.
//! It covers exactly the calls the fetcher needs:
//!
//! - default branch lookup
//! - commit identity for a ref
//! - whole-repository zip archive for a ref
//! - latest release with its downloadable assets
//! - recursive file tree for a ref
//! - raw download of a single file or a release asset
//!
//! [`GitHubClient`] implements it over HTTPS. Tests use the in-memory
//! `FakeRepository` from `test_utils`.
//!
//! No call retries on its own. Transient failures surface as
//! [`KeeperError::NetworkError`](crate::core::KeeperError::NetworkError) and
//! retrying is left to the caller.

mod client;

pub use client::{GitHubClient, GitHubConfig};

use crate::core::KeeperResult;
use crate::source::{CommitIdentity, RepositoryLocation};
use serde::Deserialize;
use std::future::Future;

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag the release was cut from
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Downloadable files attached to the release
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name of the asset
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

/// Kind of an entry in a repository tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    /// A file
    Blob,
    /// A directory
    Tree,
    /// A submodule
    Commit,
}

/// One entry of a recursive repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    /// Repository-relative path with `/` separators
    pub path: String,
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
}

/// Operations the fetcher needs from a repository host.
///
/// Implementations must be shareable across concurrent checks, hence
/// `Send + Sync` and `Send` futures.
pub trait RepositoryApi: Send + Sync {
    /// Name of the repository's default branch.
    fn default_branch(
        &self,
        location: &RepositoryLocation,
    ) -> impl Future<Output = KeeperResult<String>> + Send;

    /// Full commit hash the given ref currently points to.
    fn commit_identity(
        &self,
        location: &RepositoryLocation,
        reference: &str,
    ) -> impl Future<Output = KeeperResult<CommitIdentity>> + Send;

    /// Zip archive of the whole repository at `reference`.
    ///
    /// Members are rooted under a single synthetic top-level directory.
    fn zipball(
        &self,
        location: &RepositoryLocation,
        reference: &str,
    ) -> impl Future<Output = KeeperResult<Vec<u8>>> + Send;

    /// Latest published release, or `None` when the repository has none.
    fn latest_release(
        &self,
        location: &RepositoryLocation,
    ) -> impl Future<Output = KeeperResult<Option<Release>>> + Send;

    /// Recursive listing of every entry at `reference`.
    fn tree(
        &self,
        location: &RepositoryLocation,
        reference: &str,
    ) -> impl Future<Output = KeeperResult<Vec<TreeEntry>>> + Send;

    /// Raw content of one file at `reference`.
    fn download_file(
        &self,
        location: &RepositoryLocation,
        reference: &str,
        path: &str,
    ) -> impl Future<Output = KeeperResult<Vec<u8>>> + Send;

    /// Content of a release asset.
    fn download_asset(
        &self,
        asset: &ReleaseAsset,
    ) -> impl Future<Output = KeeperResult<Vec<u8>>> + Send;
}
