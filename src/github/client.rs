use super::{Release, ReleaseAsset, RepositoryApi, TreeEntry};
use crate::constants::{DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT, DEFAULT_RAW_URL, USER_AGENT};
use crate::core::{KeeperError, KeeperResult};
use crate::source::{CommitIdentity, RepositoryLocation};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API base URL
    pub api_url: String,
    /// Base URL for raw file downloads
    pub raw_url: String,
    /// Optional bearer token; raises the rate limit when present
    pub token: Option<String>,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
            token: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// [`RepositoryApi`] over the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    raw_url: String,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

impl GitHubClient {
    /// Build a client with default headers, optional token and timeout.
    ///
    /// # Errors
    ///
    /// Fails if the token contains characters not allowed in a header or the
    /// HTTP client cannot be initialised.
    pub fn new(config: GitHubConfig) -> KeeperResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(
                |_| KeeperError::ConfigError {
                    message: "GitHub token contains invalid characters".to_string(),
                },
            )?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| KeeperError::Other {
                message: format!("Failed to initialise HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, location: &RepositoryLocation) -> String {
        format!("{}/repos/{}/{}", self.api_url, location.owner, location.repo)
    }

    async fn get(&self, url: &str, operation: &str) -> KeeperResult<Response> {
        debug!("GET {url}");
        let response =
            self.client.get(url).send().await.map_err(|e| network_error(operation, &e))?;
        check_status(response, operation, url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, operation: &str) -> KeeperResult<T> {
        self.get(url, operation).await?.json::<T>().await.map_err(|e| KeeperError::NetworkError {
            operation: operation.to_string(),
            reason: format!("unexpected response body: {e}"),
            status: None,
        })
    }

    async fn get_bytes(&self, url: &str, operation: &str) -> KeeperResult<Vec<u8>> {
        let bytes = self
            .get(url, operation)
            .await?
            .bytes()
            .await
            .map_err(|e| network_error(operation, &e))?;
        debug!("Downloaded {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

fn network_error(operation: &str, error: &reqwest::Error) -> KeeperError {
    let reason = if error.is_timeout() { format!("request timed out ({error})") } else { error.to_string() };
    KeeperError::NetworkError {
        operation: operation.to_string(),
        reason,
        status: error.status().map(|s| s.as_u16()),
    }
}

/// Map non-success statuses to the error taxonomy.
fn check_status(response: Response, operation: &str, url: &str) -> KeeperResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(KeeperError::RemoteNotFound {
            what: url.to_string(),
        }),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(KeeperError::NetworkError {
            operation: operation.to_string(),
            reason: format!(
                "HTTP {} (rate limit exceeded or access denied; configure a GitHub token to raise the limit)",
                status.as_u16()
            ),
            status: Some(status.as_u16()),
        }),
        _ => Err(KeeperError::NetworkError {
            operation: operation.to_string(),
            reason: format!("HTTP {status} from {url}"),
            status: Some(status.as_u16()),
        }),
    }
}

impl RepositoryApi for GitHubClient {
    async fn default_branch(&self, location: &RepositoryLocation) -> KeeperResult<String> {
        let info: RepoInfo =
            self.get_json(&self.repo_url(location), "repository lookup").await?;
        Ok(info.default_branch)
    }

    async fn commit_identity(
        &self,
        location: &RepositoryLocation,
        reference: &str,
    ) -> KeeperResult<CommitIdentity> {
        let url = format!("{}/commits/{reference}", self.repo_url(location));
        let info: CommitInfo = self.get_json(&url, "commit lookup").await?;
        CommitIdentity::new(info.sha)
    }

    async fn zipball(&self, location: &RepositoryLocation, reference: &str) -> KeeperResult<Vec<u8>> {
        let url = format!("{}/zipball/{reference}", self.repo_url(location));
        self.get_bytes(&url, "archive download").await
    }

    async fn latest_release(&self, location: &RepositoryLocation) -> KeeperResult<Option<Release>> {
        let url = format!("{}/releases/latest", self.repo_url(location));
        match self.get_json::<Release>(&url, "release lookup").await {
            Ok(release) => Ok(Some(release)),
            Err(KeeperError::RemoteNotFound {
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn tree(&self, location: &RepositoryLocation, reference: &str) -> KeeperResult<Vec<TreeEntry>> {
        let url = format!("{}/git/trees/{reference}?recursive=1", self.repo_url(location));
        let response: TreeResponse = self.get_json(&url, "tree listing").await?;
        if response.truncated {
            tracing::warn!(
                "Tree listing for {} was truncated by the server; some files may be missing",
                location.full_name()
            );
        }
        Ok(response.tree)
    }

    async fn download_file(
        &self,
        location: &RepositoryLocation,
        reference: &str,
        path: &str,
    ) -> KeeperResult<Vec<u8>> {
        let url = format!(
            "{}/{}/{}/{reference}/{}",
            self.raw_url,
            location.owner,
            location.repo,
            path.trim_start_matches('/')
        );
        self.get_bytes(&url, "file download").await
    }

    async fn download_asset(&self, asset: &ReleaseAsset) -> KeeperResult<Vec<u8>> {
        self.get_bytes(&asset.browser_download_url, "release asset download").await
    }
}
