//! Remote locations: repository URLs, subfolder references and commit identities.
//!
//! A managed script points at a subtree of a hosted repository. The location
//! is given as a web URL of the form
//! `https://<host>/<owner>/<repo>[/tree/<ref>[/<path...>]]`, optionally
//! combined with an explicit subfolder and a ref hint.
//!
//! # Components
//!
//! - [`RepositoryLocation`] - Parsed repository URL
//! - [`RemoteRef`] - What to fetch: location, subfolder and ref hint
//! - [`CommitIdentity`] - Full commit hash identifying one fetched state
//!
//! # Ref precedence
//!
//! A ref embedded in the URL (`/tree/<ref>`) wins over an explicit ref hint,
//! which wins over the repository's default branch. Refs containing `/` cannot
//! be expressed in the URL form because the ref and the path are ambiguous;
//! pass them as a hint instead.

use crate::constants::SHORT_COMMIT_LEN;
use crate::core::{KeeperError, KeeperResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed `https://<host>/<owner>/<repo>[/tree/<ref>[/<path>]]` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    /// Host name, e.g. `github.com`
    pub host: String,
    /// Repository owner (user or organisation)
    pub owner: String,
    /// Repository name without a `.git` suffix
    pub repo: String,
    /// Ref taken from a `/tree/<ref>` segment
    pub tree_ref: Option<String>,
    /// Sub-path following the tree ref, without leading or trailing `/`
    pub tree_path: Option<String>,
}

impl RepositoryLocation {
    /// Parse a repository web URL.
    ///
    /// Trailing slashes, a `.git` suffix on the repository name, and any query
    /// string or fragment are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::InvalidRepositoryLocation`] when the URL is not
    /// `https`, lacks an owner or repository, or has segments after the
    /// repository other than `tree/<ref>[/<path>]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scriptkeeper::source::RepositoryLocation;
    ///
    /// let loc = RepositoryLocation::parse("https://github.com/acme/tools/tree/main/scripts/utils").unwrap();
    /// assert_eq!(loc.full_name(), "acme/tools");
    /// assert_eq!(loc.tree_ref.as_deref(), Some("main"));
    /// assert_eq!(loc.tree_path.as_deref(), Some("scripts/utils"));
    /// ```
    pub fn parse(url: &str) -> KeeperResult<Self> {
        let invalid = |reason: &str| KeeperError::InvalidRepositoryLocation {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = url.trim();
        let rest = trimmed
            .strip_prefix("https://")
            .ok_or_else(|| invalid("only https:// URLs are supported"))?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();

        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let host = segments.next().ok_or_else(|| invalid("missing host"))?;
        let owner = segments.next().ok_or_else(|| invalid("missing repository owner"))?;
        let repo = segments
            .next()
            .map(|r| r.trim_end_matches(".git"))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid("missing repository name"))?;

        let (tree_ref, tree_path) = match segments.next() {
            None => (None, None),
            Some("tree") => {
                let reference = segments.next().ok_or_else(|| invalid("'tree' without a ref"))?;
                let path: Vec<&str> = segments.collect();
                if path.iter().any(|s| *s == "..") {
                    return Err(invalid("path must not contain '..'"));
                }
                let path = if path.is_empty() { None } else { Some(path.join("/")) };
                (Some(reference.to_string()), path)
            }
            Some(other) => {
                return Err(invalid(&format!(
                    "unexpected segment '{other}' after the repository name (expected 'tree')"
                )));
            }
        };

        Ok(Self {
            host: host.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            tree_ref,
            tree_path,
        })
    }

    /// `owner/repo`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepositoryLocation {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/{}/{}", self.host, self.owner, self.repo)?;
        if let Some(reference) = &self.tree_ref {
            write!(f, "/tree/{reference}")?;
            if let Some(path) = &self.tree_path {
                write!(f, "/{path}")?;
            }
        }
        Ok(())
    }
}

/// What to fetch: a repository, a subfolder inside it, and an optional ref.
///
/// Immutable once built. The subfolder is stored normalised: forward slashes,
/// no leading or trailing separator, empty meaning the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    location: RepositoryLocation,
    subfolder: String,
    ref_hint: Option<String>,
}

impl RemoteRef {
    /// Build a reference from an already parsed location.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::InvalidRepositoryLocation`] if `subfolder` tries
    /// to escape the repository with `..` components.
    pub fn new(
        location: RepositoryLocation,
        subfolder: &str,
        ref_hint: Option<String>,
    ) -> KeeperResult<Self> {
        let subfolder = normalize_subfolder(subfolder).ok_or_else(|| {
            KeeperError::InvalidRepositoryLocation {
                url: location.to_string(),
                reason: format!("subfolder '{subfolder}' must not contain '..'"),
            }
        })?;
        let ref_hint = ref_hint.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

        Ok(Self {
            location,
            subfolder,
            ref_hint,
        })
    }

    /// Parse `url` and build a reference in one step.
    pub fn parse(url: &str, subfolder: &str, ref_hint: Option<String>) -> KeeperResult<Self> {
        Self::new(RepositoryLocation::parse(url)?, subfolder, ref_hint)
    }

    /// The repository location.
    #[must_use]
    pub const fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    /// The explicit subfolder, without the URL sub-path.
    #[must_use]
    pub fn subfolder(&self) -> &str {
        &self.subfolder
    }

    /// The ref hint supplied alongside the URL.
    #[must_use]
    pub fn ref_hint(&self) -> Option<&str> {
        self.ref_hint.as_deref()
    }

    /// Subfolder to extract: the URL sub-path joined with the explicit subfolder.
    #[must_use]
    pub fn effective_subfolder(&self) -> String {
        match (self.location.tree_path.as_deref(), self.subfolder.as_str()) {
            (None, sub) => sub.to_string(),
            (Some(path), "") => path.to_string(),
            (Some(path), sub) => format!("{path}/{sub}"),
        }
    }

    /// The ref named by the URL or the hint, if any.
    ///
    /// `None` means the repository's default branch must be looked up.
    #[must_use]
    pub fn explicit_ref(&self) -> Option<&str> {
        self.location.tree_ref.as_deref().or(self.ref_hint.as_deref())
    }

    /// Default display name for an item installed from this reference.
    ///
    /// The repository name, followed by `_` and the effective subfolder with
    /// separators replaced by `_` when a subfolder is set.
    #[must_use]
    pub fn default_name(&self) -> String {
        let folder = self.effective_subfolder();
        if folder.is_empty() {
            self.location.repo.clone()
        } else {
            format!("{}_{}", self.location.repo, folder.replace('/', "_"))
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location.full_name())?;
        let folder = self.effective_subfolder();
        if !folder.is_empty() {
            write!(f, ":{folder}")?;
        }
        if let Some(reference) = self.explicit_ref() {
            write!(f, "@{reference}")?;
        }
        Ok(())
    }
}

/// Normalise a subfolder: unify separators, drop empty and `.` components.
///
/// Returns `None` when a `..` component is present.
fn normalize_subfolder(subfolder: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in subfolder.split(['/', '\\']) {
        match part.trim() {
            "" | "." => {}
            ".." => return None,
            p => parts.push(p),
        }
    }
    Some(parts.join("/"))
}

/// A full commit hash identifying the exact state a snapshot was taken from.
///
/// Compared by string equality only. Deserialization validates through
/// [`CommitIdentity::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitIdentity(String);

impl CommitIdentity {
    /// Wrap a commit hash.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Other`] for an empty value or one containing
    /// anything other than hexadecimal digits.
    pub fn new(sha: impl Into<String>) -> KeeperResult<Self> {
        let sha = sha.into().trim().to_string();
        if sha.is_empty() {
            return Err(KeeperError::Other {
                message: "commit identity must not be empty".to_string(),
            });
        }
        if !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KeeperError::Other {
                message: format!("commit identity '{sha}' is not a hexadecimal hash"),
            });
        }
        Ok(Self(sha))
    }

    /// The full hash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading [`SHORT_COMMIT_LEN`] characters used in archive slot names.
    #[must_use]
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_COMMIT_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for CommitIdentity {
    type Error = KeeperError;

    fn try_from(sha: String) -> KeeperResult<Self> {
        Self::new(sha)
    }
}

impl From<CommitIdentity> for String {
    fn from(commit: CommitIdentity) -> Self {
        commit.0
    }
}

impl fmt::Display for CommitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
