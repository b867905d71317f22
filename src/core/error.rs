//! Error handling for scriptkeeper
//!
//! This module provides the error taxonomy shared by every component and the
//! user-facing rendering used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can branch on the cause of a failure
//! 2. **User-friendly messages** that name the item, the remote, and the cause
//!
//! # Architecture
//!
//! - [`KeeperError`] - Enumerated failure cases of the fetch, sync, archive and
//!   configuration layers
//! - [`ErrorKind`] - Coarse, machine-distinguishable cause of a [`KeeperError`]
//! - [`ErrorContext`] - Wrapper that adds details and suggestions for display
//!
//! # Examples
//!
//! ```rust,no_run
//! use scriptkeeper::core::{KeeperError, user_friendly_error};
//!
//! let error = KeeperError::FolderNotFound {
//!     folder: "scripts/missing".to_string(),
//!     repository: "acme/tools".to_string(),
//!     reference: "main".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Result alias used by the core components.
pub type KeeperResult<T> = std::result::Result<T, KeeperError>;

/// The main error type for scriptkeeper operations.
///
/// Each variant names one failure mode from the fetch, layout, archive and
/// sync layers. Variants carry the identifiers a user needs to act on the
/// failure: the repository, the requested folder, the archive slot, or the
/// local path.
#[derive(Error, Debug, Clone)]
pub enum KeeperError {
    /// The repository location is not a `https://<host>/<owner>/<repo>[/tree/<ref>[/<path>]]` URL.
    #[error("Invalid repository location '{url}': {reason}")]
    InvalidRepositoryLocation {
        /// The rejected location
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The requested subfolder does not exist at the resolved ref.
    #[error("Folder '{folder}' not found in repository '{repository}' (ref '{reference}')")]
    FolderNotFound {
        /// Requested subfolder
        folder: String,
        /// `owner/repo`
        repository: String,
        /// Resolved ref or commit
        reference: String,
    },

    /// A request to the remote failed in transit or with an unexpected status.
    #[error("Network error during {operation}: {reason}")]
    NetworkError {
        /// What was being requested
        operation: String,
        /// Transport error or HTTP status description
        reason: String,
        /// HTTP status code, when a response was received
        status: Option<u16>,
    },

    /// The remote answered 404 for a resource.
    #[error("Remote resource not found: {what}")]
    RemoteNotFound {
        /// Description of the missing resource
        what: String,
    },

    /// Downloaded bytes did not parse as a usable archive.
    #[error("Downloaded archive is corrupt: {reason}")]
    ArchiveCorrupt {
        /// Parser or validation message
        reason: String,
    },

    /// Downloaded archive parsed but contains nothing usable.
    #[error("Downloaded archive for '{repository}' is empty")]
    EmptyArchive {
        /// `owner/repo`
        repository: String,
    },

    /// The executable fetch mode found no matching files.
    #[error("No '{extension}' files found in '{repository}' via {source_kind}")]
    NoMatchingFiles {
        /// `owner/repo`
        repository: String,
        /// Extension that was searched for
        extension: String,
        /// Which lookup came up empty (release assets or repository tree)
        source_kind: String,
    },

    /// Layout promotion could not complete; the original tree was kept.
    #[error("Could not restructure '{path}': {reason}")]
    RestructureFailed {
        /// Installation root that was being normalised
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Writing an archive slot failed.
    #[error("Failed to write archive slot '{slot}': {reason}")]
    ArchiveWriteFailed {
        /// Slot name that was being written
        slot: String,
        /// Underlying cause
        reason: String,
    },

    /// Restoring an archive slot failed; the installation may be degraded.
    #[error("Failed to restore version '{slot}': {reason}")]
    RestoreFailed {
        /// Slot name that was being restored
        slot: String,
        /// Underlying cause
        reason: String,
    },

    /// A local filesystem operation failed.
    #[error("File system error while {operation} '{path}': {reason}")]
    FileSystemError {
        /// What was being done
        operation: String,
        /// Affected path
        path: String,
        /// Underlying I/O message
        reason: String,
    },

    /// Settings or registry could not be loaded or saved.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// No managed item has the given name.
    #[error("No managed script named '{name}'")]
    ScriptNotFound {
        /// Requested name
        name: String,
    },

    /// A managed item with the given name already exists.
    #[error("A managed script named '{name}' already exists")]
    ScriptAlreadyManaged {
        /// Conflicting name
        name: String,
    },

    /// Bare I/O error without further context.
    #[error("IO error: {0}")]
    Io(String),

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Message
        message: String,
    },
}

/// Coarse cause of a [`KeeperError`].
///
/// Lets callers distinguish network trouble from missing remote content and
/// from local I/O problems without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed user input (URL, name, setting value)
    InvalidInput,
    /// Transport failure or unexpected HTTP status
    Network,
    /// Requested remote content does not exist
    NotFound,
    /// Downloaded content was unusable
    Archive,
    /// Local filesystem failure
    LocalIo,
    /// Settings or registry problem
    Config,
    /// Unclassified
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidInput => "invalid input",
            Self::Network => "network",
            Self::NotFound => "not found",
            Self::Archive => "bad archive",
            Self::LocalIo => "local I/O",
            Self::Config => "configuration",
            Self::Other => "error",
        };
        f.write_str(label)
    }
}

impl KeeperError {
    /// Machine-distinguishable cause of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRepositoryLocation {
                ..
            } => ErrorKind::InvalidInput,
            Self::NetworkError {
                ..
            } => ErrorKind::Network,
            Self::FolderNotFound {
                ..
            }
            | Self::RemoteNotFound {
                ..
            }
            | Self::NoMatchingFiles {
                ..
            }
            | Self::ScriptNotFound {
                ..
            } => ErrorKind::NotFound,
            Self::ArchiveCorrupt {
                ..
            }
            | Self::EmptyArchive {
                ..
            } => ErrorKind::Archive,
            Self::RestructureFailed {
                ..
            }
            | Self::ArchiveWriteFailed {
                ..
            }
            | Self::RestoreFailed {
                ..
            }
            | Self::FileSystemError {
                ..
            }
            | Self::Io(_) => ErrorKind::LocalIo,
            Self::ConfigError {
                ..
            }
            | Self::ScriptAlreadyManaged {
                ..
            } => ErrorKind::Config,
            Self::Other {
                ..
            } => ErrorKind::Other,
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Only transport failures and server-side or rate-limit statuses qualify.
    /// Retry policy itself belongs to the caller.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError {
                status,
                ..
            } => match status {
                None => true,
                Some(code) => *code == 403 || *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Build a [`KeeperError::FileSystemError`] from an I/O error.
    pub fn fs(operation: &str, path: &Path, source: &std::io::Error) -> Self {
        Self::FileSystemError {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: source.to_string(),
        }
    }
}

impl From<std::io::Error> for KeeperError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<walkdir::Error> for KeeperError {
    fn from(error: walkdir::Error) -> Self {
        let path = error.path().map(|p| p.display().to_string()).unwrap_or_default();
        Self::FileSystemError {
            operation: "walking".to_string(),
            path,
            reason: error.to_string(),
        }
    }
}

/// Extension trait attaching path context to `std::io::Result`.
pub trait IoResultExt<T> {
    /// Convert the I/O error into [`KeeperError::FileSystemError`].
    fn fs_context(self, operation: &str, path: &Path) -> KeeperResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn fs_context(self, operation: &str, path: &Path) -> KeeperResult<T> {
        self.map_err(|e| KeeperError::fs(operation, path, &e))
    }
}

/// Error wrapper with user-facing details and an actionable suggestion.
///
/// Created by [`user_friendly_error`] and printed by the CLI entry point.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: KeeperError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: KeeperError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions.
///
/// Recognises [`KeeperError`] anywhere in the chain, plain I/O errors, and
/// TOML or JSON parse errors. Everything else is rendered with its full
/// cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(keeper_error) = error.downcast_ref::<KeeperError>() {
        let mut ctx = create_error_context(keeper_error.clone());
        // Outer anyhow context usually names the managed item
        let outer = error.to_string();
        if outer != keeper_error.to_string() && ctx.details.is_none() {
            ctx.details = Some(outer);
        }
        return ctx;
    }

    for cause in error.chain() {
        if let Some(keeper_error) = cause.downcast_ref::<KeeperError>() {
            return create_error_context(keeper_error.clone()).with_details(error.to_string());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(KeeperError::Io(io_error.to_string()))
                    .with_suggestion("Check ownership and permissions of the installation directory");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(KeeperError::Io(io_error.to_string()))
                    .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(KeeperError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Fix the syntax of config.toml or run 'scriptkeeper config show' to see the expected keys");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(KeeperError::Other {
        message,
    })
}

/// Map each [`KeeperError`] variant to a context with a tailored suggestion.
fn create_error_context(error: KeeperError) -> ErrorContext {
    match &error {
        KeeperError::InvalidRepositoryLocation {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Use a URL like 'https://github.com/owner/repo' or 'https://github.com/owner/repo/tree/main/path'",
        ),
        KeeperError::FolderNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Check the folder path (case-sensitive) and the branch or tag it should exist on",
        ),
        KeeperError::NetworkError {
            status: Some(403 | 429),
            ..
        } => ErrorContext::new(error)
            .with_details("GitHub limits unauthenticated API requests per hour")
            .with_suggestion("Set a token with 'scriptkeeper config set github-token <TOKEN>'"),
        KeeperError::NetworkError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection and try again"),
        KeeperError::RemoteNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Check the repository URL and ref; private repositories need a token",
        ),
        KeeperError::ArchiveCorrupt {
            ..
        }
        | KeeperError::EmptyArchive {
            ..
        } => ErrorContext::new(error).with_suggestion("Try the operation again; if it persists the remote archive is unusable"),
        KeeperError::RestoreFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The installation may be partially restored and should not be trusted")
            .with_suggestion("Run 'scriptkeeper versions <NAME>' and restore again, or update from the remote"),
        KeeperError::ScriptNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'scriptkeeper list' to see managed scripts"),
        KeeperError::ScriptAlreadyManaged {
            ..
        } => ErrorContext::new(error).with_suggestion("Pick another name with --name"),
        _ => ErrorContext::new(error),
    }
}
