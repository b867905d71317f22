//! Global constants used throughout the scriptkeeper codebase.
//!
//! This module contains reserved names, naming-convention widths, buffer
//! sizes, and network defaults that are used across multiple modules.
//! Defining them centrally keeps the on-disk layout discoverable.

use std::time::Duration;

/// Name of the reserved child directory holding archived prior states.
///
/// Every installation root may contain this directory. Fetch and diff logic
/// never treats it as managed content.
pub const OLDER_VERSIONS_DIR: &str = "Older Versions";

/// Number of leading commit-hash characters used in archive slot names.
pub const SHORT_COMMIT_LEN: usize = 8;

/// Separator between the fields of an archive slot name.
pub const SLOT_FIELD_SEPARATOR: char = '_';

/// `chrono` format of the timestamp field of an archive slot name.
///
/// Must not contain [`SLOT_FIELD_SEPARATOR`].
pub const SLOT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Extension of the sidecar file recording the full commit of a slot.
pub const SLOT_COMMIT_SIDECAR_EXT: &str = "commit";

/// Chunk size used when streaming files through the content hasher (64 KiB).
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Entry file that marks the root of a usable script.
pub const DEFAULT_ENTRY_FILE: &str = "main.lua";

/// File extension selecting assets in the executable fetch mode.
pub const DEFAULT_EXECUTABLE_EXTENSION: &str = ".exe";

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default base URL for raw file downloads.
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Default timeout applied to every HTTP request (30 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of managed items processed concurrently in batch operations.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// User agent sent with every API request.
pub const USER_AGENT: &str = concat!("scriptkeeper/", env!("CARGO_PKG_VERSION"));

/// File name of the settings file inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// File name of the managed script registry inside the configuration directory.
pub const REGISTRY_FILE_NAME: &str = "managed_scripts.json";

/// File name of the debug log written when debug mode is enabled.
pub const DEBUG_LOG_FILE_NAME: &str = "app.log";

/// Environment variable overriding the configuration directory (CLI only).
pub const HOME_ENV_VAR: &str = "SCRIPTKEEPER_HOME";

/// Environment variable consulted for a token when none is configured (CLI only).
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";
