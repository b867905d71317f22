//! Test utilities for scriptkeeper
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`FakeRepository`] - in-memory repository host implementing
//!   [`RepositoryApi`](crate::github::RepositoryApi)
//! - [`ZipBuilder`] - build zip archives in memory
//! - [`init_test_logging`] - one-time tracing setup for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use scriptkeeper::fetcher::{Category, Fetcher, FetcherConfig};
//! use scriptkeeper::source::RemoteRef;
//! use scriptkeeper::test_utils::FakeRepository;
//!
//! # async fn example() {
//! let repo = FakeRepository::new("acme", "tools");
//! repo.commit("abcdef1234567890", &[("scripts/main.lua", "print('hi')")]);
//!
//! let fetcher = Fetcher::new(repo.clone(), FetcherConfig::default());
//! let remote = RemoteRef::parse("https://github.com/acme/tools", "scripts", None).unwrap();
//! let snapshot = fetcher.fetch_for_category(&remote, Category::Script).await.unwrap();
//! assert_eq!(snapshot.len(), 1);
//! # }
//! ```

mod fake_repository;
mod zip_builder;

pub use fake_repository::FakeRepository;
pub use zip_builder::ZipBuilder;

use std::path::Path;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=scriptkeeper=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Write `files` (relative path, content) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(target, content).unwrap();
    }
}

/// Every file under `root` as (relative path with `/`, content), sorted.
///
/// Entries inside the top-level `Older Versions` directory are left out.
#[must_use]
pub fn read_tree(root: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() != 1 || e.file_name() != crate::constants::OLDER_VERSIONS_DIR
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap();
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (relative, std::fs::read_to_string(e.path()).unwrap_or_default())
        })
        .collect();
    files.sort();
    files
}
