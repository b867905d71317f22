//! Cross-platform utilities
//!
//! - [`fs`] - checksums, directory copies and atomic writes
//! - [`logging`] - tracing subscriber setup for the binary
//! - [`progress`] - terminal spinners

pub mod fs;
pub mod logging;
pub mod progress;

pub use logging::init_logging;
pub use progress::Spinner;
