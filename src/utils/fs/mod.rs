//! File system utilities used by the sync, archive and configuration layers.
//!
//! # Key Features
//!
//! - **Streaming checksums**: SHA-256 digests computed in bounded chunks
//! - **Reserved-entry aware copies**: copy or clear a directory while leaving
//!   one top-level entry alone
//! - **Atomic writes**: write-then-persist for settings and registry files

pub mod atomic;
pub mod dirs;
pub mod metadata;

pub use atomic::atomic_write;
pub use dirs::{
    clear_dir_except, copy_dir, copy_dir_except, ensure_dir, ensure_parent_dir, remove_dir_all,
};
pub use metadata::{calculate_checksum, checksum_bytes};
