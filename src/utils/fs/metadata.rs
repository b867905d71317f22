//! Content hashing.
//!
//! Whole-file identity is decided by SHA-256 digests computed by streaming the
//! file in fixed-size chunks, so memory use does not grow with file size.
//!
//! # Examples
//!
//! ```rust,no_run
//! use scriptkeeper::utils::fs::metadata::calculate_checksum;
//! use std::path::Path;
//!
//! # fn example() -> scriptkeeper::core::KeeperResult<()> {
//! let digest = calculate_checksum(Path::new("main.lua"))?;
//! println!("main.lua: {digest}");
//! # Ok(())
//! # }
//! ```

use crate::constants::HASH_CHUNK_SIZE;
use crate::core::{IoResultExt, KeeperResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Calculates the SHA-256 checksum of a file as lowercase hex.
///
/// The file is read in [`HASH_CHUNK_SIZE`] chunks.
///
/// # Errors
///
/// Returns [`KeeperError::FileSystemError`] if the file cannot be opened or read.
/// Callers comparing content must treat this as "unknown", never "unchanged".
pub fn calculate_checksum(path: &Path) -> KeeperResult<String> {
    let mut file = File::open(path).fs_context("opening file for checksum", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).fs_context("reading file for checksum", path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Calculates the SHA-256 checksum of an in-memory buffer as lowercase hex.
#[must_use]
pub fn checksum_bytes(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
