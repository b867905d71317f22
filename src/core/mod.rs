//! Core types shared by every scriptkeeper component.
//!
//! Currently this is the error taxonomy: [`KeeperError`] for the library
//! layers, [`ErrorKind`] for coarse classification, and [`ErrorContext`] /
//! [`user_friendly_error`] for rendering failures in the CLI.

pub mod error;

pub use error::{
    ErrorContext, ErrorKind, IoResultExt, KeeperError, KeeperResult, user_friendly_error,
};
