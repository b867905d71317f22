//! Integration tests for scriptkeeper.
//!
//! - `scenario` drives the library end to end against an in-memory repository
//! - `cli` runs the binary against an isolated configuration directory
//!
//! Nothing here touches the network.

mod cli;
mod scenario;
