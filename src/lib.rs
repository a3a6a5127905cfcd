// ABOUTME: Library root for manifest-pin - exposes the engine for the CLI and tests.
// ABOUTME: The main binary is in main.rs.

pub mod error;
pub mod manifest;
pub mod output;
pub mod pinning;
pub mod resolver;
pub mod types;
