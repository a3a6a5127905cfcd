// ABOUTME: Resolver error types with SNAFU pattern.
// ABOUTME: Separates retryable command failures from configuration and response errors.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResolveError {
    #[snafu(display("failed to run {}: {source}", program.display()))]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} failed for {reference} ({status}): {output}", program.display()))]
    CommandFailed {
        program: PathBuf,
        reference: String,
        status: String,
        output: String,
    },

    #[snafu(display("unreadable inspect output for {reference}: {source}"))]
    InvalidResponse {
        reference: String,
        source: serde_json::Error,
    },

    #[snafu(display("digest not on response for {reference}"))]
    MissingDigest { reference: String },

    #[snafu(display("auth file {} is not accessible: {source}", path.display()))]
    AuthFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("path is required for the {kind} image resolver"))]
    MissingPath { kind: super::ResolverKind },

    #[snafu(display("unknown resolver argument {key:?} (expected path or authFile)"))]
    UnknownArgument { key: String },

    #[snafu(display("failed to read resolver config {}: {source}", path.display()))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("invalid resolver config: {source}"))]
    ParseConfig { source: serde_yaml::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// The resolver program could not be run or exited unsuccessfully.
    Command,
    /// The program ran but its output was unusable.
    Response,
    /// The resolver was set up with bad arguments or files.
    Configuration,
}

impl ResolveError {
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            ResolveError::Spawn { .. } | ResolveError::CommandFailed { .. } => {
                ResolveErrorKind::Command
            }
            ResolveError::InvalidResponse { .. } | ResolveError::MissingDigest { .. } => {
                ResolveErrorKind::Response
            }
            ResolveError::AuthFile { .. }
            | ResolveError::MissingPath { .. }
            | ResolveError::UnknownArgument { .. }
            | ResolveError::ReadConfig { .. }
            | ResolveError::ParseConfig { .. } => ResolveErrorKind::Configuration,
        }
    }

    /// Whether running the same inspection again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::Spawn { .. }
                | ResolveError::CommandFailed { .. }
                | ResolveError::InvalidResponse { .. }
        )
    }
}
