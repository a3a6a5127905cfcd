// ABOUTME: Application-wide error types for manifest-pin.
// ABOUTME: Uses thiserror to wrap manifest, resolver and wire-format failures.

use crate::manifest::ManifestError;
use crate::resolver::ResolveError;
use crate::types::ImageNameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid image reference: {0}")]
    ImageName(#[from] ImageNameError),

    #[error("failed to read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
