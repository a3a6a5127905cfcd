// ABOUTME: Error types for manifest loading, pull spec discovery and rewriting.
// ABOUTME: Separates the recoverable "not a CSV" case from hard manifest errors.

use super::lens::LensError;
use crate::types::ImageNameError;
use nonempty::NonEmpty;
use std::fmt;
use std::path::PathBuf;

/// Two pull specs that share a related-image name but point at different
/// images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub existing: String,
    pub existing_image: String,
    pub incoming: String,
    pub incoming_image: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} X {}: {}",
            self.existing, self.existing_image, self.incoming, self.incoming_image
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The document's `kind` is not `ClusterServiceVersion`. Directory scans
    /// skip such files.
    #[error("not a ClusterServiceVersion")]
    NotClusterServiceVersion,

    #[error(transparent)]
    Lens(#[from] LensError),

    #[error("{location}: expected a {expected}")]
    TypeMismatch {
        location: String,
        expected: &'static str,
    },

    #[error("{location}: field not found")]
    MissingField { location: String },

    #[error("{name}: \"valueFrom\" references are not supported")]
    UnsupportedValueFrom { name: String },

    #[error(
        "{} - found conflicts when setting relatedImages:\n{}",
        .path.display(),
        format_conflicts(.conflicts)
    )]
    Conflicts {
        path: PathBuf,
        conflicts: NonEmpty<Conflict>,
    },

    #[error("{location}: span {start}..{end} is outside the current value")]
    StaleSpan {
        location: String,
        start: usize,
        end: usize,
    },

    #[error("{spec}: invalid pull spec {image:?}: {source}")]
    InvalidImage {
        spec: String,
        image: String,
        #[source]
        source: ImageNameError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ManifestError {
    /// Whether the error only means "this file is not an operator manifest".
    pub fn is_not_csv(&self) -> bool {
        matches!(self, ManifestError::NotClusterServiceVersion)
    }
}

fn format_conflicts(conflicts: &NonEmpty<Conflict>) -> String {
    conflicts
        .iter()
        .map(Conflict::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
