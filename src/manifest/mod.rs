// ABOUTME: Operator manifest loading, pull spec discovery and in-place rewriting.
// ABOUTME: Exports the OperatorCsv engine and the lens/heuristic building blocks.

mod csv;
mod error;
mod heuristic;
mod lens;
mod location;
mod pullspec;

pub use csv::{KNOWN_ANNOTATION_KEYS, OPERATOR_CSV_KIND, OperatorCsv};
pub use error::{Conflict, ManifestError};
pub use heuristic::{PullSpecHeuristic, default_pullspec_heuristic};
pub use lens::{Lens, LensBuilder, LensError, Located};
pub use location::{Location, Segment};
pub use pullspec::{
    Annotation, Container, InitContainer, LocatedField, NamedPullSpec, RELATED_IMAGE_PREFIX,
    RelatedImage, RelatedImageEnv, splice_order,
};
