// ABOUTME: Image resolvers that turn mutable tag references into digest references.
// ABOUTME: Exports the resolver trait, skopeo and script backends, and their config.

mod command;
mod config;
mod error;
mod script;
mod skopeo;

pub use command::{CommandOutput, CommandRunner, TokioRunner};
pub use config::ResolverConfig;
pub use error::{ResolveError, ResolveErrorKind};
pub use script::ScriptResolver;
pub use skopeo::{DEFAULT_ATTEMPTS, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PROGRAM, SkopeoResolver};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Maps an image reference to the same image pinned by digest.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_image_reference(&self, reference: &str) -> Result<String, ResolveError>;
}

/// Available resolver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    #[default]
    Skopeo,
    Script,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::Skopeo => write!(f, "skopeo"),
            ResolverKind::Script => write!(f, "script"),
        }
    }
}

/// The reference without its tag or digest: everything before the first
/// `@`, or failing that before the tag separator of the last path
/// component. A registry port is kept.
pub fn image_name_of(reference: &str) -> &str {
    if let Some(at) = reference.find('@') {
        return &reference[..at];
    }
    let last = reference.rfind('/').map_or(0, |slash| slash + 1);
    let end = reference[last..]
        .find(':')
        .map_or(reference.len(), |colon| last + colon);
    &reference[..end]
}
