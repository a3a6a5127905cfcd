// ABOUTME: Builds the resolver configuration from CLI flags and an optional config file.
// ABOUTME: Locates skopeo on PATH so the default resolver gets an absolute program path.

use crate::cli::ResolverArgs;
use manifest_pin::error::Result;
use manifest_pin::resolver::{DEFAULT_PROGRAM, ResolverConfig, ResolverKind};
use std::path::PathBuf;

/// Config file first, then `--resolver`, `--resolver-args` and `--authfile`
/// on top.
pub fn resolver_config(args: &ResolverArgs) -> Result<ResolverConfig> {
    let mut config = match &args.resolver_config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    if let Some(kind) = args.resolver {
        config.kind = kind;
    }

    config.apply_args(
        args.resolver_args
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )?;

    if let Some(auth_file) = &args.authfile {
        config.auth_file = Some(auth_file.clone());
    }

    if config.kind == ResolverKind::Skopeo && config.path.is_none() {
        config.path = find_on_path(DEFAULT_PROGRAM);
    }

    Ok(config)
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    match which::which(program) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("Failed to find {} in PATH: {}", program, e);
            None
        }
    }
}
