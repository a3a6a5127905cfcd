// ABOUTME: Pin command implementation.
// ABOUTME: Runs extract, resolve and replace over a manifest directory in sequence.

use super::resolver_setup::resolver_config;
use crate::cli::ResolverArgs;
use manifest_pin::error::Result;
use manifest_pin::manifest::default_pullspec_heuristic;
use manifest_pin::output::Destination;
use manifest_pin::pinning::{self, PinOptions};
use std::path::Path;

pub async fn pin(
    manifest_dir: &Path,
    output_extract: &Path,
    output_replace: &Path,
    dry_run: bool,
    args: &ResolverArgs,
) -> Result<()> {
    let resolver = resolver_config(args)?.build()?;

    let options = PinOptions {
        references: Destination::new(output_extract),
        replacements: Destination::new(output_replace),
        concurrency: args.concurrency,
        dry_run,
    };

    let summary = pinning::pin(
        manifest_dir,
        default_pullspec_heuristic,
        resolver.as_ref(),
        &options,
    )
    .await?;

    tracing::info!(
        "Pinned {} of {} references across {} manifests",
        summary.resolved,
        summary.references,
        summary.manifests
    );
    Ok(())
}
