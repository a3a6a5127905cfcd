// ABOUTME: Resolve command implementation.
// ABOUTME: Reads a JSON array of references and writes a JSON object of digest replacements.

use super::resolver_setup::resolver_config;
use crate::cli::ResolverArgs;
use manifest_pin::error::Result;
use manifest_pin::output::{Destination, Source};
use manifest_pin::pinning;
use std::path::Path;

pub async fn resolve(images_file: &Path, output: &Path, args: &ResolverArgs) -> Result<()> {
    let resolver = resolver_config(args)?.build()?;

    let references: Vec<String> = Source::new(images_file).read_json()?;
    let resolved =
        pinning::resolve_references(resolver.as_ref(), &references, args.concurrency).await?;

    Destination::new(output).write_json(&resolved)
}
