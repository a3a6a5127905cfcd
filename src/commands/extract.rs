// ABOUTME: Extract command implementation.
// ABOUTME: Writes the distinct image references of a manifest directory as a JSON array.

use manifest_pin::error::Result;
use manifest_pin::manifest::default_pullspec_heuristic;
use manifest_pin::output::Destination;
use manifest_pin::pinning;
use std::path::Path;

pub fn extract(manifest_dir: &Path, output: &Path) -> Result<()> {
    tracing::info!("Extracting image references from {}", manifest_dir.display());

    let csvs = pinning::from_directory(manifest_dir, default_pullspec_heuristic)?;
    let references: Vec<String> = pinning::extract(&csvs)?
        .iter()
        .map(ToString::to_string)
        .collect();

    Destination::new(output).write_json(&references)
}
