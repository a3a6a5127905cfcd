// ABOUTME: Replace command implementation.
// ABOUTME: Applies a JSON replacements file to every manifest in a directory.

use manifest_pin::error::Result;
use manifest_pin::manifest::default_pullspec_heuristic;
use manifest_pin::output::Source;
use manifest_pin::pinning;
use manifest_pin::types::Replacements;
use std::collections::BTreeMap;
use std::path::Path;

pub fn replace(manifest_dir: &Path, replacements_file: &Path, dry_run: bool) -> Result<()> {
    let raw: BTreeMap<String, String> = Source::new(replacements_file).read_json()?;
    let replacements = Replacements::from_strings(&raw)?;

    let mut csvs = pinning::from_directory(manifest_dir, default_pullspec_heuristic)?;
    pinning::replace(&mut csvs, &replacements)?;

    if dry_run {
        tracing::warn!("Dry run enabled, no output was generated");
        return Ok(());
    }

    pinning::save_all(&csvs)
}
