// ABOUTME: The extract, resolve and replace stages that pin manifests to digests.
// ABOUTME: Each stage works on a directory of operator manifests and JSON wire files.

use crate::error::{Error, Result};
use crate::manifest::{OperatorCsv, PullSpecHeuristic};
use crate::output::Destination;
use crate::resolver::ImageResolver;
use crate::types::{ImageName, Replacements};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_OUTPUT_EXTRACT: &str = "references.json";
pub const DEFAULT_OUTPUT_REPLACE: &str = "replacements.json";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Loads every operator manifest below `dir`.
///
/// Files are visited in sorted order. YAML documents of other kinds are
/// skipped; anything else that fails to load fails the whole scan.
pub fn from_directory(dir: &Path, heuristic: PullSpecHeuristic) -> Result<Vec<OperatorCsv>> {
    let mut files = Vec::new();
    collect_yaml_files(dir, &mut files)?;

    let mut csvs = Vec::new();
    for file in files {
        tracing::debug!("Visiting {}", file.display());

        match OperatorCsv::from_path(&file) {
            Ok(csv) => csvs.push(csv.with_heuristic(heuristic)),
            Err(e) if e.is_not_csv() => {
                tracing::info!(
                    "Skipping {} because it's not a ClusterServiceVersion",
                    file.display()
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(csvs)
}

/// Depth-first, siblings sorted by name. Symlinked directories are not
/// descended into; symlinked files are read like regular ones.
fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::ReadDir {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            tracing::debug!("Skipping {} because it's not a regular file", path.display());
        } else if path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
        {
            files.push(entry.into_path());
        } else {
            tracing::debug!("Skipping non-yaml file {}", path.display());
        }
    }

    Ok(())
}

/// Distinct pull specs across all manifests, in the order first seen.
pub fn extract(csvs: &[OperatorCsv]) -> Result<Vec<ImageName>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for csv in csvs {
        for image in csv.pull_specs()? {
            if seen.insert(image.clone()) {
                images.push(image);
            }
        }
    }

    Ok(images)
}

/// Resolves every reference that is not already pinned to a digest.
///
/// Up to `concurrency` resolutions run at once. The first failure aborts the
/// batch and nothing is returned.
pub async fn resolve_references(
    resolver: &dyn ImageResolver,
    references: &[String],
    concurrency: usize,
) -> Result<BTreeMap<String, String>> {
    let pending: Vec<&String> = references
        .iter()
        .filter(|reference| {
            let pinned = reference.contains('@');
            if pinned {
                tracing::debug!("{} is already pinned", reference);
            }
            !pinned
        })
        .collect();

    stream::iter(pending)
        .map(|reference| async move {
            tracing::info!("Resolving {}", reference);
            let resolved = resolver.resolve_image_reference(reference).await?;
            Ok::<_, Error>((reference.clone(), resolved))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

/// Rewrites each manifest in memory: named pull specs, then free-text
/// matches, then a fresh `spec.relatedImages`.
pub fn replace(csvs: &mut [OperatorCsv], replacements: &Replacements) -> Result<()> {
    for csv in csvs {
        csv.replace_pull_specs(replacements)?;
        csv.replace_pull_specs_everywhere(replacements)?;
        csv.set_related_images()?;
    }
    Ok(())
}

pub fn save_all(csvs: &[OperatorCsv]) -> Result<()> {
    for csv in csvs {
        tracing::info!("Writing {}", csv.path().display());
        csv.save()?;
    }
    Ok(())
}

/// Where `pin` leaves its intermediate files.
#[derive(Debug, Clone)]
pub struct PinOptions {
    pub references: Destination,
    pub replacements: Destination,
    pub concurrency: usize,
    pub dry_run: bool,
}

/// What a `pin` run found and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSummary {
    pub manifests: usize,
    pub references: usize,
    pub resolved: usize,
}

/// Extracts, resolves and replaces in one go. Every stage writes its output
/// before the next starts, so a failed resolution still leaves the
/// references file behind.
pub async fn pin(
    dir: &Path,
    heuristic: PullSpecHeuristic,
    resolver: &dyn ImageResolver,
    options: &PinOptions,
) -> Result<PinSummary> {
    let mut csvs = from_directory(dir, heuristic)?;

    let references: Vec<String> = extract(&csvs)?.iter().map(ToString::to_string).collect();
    options.references.write_json(&references)?;

    let resolved = resolve_references(resolver, &references, options.concurrency).await?;
    options.replacements.write_json(&resolved)?;

    let replacements = Replacements::from_strings(&resolved)?;
    replace(&mut csvs, &replacements)?;

    if options.dry_run {
        tracing::warn!("Dry run enabled, manifests were not modified");
    } else {
        save_all(&csvs)?;
    }

    Ok(PinSummary {
        manifests: csvs.len(),
        references: references.len(),
        resolved: resolved.len(),
    })
}
