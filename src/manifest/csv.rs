// ABOUTME: The ClusterServiceVersion document engine.
// ABOUTME: Finds named and heuristic pull specs, rewrites them and rebuilds relatedImages.

use super::error::{Conflict, ManifestError};
use super::heuristic::{PullSpecHeuristic, default_pullspec_heuristic};
use super::lens::{Lens, LensError, Located};
use super::location::{Location, Segment};
use super::pullspec::{
    Annotation, Container, InitContainer, LocatedField, NamedPullSpec, RELATED_IMAGE_PREFIX,
    RelatedImage, RelatedImageEnv, splice_order,
};
use crate::types::{ImageName, Replacements};
use nonempty::NonEmpty;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const OPERATOR_CSV_KIND: &str = "ClusterServiceVersion";

/// Annotation keys that are expected to hold a pull spec.
pub const KNOWN_ANNOTATION_KEYS: &[&str] = &["containerImage"];

static RELATED_IMAGES: LazyLock<Lens> =
    LazyLock::new(|| Lens::builder().key("spec").key("relatedImages").build());

static DEPLOYMENTS: LazyLock<Lens> = LazyLock::new(|| {
    Lens::builder()
        .key("spec")
        .key("install")
        .key("spec")
        .key("deployments")
        .build()
});

static CONTAINERS: LazyLock<Lens> = LazyLock::new(|| {
    Lens::builder()
        .key("spec")
        .key("template")
        .key("spec")
        .key("containers")
        .build()
});

static INIT_CONTAINERS: LazyLock<Lens> = LazyLock::new(|| {
    Lens::builder()
        .key("spec")
        .key("template")
        .key("spec")
        .key("initContainers")
        .build()
});

static CSV_ANNOTATIONS: LazyLock<Lens> =
    LazyLock::new(|| Lens::builder().key("metadata").key("annotations").build());

static DEPLOYMENT_ANNOTATIONS: LazyLock<Lens> = LazyLock::new(|| {
    let template_annotations = Lens::builder()
        .key("spec")
        .key("template")
        .key("metadata")
        .key("annotations")
        .build();

    Lens::builder()
        .key("spec")
        .key("install")
        .key("spec")
        .key("deployments")
        .apply(template_annotations)
        .build()
});

type PullSpecs = Vec<Box<dyn NamedPullSpec>>;

/// An operator manifest loaded from disk or memory.
#[derive(Debug, Clone)]
pub struct OperatorCsv {
    path: PathBuf,
    data: Value,
    heuristic: PullSpecHeuristic,
}

impl OperatorCsv {
    /// Wraps an already parsed document. Anything whose `kind` is not
    /// `ClusterServiceVersion` is rejected.
    pub fn new(path: impl Into<PathBuf>, data: Value) -> Result<Self, ManifestError> {
        if data.get("kind").and_then(Value::as_str) != Some(OPERATOR_CSV_KIND) {
            return Err(ManifestError::NotClusterServiceVersion);
        }

        Ok(Self {
            path: path.into(),
            data,
            heuristic: default_pullspec_heuristic,
        })
    }

    pub fn from_yaml(path: impl Into<PathBuf>, text: &str) -> Result<Self, ManifestError> {
        let path = path.into();
        let data = serde_yaml::from_str(text).map_err(|source| ManifestError::Yaml {
            path: path.clone(),
            source,
        })?;
        Self::new(path, data)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path, &text)
    }

    pub fn with_heuristic(mut self, heuristic: PullSpecHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(&self.data).map_err(|source| ManifestError::Yaml {
            path: self.path.clone(),
            source,
        })
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<(), ManifestError> {
        let yaml = self.to_yaml()?;
        writer
            .write_all(yaml.as_bytes())
            .map_err(|source| ManifestError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Overwrites the file the manifest was loaded from.
    pub fn save(&self) -> Result<(), ManifestError> {
        let yaml = self.to_yaml()?;
        std::fs::write(&self.path, yaml).map_err(|source| ManifestError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn has_related_images(&self) -> bool {
        self.related_image_specs()
            .map(|specs| !specs.is_empty())
            .unwrap_or(false)
    }

    pub fn has_related_image_envs(&self) -> bool {
        self.related_image_env_specs()
            .map(|specs| !specs.is_empty())
            .unwrap_or(false)
    }

    /// Every distinct image referenced by a named pull spec, in the order
    /// first seen.
    pub fn pull_specs(&self) -> Result<Vec<ImageName>, ManifestError> {
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for spec in self.named_pull_specs()? {
            let image = spec.image(&self.data)?;
            tracing::info!("Found pullspec for {}: {}", spec.describe(&self.data), image);

            let parsed = parse_image(spec.as_ref(), &self.data, &image)?;
            if seen.insert(parsed.clone()) {
                images.push(parsed);
            }
        }

        Ok(images)
    }

    /// Rewrites the schema-known pull specs found in `replacements`.
    pub fn replace_pull_specs(&mut self, replacements: &Replacements) -> Result<(), ManifestError> {
        let specs = self.named_pull_specs()?;
        self.apply_replacements(splice_order(specs), replacements)
    }

    /// Rewrites annotation pull specs plus any pull-spec-looking text outside
    /// the top-level `metadata`.
    pub fn replace_pull_specs_everywhere(
        &mut self,
        replacements: &Replacements,
    ) -> Result<(), ManifestError> {
        let mut specs = self.annotation_specs(Some(KNOWN_ANNOTATION_KEYS))?;
        specs.extend(self.annotation_specs(None)?);
        scan_strings(
            &self.data,
            &Location::root(),
            true,
            self.heuristic,
            &mut specs,
        );

        self.apply_replacements(splice_order(specs), replacements)
    }

    /// Regenerates `spec.relatedImages` from the current named pull specs.
    ///
    /// Names must be unique per image. Every clash is collected before
    /// failing so they can all be fixed at once. Specs sharing an image get
    /// a single entry under the first name seen.
    pub fn set_related_images(&mut self) -> Result<(), ManifestError> {
        let specs = self.named_pull_specs()?;
        if specs.is_empty() {
            return Ok(());
        }

        let mut by_name: HashMap<String, (String, String)> = HashMap::new();
        let mut images = HashSet::new();
        let mut entries = Vec::new();
        let mut conflicts = Vec::new();

        for spec in &specs {
            let name = spec.name(&self.data)?;
            let image = spec.image(&self.data)?;

            match by_name.get(&name).cloned() {
                None => {
                    if images.insert(image.clone()) {
                        tracing::info!(
                            "{} - Set relatedImage {} (from {}): {}",
                            self.path.display(),
                            name,
                            spec.describe(&self.data),
                            image
                        );
                        entries.push(Value::Mapping(spec.as_related_image(&self.data)?));
                    }
                    by_name.insert(name, (spec.describe(&self.data), image));
                }
                Some((_, existing_image)) if existing_image == image => {}
                Some((existing, existing_image)) => conflicts.push(Conflict {
                    existing,
                    existing_image,
                    incoming: spec.describe(&self.data),
                    incoming_image: image,
                }),
            }
        }

        if let Some(conflicts) = NonEmpty::from_vec(conflicts) {
            return Err(ManifestError::Conflicts {
                path: self.path.clone(),
                conflicts,
            });
        }

        let root = self
            .data
            .as_mapping_mut()
            .ok_or_else(|| ManifestError::TypeMismatch {
                location: Location::root().to_string(),
                expected: "mapping",
            })?;
        let spec = root
            .entry(Value::from("spec"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if spec.is_null() {
            *spec = Value::Mapping(Mapping::new());
        }
        let spec = spec
            .as_mapping_mut()
            .ok_or_else(|| ManifestError::TypeMismatch {
                location: "spec".to_string(),
                expected: "mapping",
            })?;
        spec.insert(Value::from("relatedImages"), Value::Sequence(entries));

        Ok(())
    }

    fn apply_replacements(
        &mut self,
        specs: PullSpecs,
        replacements: &Replacements,
    ) -> Result<(), ManifestError> {
        for spec in specs {
            let current = spec.image(&self.data)?;
            let Ok(old) = ImageName::parse(&current) else {
                tracing::debug!(
                    "{} - Skipping unparseable pullspec {:?} for {}",
                    self.path.display(),
                    current,
                    spec.describe(&self.data)
                );
                continue;
            };

            let Some(new) = replacements.get(&old) else {
                continue;
            };
            if *new == old {
                continue;
            }

            tracing::info!(
                "{} - Replaced pullspec for {}: {} -> {}",
                self.path.display(),
                spec.describe(&self.data),
                old,
                new
            );
            spec.set_image(&mut self.data, &new.to_string())?;
        }

        Ok(())
    }

    fn named_pull_specs(&self) -> Result<PullSpecs, ManifestError> {
        let mut specs = self.related_image_specs()?;
        specs.extend(self.container_specs()?);
        specs.extend(self.init_container_specs()?);
        specs.extend(self.related_image_env_specs()?);
        specs.extend(self.annotation_specs(Some(KNOWN_ANNOTATION_KEYS))?);
        specs.extend(self.annotation_specs(None)?);
        Ok(specs)
    }

    fn related_image_specs(&self) -> Result<PullSpecs, ManifestError> {
        Ok(entries_at(&RELATED_IMAGES, Location::root(), &self.data)?
            .into_iter()
            .map(|entry| Box::new(RelatedImage::new(entry)) as Box<dyn NamedPullSpec>)
            .collect())
    }

    fn deployments(&self) -> Result<Vec<Location>, ManifestError> {
        entries_at(&DEPLOYMENTS, Location::root(), &self.data)
    }

    fn container_locations(&self, lens: &Lens) -> Result<Vec<Location>, ManifestError> {
        let mut containers = Vec::new();
        for deployment in self.deployments()? {
            if let Some(node) = deployment.resolve(&self.data) {
                containers.extend(entries_at(lens, deployment, node)?);
            }
        }
        Ok(containers)
    }

    fn container_specs(&self) -> Result<PullSpecs, ManifestError> {
        Ok(self
            .container_locations(&CONTAINERS)?
            .into_iter()
            .map(|entry| Box::new(Container::new(entry)) as Box<dyn NamedPullSpec>)
            .collect())
    }

    fn init_container_specs(&self) -> Result<PullSpecs, ManifestError> {
        Ok(self
            .container_locations(&INIT_CONTAINERS)?
            .into_iter()
            .map(|entry| Box::new(InitContainer::new(entry)) as Box<dyn NamedPullSpec>)
            .collect())
    }

    /// `RELATED_IMAGE_*` env vars of every container and init container.
    fn related_image_env_specs(&self) -> Result<PullSpecs, ManifestError> {
        let mut containers = self.container_locations(&CONTAINERS)?;
        containers.extend(self.container_locations(&INIT_CONTAINERS)?);

        let mut specs: PullSpecs = Vec::new();
        for container in containers {
            let Some(env) = container.resolve(&self.data).and_then(|c| c.get("env")) else {
                continue;
            };
            let env_location = container.key("env");
            let vars = env.as_sequence().ok_or_else(|| ManifestError::TypeMismatch {
                location: env_location.to_string(),
                expected: "sequence",
            })?;

            for (i, var) in vars.iter().enumerate() {
                let location = env_location.index(i);
                let var = var.as_mapping().ok_or_else(|| ManifestError::TypeMismatch {
                    location: location.to_string(),
                    expected: "mapping",
                })?;

                let Some(name) = var
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|name| name.starts_with(RELATED_IMAGE_PREFIX))
                else {
                    continue;
                };

                if var.contains_key("valueFrom") {
                    return Err(ManifestError::UnsupportedValueFrom {
                        name: name.to_string(),
                    });
                }

                specs.push(Box::new(RelatedImageEnv::new(location)));
            }
        }

        Ok(specs)
    }

    /// Heuristic matches inside annotation values, restricted to `keys` when
    /// given. The result lists later discoveries first.
    fn annotation_specs(&self, keys: Option<&[&str]>) -> Result<PullSpecs, ManifestError> {
        let mut specs: PullSpecs = Vec::new();

        for location in self.annotation_maps()? {
            let Some(annotations) = location.resolve(&self.data).and_then(Value::as_mapping) else {
                continue;
            };

            for (key, value) in annotations {
                let (Some(key), Some(text)) = (key.as_str(), value.as_str()) else {
                    continue;
                };
                if keys.is_some_and(|keys| !keys.contains(&key)) {
                    continue;
                }

                for span in (self.heuristic)(text) {
                    let field = LocatedField::new(location.clone(), Segment::key(key));
                    specs.push(Box::new(Annotation::new(field, span)));
                }
            }
        }

        specs.reverse();
        Ok(specs)
    }

    /// Locations of every annotation mapping: the manifest's own, the
    /// deployment templates', and any other `metadata.annotations` nested
    /// in the document.
    fn annotation_maps(&self) -> Result<Vec<Location>, ManifestError> {
        let mut maps = Vec::new();

        for lens in [&*CSV_ANNOTATIONS, &*DEPLOYMENT_ANNOTATIONS] {
            for located in optional(lens.locate(&self.data))? {
                if let Some(location) = annotation_location(located)? {
                    maps.push(location);
                }
            }
        }

        find_nested_annotations(&self.data, &Location::root(), false, &mut maps)?;
        Ok(maps)
    }
}

fn optional<T>(result: Result<Vec<T>, LensError>) -> Result<Vec<T>, LensError> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Runs `lens` from `origin` and returns the location of every element of
/// the sequence it reaches. A missing path yields nothing.
fn entries_at(lens: &Lens, origin: Location, node: &Value) -> Result<Vec<Location>, ManifestError> {
    let mut entries = Vec::new();

    for Located { location, value } in optional(lens.locate_at(origin, node))? {
        let seq = value
            .as_sequence()
            .ok_or_else(|| ManifestError::TypeMismatch {
                location: location.to_string(),
                expected: "sequence",
            })?;

        for (i, entry) in seq.iter().enumerate() {
            let entry_location = location.index(i);
            if !entry.is_mapping() {
                return Err(ManifestError::TypeMismatch {
                    location: entry_location.to_string(),
                    expected: "mapping",
                });
            }
            entries.push(entry_location);
        }
    }

    Ok(entries)
}

fn annotation_location(located: Located<'_>) -> Result<Option<Location>, ManifestError> {
    match located.value {
        Value::Null => Ok(None),
        Value::Mapping(_) => Ok(Some(located.location)),
        _ => Err(ManifestError::TypeMismatch {
            location: located.location.to_string(),
            expected: "mapping",
        }),
    }
}

/// Depth-first search for `metadata.annotations` mappings below `node`.
/// A `metadata` key directly inside a `metadata` mapping is not descended.
fn find_nested_annotations(
    node: &Value,
    location: &Location,
    under_metadata: bool,
    found: &mut Vec<Location>,
) -> Result<(), ManifestError> {
    let Some(map) = node.as_mapping() else {
        return Ok(());
    };

    if let Some(annotations) = map.get("metadata").and_then(|m| m.get("annotations")) {
        let located = Located {
            location: location.key("metadata").key("annotations"),
            value: annotations,
        };
        if let Some(annotations) = annotation_location(located)? {
            found.push(annotations);
        }
    }

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            continue;
        };
        let is_metadata = key == "metadata";
        if is_metadata && under_metadata {
            continue;
        }

        let child = location.key(key);
        match value {
            Value::Mapping(_) => find_nested_annotations(value, &child, is_metadata, found)?,
            Value::Sequence(seq) => {
                for (i, element) in seq.iter().enumerate() {
                    find_nested_annotations(element, &child.index(i), is_metadata, found)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Heuristic scan of every string in the tree. String values of mappings and
/// string elements of sequences are both considered. At the top level the
/// `metadata` subtree is skipped.
fn scan_strings(
    node: &Value,
    location: &Location,
    top_level: bool,
    heuristic: PullSpecHeuristic,
    found: &mut PullSpecs,
) {
    let children: Vec<(Segment, &Value)> = match node {
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|key| (Segment::key(key), value)))
            .filter(|(segment, _)| !(top_level && *segment == Segment::key("metadata")))
            .collect(),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, value)| (Segment::Index(i), value))
            .collect(),
        _ => return,
    };

    for (segment, value) in children {
        match value {
            Value::String(text) => {
                for span in heuristic(text) {
                    let field = LocatedField::new(location.clone(), segment.clone());
                    found.push(Box::new(Annotation::new(field, span)));
                }
            }
            Value::Mapping(_) | Value::Sequence(_) => {
                scan_strings(value, &location.child(segment), false, heuristic, found)
            }
            _ => {}
        }
    }
}

fn parse_image(
    spec: &dyn NamedPullSpec,
    doc: &Value,
    image: &str,
) -> Result<ImageName, ManifestError> {
    ImageName::parse(image).map_err(|source| ManifestError::InvalidImage {
        spec: spec.describe(doc),
        image: image.to_string(),
        source,
    })
}
