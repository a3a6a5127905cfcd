// ABOUTME: Named pull spec views over locations inside a manifest document.
// ABOUTME: Containers, init containers, related images, env vars and annotation spans.

use super::error::ManifestError;
use super::location::{Location, Segment};
use crate::types::ImageName;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

pub const RELATED_IMAGE_PREFIX: &str = "RELATED_IMAGE_";

/// A single field of the document, addressed by its parent node and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocatedField {
    parent: Location,
    key: Segment,
}

impl LocatedField {
    pub fn new(parent: Location, key: Segment) -> Self {
        Self { parent, key }
    }

    pub fn parent(&self) -> &Location {
        &self.parent
    }

    pub fn location(&self) -> Location {
        self.parent.child(self.key.clone())
    }

    pub fn get<'a>(&self, doc: &'a Value) -> Result<&'a Value, ManifestError> {
        self.parent
            .resolve(doc)
            .and_then(|parent| self.key.get(parent))
            .ok_or_else(|| ManifestError::MissingField {
                location: self.location().to_string(),
            })
    }

    pub fn get_str<'a>(&self, doc: &'a Value) -> Result<&'a str, ManifestError> {
        self.get(doc)?
            .as_str()
            .ok_or_else(|| ManifestError::TypeMismatch {
                location: self.location().to_string(),
                expected: "string",
            })
    }

    pub fn set_str(&self, doc: &mut Value, text: &str) -> Result<(), ManifestError> {
        let slot = self
            .parent
            .resolve_mut(doc)
            .and_then(|parent| self.key.get_mut(parent))
            .ok_or_else(|| ManifestError::MissingField {
                location: self.location().to_string(),
            })?;
        *slot = Value::String(text.to_string());
        Ok(())
    }

    /// A string field next to this one, e.g. the `name` beside an `image`.
    pub fn sibling_str<'a>(&self, doc: &'a Value, key: &str) -> Result<&'a str, ManifestError> {
        LocatedField::new(self.parent.clone(), Segment::key(key)).get_str(doc)
    }
}

/// A pull spec found at a known or guessed place in a manifest.
///
/// Implementations hold only an address; the document owns the data and is
/// passed in on every call.
pub trait NamedPullSpec: fmt::Debug {
    /// Short label for logs, e.g. `container`.
    fn kind(&self) -> &'static str;

    /// The string field holding the image.
    fn field(&self) -> &LocatedField;

    /// The byte range of the image within the field, when the image is only
    /// part of the string.
    fn span(&self) -> Option<Range<usize>> {
        None
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError>;

    fn image(&self, doc: &Value) -> Result<String, ManifestError> {
        self.field().get_str(doc).map(str::to_string)
    }

    fn set_image(&self, doc: &mut Value, image: &str) -> Result<(), ManifestError> {
        self.field().set_str(doc, image)
    }

    /// The minimal `{name, image}` entry for `spec.relatedImages`.
    fn as_related_image(&self, doc: &Value) -> Result<Mapping, ManifestError> {
        let mut entry = Mapping::new();
        entry.insert(Value::from("name"), Value::from(self.name(doc)?));
        entry.insert(Value::from("image"), Value::from(self.image(doc)?));
        Ok(entry)
    }

    fn describe(&self, doc: &Value) -> String {
        match self.name(doc) {
            Ok(name) => format!("{} {}", self.kind(), name),
            Err(_) => format!("{} at {}", self.kind(), self.field().location()),
        }
    }
}

fn entry_name(field: &LocatedField, doc: &Value) -> Result<String, ManifestError> {
    Ok(field.sibling_str(doc, "name")?.trim().to_string())
}

/// `image` of an entry under `spec.template.spec.containers`.
#[derive(Debug, Clone)]
pub struct Container {
    field: LocatedField,
}

impl Container {
    pub fn new(entry: Location) -> Self {
        Self {
            field: LocatedField::new(entry, Segment::key("image")),
        }
    }
}

impl NamedPullSpec for Container {
    fn kind(&self) -> &'static str {
        "container"
    }

    fn field(&self) -> &LocatedField {
        &self.field
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError> {
        entry_name(&self.field, doc)
    }
}

/// `image` of an entry under `spec.template.spec.initContainers`.
#[derive(Debug, Clone)]
pub struct InitContainer {
    field: LocatedField,
}

impl InitContainer {
    pub fn new(entry: Location) -> Self {
        Self {
            field: LocatedField::new(entry, Segment::key("image")),
        }
    }
}

impl NamedPullSpec for InitContainer {
    fn kind(&self) -> &'static str {
        "initcontainer"
    }

    fn field(&self) -> &LocatedField {
        &self.field
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError> {
        entry_name(&self.field, doc)
    }
}

/// `image` of an entry under `spec.relatedImages`.
#[derive(Debug, Clone)]
pub struct RelatedImage {
    field: LocatedField,
}

impl RelatedImage {
    pub fn new(entry: Location) -> Self {
        Self {
            field: LocatedField::new(entry, Segment::key("image")),
        }
    }
}

impl NamedPullSpec for RelatedImage {
    fn kind(&self) -> &'static str {
        "relatedImage"
    }

    fn field(&self) -> &LocatedField {
        &self.field
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError> {
        entry_name(&self.field, doc)
    }
}

/// `value` of a `RELATED_IMAGE_*` environment variable. Its name is the
/// variable name without the prefix, lower-cased.
#[derive(Debug, Clone)]
pub struct RelatedImageEnv {
    field: LocatedField,
}

impl RelatedImageEnv {
    pub fn new(entry: Location) -> Self {
        Self {
            field: LocatedField::new(entry, Segment::key("value")),
        }
    }
}

impl NamedPullSpec for RelatedImageEnv {
    fn kind(&self) -> &'static str {
        "env var"
    }

    fn field(&self) -> &LocatedField {
        &self.field
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError> {
        let var = self.field.sibling_str(doc, "name")?;
        let stripped = var.strip_prefix(RELATED_IMAGE_PREFIX).unwrap_or(var);
        Ok(stripped.to_lowercase().trim().to_string())
    }
}

/// A pull spec embedded in a larger string, addressed by byte range.
///
/// Setting the image splices the range in place. Rewriting a span shifts
/// every span to its right in the same string, so spans of one string must
/// be rewritten right to left; see [`splice_order`].
#[derive(Debug, Clone)]
pub struct Annotation {
    field: LocatedField,
    span: Range<usize>,
}

impl Annotation {
    pub fn new(field: LocatedField, span: Range<usize>) -> Self {
        Self { field, span }
    }

    fn stale(&self) -> ManifestError {
        ManifestError::StaleSpan {
            location: self.field.location().to_string(),
            start: self.span.start,
            end: self.span.end,
        }
    }
}

impl NamedPullSpec for Annotation {
    fn kind(&self) -> &'static str {
        "annotation"
    }

    fn field(&self) -> &LocatedField {
        &self.field
    }

    fn span(&self) -> Option<Range<usize>> {
        Some(self.span.clone())
    }

    fn name(&self, doc: &Value) -> Result<String, ManifestError> {
        let image = self.image(doc)?;
        let parsed = ImageName::parse(&image).map_err(|source| ManifestError::InvalidImage {
            spec: format!("annotation at {}", self.field.location()),
            image: image.clone(),
            source,
        })?;
        let tag = parsed.tag();
        let tag = tag.strip_prefix("sha256:").unwrap_or(tag);
        Ok(format!(
            "{}-{}-annotation",
            parsed.registry().unwrap_or_default(),
            tag
        ))
    }

    fn image(&self, doc: &Value) -> Result<String, ManifestError> {
        self.field
            .get_str(doc)?
            .get(self.span.clone())
            .map(str::to_string)
            .ok_or_else(|| self.stale())
    }

    fn set_image(&self, doc: &mut Value, image: &str) -> Result<(), ManifestError> {
        let text = self.field.get_str(doc)?;
        let (Some(before), Some(after)) = (text.get(..self.span.start), text.get(self.span.end..))
        else {
            return Err(self.stale());
        };
        let spliced = format!("{before}{image}{after}");
        self.field.set_str(doc, &spliced)
    }
}

/// Prepares pull specs for in-place rewriting.
///
/// Specs addressing the same field and span are kept once, and spans within
/// one string are ordered right to left so that rewriting one never moves
/// the bytes of another that is still pending.
pub fn splice_order(specs: Vec<Box<dyn NamedPullSpec>>) -> Vec<Box<dyn NamedPullSpec>> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<_> = specs
        .into_iter()
        .filter(|spec| seen.insert((spec.field().clone(), spec.span())))
        .collect();

    ordered.sort_by(|a, b| {
        a.field()
            .cmp(b.field())
            .then_with(|| span_start(b.as_ref()).cmp(&span_start(a.as_ref())))
    });
    ordered
}

fn span_start(spec: &dyn NamedPullSpec) -> usize {
    spec.span().map_or(0, |span| span.start)
}
