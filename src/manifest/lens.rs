// ABOUTME: Composable read-only accessors over untyped YAML/JSON trees.
// ABOUTME: A lens is a sealed pipeline of key, index and apply steps.

use super::location::{Location, Segment};
use serde_yaml::{Mapping, Value};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LensError {
    /// A step found nothing: missing key, index out of range, or a node of
    /// the wrong shape for the step.
    #[error("not found on step {step} of path {path}")]
    NotFound { path: String, step: String },

    /// The lookup succeeded but the result could not be coerced.
    #[error("expected a {expected} at path {path}")]
    TypeMismatch { path: String, expected: &'static str },
}

impl LensError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LensError::NotFound { .. })
    }
}

#[derive(Debug, Clone)]
enum Step {
    Key(String),
    Index(i64),
    Apply(Lens),
}

impl Step {
    fn label(&self) -> String {
        match self {
            Step::Key(key) => key.clone(),
            Step::Index(index) => index.to_string(),
            Step::Apply(_) => "*".to_string(),
        }
    }
}

/// Incrementally assembles a [`Lens`].
///
/// ```
/// use manifest_pin::manifest::Lens;
///
/// let containers = Lens::builder()
///     .key("spec")
///     .key("template")
///     .key("spec")
///     .key("containers")
///     .build();
/// # let _ = containers;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LensBuilder {
    steps: Vec<Step>,
}

impl LensBuilder {
    /// Expect a mapping and descend into `key`.
    pub fn key(mut self, key: &str) -> Self {
        self.steps.push(Step::Key(key.to_string()));
        self
    }

    /// Expect a sequence and descend into element `index`. Negative indices
    /// never match.
    pub fn index(mut self, index: i64) -> Self {
        self.steps.push(Step::Index(index));
        self
    }

    /// Expect a sequence and run `lens` on every element, keeping the
    /// elements where it succeeds.
    pub fn apply(mut self, lens: Lens) -> Self {
        self.steps.push(Step::Apply(lens));
        self
    }

    pub fn build(self) -> Lens {
        Lens {
            steps: self.steps.into(),
        }
    }
}

/// A node reached by [`Lens::locate`], together with its address.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub location: Location,
    pub value: &'a Value,
}

/// Immutable, shareable path accessor.
#[derive(Debug, Clone)]
pub struct Lens {
    steps: Arc<[Step]>,
}

impl Lens {
    pub fn builder() -> LensBuilder {
        LensBuilder::default()
    }

    /// Dotted rendering of the pipeline, used in error messages.
    pub fn path(&self) -> String {
        self.steps
            .iter()
            .map(Step::label)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn lookup<'a>(&self, root: &'a Value) -> Result<Cow<'a, Value>, LensError> {
        let mut current = Cow::Borrowed(root);

        for step in self.steps.iter() {
            current = match current {
                Cow::Borrowed(value) => self.step(step, value)?,
                Cow::Owned(value) => Cow::Owned(self.step(step, &value)?.into_owned()),
            };
        }

        Ok(current)
    }

    pub fn list<'a>(&self, root: &'a Value) -> Result<Cow<'a, [Value]>, LensError> {
        match self.lookup(root)? {
            Cow::Borrowed(Value::Sequence(seq)) => Ok(Cow::Borrowed(seq.as_slice())),
            Cow::Owned(Value::Sequence(seq)) => Ok(Cow::Owned(seq)),
            _ => Err(self.type_mismatch("sequence")),
        }
    }

    pub fn map<'a>(&self, root: &'a Value) -> Result<Cow<'a, Mapping>, LensError> {
        match self.lookup(root)? {
            Cow::Borrowed(Value::Mapping(map)) => Ok(Cow::Borrowed(map)),
            Cow::Owned(Value::Mapping(map)) => Ok(Cow::Owned(map)),
            _ => Err(self.type_mismatch("mapping")),
        }
    }

    /// Run the lens from the document root and return every node it reaches
    /// along with its location.
    pub fn locate<'a>(&self, root: &'a Value) -> Result<Vec<Located<'a>>, LensError> {
        self.locate_at(Location::root(), root)
    }

    /// Like [`Lens::locate`], starting from a node already known to live at
    /// `origin`.
    ///
    /// An `apply` step fans out: each surviving element becomes its own
    /// endpoint and later steps run once per endpoint, dropping the ones
    /// they fail on. Before the first fan-out a failing step is an error,
    /// exactly as in [`Lens::lookup`].
    pub fn locate_at<'a>(
        &self,
        origin: Location,
        node: &'a Value,
    ) -> Result<Vec<Located<'a>>, LensError> {
        let mut frontier = vec![Located {
            location: origin,
            value: node,
        }];
        let mut fanned_out = false;

        for step in self.steps.iter() {
            let mut next = Vec::with_capacity(frontier.len());

            for located in frontier {
                match self.locate_step(step, located) {
                    Ok(reached) => next.extend(reached),
                    Err(_) if fanned_out => continue,
                    Err(e) => return Err(e),
                }
            }

            if matches!(step, Step::Apply(_)) {
                fanned_out = true;
            }
            frontier = next;
        }

        Ok(frontier)
    }

    fn step<'v>(&self, step: &Step, value: &'v Value) -> Result<Cow<'v, Value>, LensError> {
        match step {
            Step::Key(key) => value
                .as_mapping()
                .and_then(|map| map.get(key.as_str()))
                .map(Cow::Borrowed)
                .ok_or_else(|| self.not_found(step)),
            Step::Index(index) => {
                let seq = value.as_sequence().ok_or_else(|| self.not_found(step))?;
                usize::try_from(*index)
                    .ok()
                    .and_then(|i| seq.get(i))
                    .map(Cow::Borrowed)
                    .ok_or_else(|| self.not_found(step))
            }
            Step::Apply(lens) => {
                let seq = value.as_sequence().ok_or_else(|| self.not_found(step))?;
                let results = seq
                    .iter()
                    .filter_map(|element| lens.lookup(element).ok())
                    .filter(|result| !result.is_null())
                    .map(Cow::into_owned)
                    .collect();
                Ok(Cow::Owned(Value::Sequence(results)))
            }
        }
    }

    fn locate_step<'a>(
        &self,
        step: &Step,
        located: Located<'a>,
    ) -> Result<Vec<Located<'a>>, LensError> {
        let Located { location, value } = located;

        match step {
            Step::Key(key) => {
                let child = self.step(step, value)?;
                match child {
                    Cow::Borrowed(child) => Ok(vec![Located {
                        location: location.child(Segment::Key(key.clone())),
                        value: child,
                    }]),
                    Cow::Owned(_) => Err(self.not_found(step)),
                }
            }
            Step::Index(index) => {
                let child = self.step(step, value)?;
                match (child, usize::try_from(*index)) {
                    (Cow::Borrowed(child), Ok(index)) => Ok(vec![Located {
                        location: location.index(index),
                        value: child,
                    }]),
                    _ => Err(self.not_found(step)),
                }
            }
            Step::Apply(lens) => {
                let seq = value.as_sequence().ok_or_else(|| self.not_found(step))?;
                Ok(seq
                    .iter()
                    .enumerate()
                    .filter_map(|(i, element)| lens.locate_at(location.index(i), element).ok())
                    .flatten()
                    .filter(|reached| !reached.value.is_null())
                    .collect())
            }
        }
    }

    fn not_found(&self, step: &Step) -> LensError {
        LensError::NotFound {
            path: self.path(),
            step: step.label(),
        }
    }

    fn type_mismatch(&self, expected: &'static str) -> LensError {
        LensError::TypeMismatch {
            path: self.path(),
            expected,
        }
    }
}
