// ABOUTME: Addresses of nodes inside an untyped manifest document.
// ABOUTME: A location is a list of mapping keys and sequence indices from the root.

use serde_yaml::Value;
use std::fmt;

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn key(key: impl Into<String>) -> Self {
        Segment::Key(key.into())
    }

    pub fn get<'a>(&self, node: &'a Value) -> Option<&'a Value> {
        match (self, node) {
            (Segment::Key(key), Value::Mapping(map)) => map.get(key.as_str()),
            (Segment::Index(index), Value::Sequence(seq)) => seq.get(*index),
            _ => None,
        }
    }

    pub fn get_mut<'a>(&self, node: &'a mut Value) -> Option<&'a mut Value> {
        match (self, node) {
            (Segment::Key(key), Value::Mapping(map)) => map.get_mut(key.as_str()),
            (Segment::Index(index), Value::Sequence(seq)) => seq.get_mut(*index),
            _ => None,
        }
    }
}

/// Path from the document root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(Vec<Segment>);

impl Location {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn key(&self, key: &str) -> Self {
        self.child(Segment::key(key))
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |node, segment| segment.get(node))
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        self.0
            .iter()
            .try_fold(root, |node, segment| segment.get_mut(node))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
