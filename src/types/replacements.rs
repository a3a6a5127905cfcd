// ABOUTME: Validated old-to-new pull spec mapping used when rewriting manifests.
// ABOUTME: Built from the string map produced by resolution.

use super::image_name::{ImageName, ImageNameError};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements(HashMap<ImageName, ImageName>);

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses both sides of every entry. The first invalid reference fails
    /// the whole mapping.
    pub fn from_strings<'a, I>(entries: I) -> Result<Self, ImageNameError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        entries
            .into_iter()
            .map(|(old, new)| -> Result<_, ImageNameError> {
                Ok((ImageName::parse(old)?, ImageName::parse(new)?))
            })
            .collect()
    }

    pub fn get(&self, old: &ImageName) -> Option<&ImageName> {
        self.0.get(old)
    }

    pub fn insert(&mut self, old: ImageName, new: ImageName) -> Option<ImageName> {
        self.0.insert(old, new)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImageName, &ImageName)> {
        self.0.iter()
    }

    /// String form with sorted keys, as written to replacement files.
    pub fn to_strings(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect()
    }
}

impl FromIterator<(ImageName, ImageName)> for Replacements {
    fn from_iter<T: IntoIterator<Item = (ImageName, ImageName)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
