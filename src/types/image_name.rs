// ABOUTME: Container image pull spec parsing, formatting and re-namespacing.
// ABOUTME: Handles registry/namespace/repo:tag and repo@sha256:digest forms.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_TAG: &str = "latest";
const DIGEST_PREFIX: &str = "sha256:";
const EXPLICIT_NAMESPACE: &str = "library";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageNameError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("no image repository specified")]
    NoRepository,

    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidFormat { reference: String, reason: &'static str },
}

/// Set of formatting switches for [`ImageName::to_string_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatOptions(u8);

impl FormatOptions {
    pub const NONE: Self = Self(0);
    /// Include the registry, when there is one.
    pub const REGISTRY: Self = Self(1);
    /// Include the tag or digest.
    pub const TAG: Self = Self(1 << 1);
    /// Emit `:latest` when the tag is empty.
    pub const EXPLICIT_TAG: Self = Self(1 << 2);
    /// Prefix the repository path with `library/`.
    pub const EXPLICIT_NAMESPACE: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FormatOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A parsed pull spec.
///
/// Equality and hashing are structural over all four components, which makes
/// `ImageName` usable as a key for deduplication and replacement lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageName {
    registry: Option<String>,
    namespace: Option<String>,
    repo: String,
    tag: String,
}

impl ImageName {
    pub fn new(
        registry: Option<&str>,
        namespace: Option<&str>,
        repo: &str,
        tag: &str,
    ) -> Result<Self, ImageNameError> {
        if repo.is_empty() {
            return Err(ImageNameError::NoRepository);
        }

        Ok(Self {
            registry: registry.filter(|r| !r.is_empty()).map(str::to_string),
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            repo: repo.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn parse(input: &str) -> Result<Self, ImageNameError> {
        if input.is_empty() {
            return Err(ImageNameError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(invalid(input, "contains whitespace"));
        }

        let parts: Vec<&str> = input.splitn(3, '/').collect();
        let (registry, namespace, last) = match parts.as_slice() {
            [last] => (None, None, *last),
            [first, last] if first.contains(['.', ':']) => (Some(*first), None, *last),
            [first, last] => (None, Some(*first), *last),
            [registry, namespace, last] => (Some(*registry), Some(*namespace), *last),
            _ => return Err(invalid(input, "malformed path")),
        };

        // A digest wins over a tag: "repo@sha256:abc" must not split on ':'.
        let (repo, tag) = match last.split_once('@').or_else(|| last.split_once(':')) {
            Some((_, "")) => return Err(invalid(input, "empty tag")),
            Some((repo, tag)) => (repo, tag),
            None => (last, DEFAULT_TAG),
        };

        if repo.is_empty() {
            return Err(ImageNameError::NoRepository);
        }

        Self::new(registry, namespace, repo, tag)
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_digest(&self) -> bool {
        self.tag.starts_with(DIGEST_PREFIX)
    }

    /// `namespace/repo`, optionally prefixed with `library/`.
    pub fn repo_path(&self, options: FormatOptions) -> String {
        let mut path = match &self.namespace {
            Some(namespace) => format!("{namespace}/{}", self.repo),
            None => self.repo.clone(),
        };

        if options.contains(FormatOptions::EXPLICIT_NAMESPACE) {
            path = format!("{EXPLICIT_NAMESPACE}/{path}");
        }

        path
    }

    pub fn to_string_with(&self, options: FormatOptions) -> Result<String, ImageNameError> {
        if self.repo.is_empty() {
            return Err(ImageNameError::NoRepository);
        }

        let mut out = String::new();

        if options.contains(FormatOptions::REGISTRY)
            && let Some(registry) = &self.registry
        {
            out.push_str(registry);
            out.push('/');
        }

        out.push_str(&self.repo_path(options));

        if options.contains(FormatOptions::TAG) {
            if !self.tag.is_empty() {
                out.push(if self.has_digest() { '@' } else { ':' });
                out.push_str(&self.tag);
            } else if options.contains(FormatOptions::EXPLICIT_TAG) {
                out.push(':');
                out.push_str(DEFAULT_TAG);
            }
        }

        Ok(out)
    }

    /// Move the image under `organization`, folding any existing namespace
    /// into the repository name so images from different namespaces cannot
    /// collide.
    pub fn enclose(&mut self, organization: &str) {
        if self.namespace.as_deref() == Some(organization) {
            return;
        }

        if let Some(namespace) = self.namespace.take() {
            self.repo = format!("{namespace}-{}", self.repo);
        }
        self.namespace = Some(organization.to_string());
    }
}

fn invalid(reference: &str, reason: &'static str) -> ImageNameError {
    ImageNameError::InvalidFormat {
        reference: reference.to_string(),
        reason,
    }
}

impl FromStr for ImageName {
    type Err = ImageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Constructors guarantee a repository, so formatting cannot fail.
        let formatted = self
            .to_string_with(FormatOptions::REGISTRY | FormatOptions::TAG)
            .map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}
