// ABOUTME: File-or-stdio endpoints for the JSON documents the CLI reads and writes.
// ABOUTME: A path of "-" means stdin for sources and stdout for destinations.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const STDIO: &str = "-";

/// Where a JSON document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    pub fn new(path: &Path) -> Self {
        if path.as_os_str() == STDIO {
            Source::Stdin
        } else {
            Source::File(path.to_path_buf())
        }
    }

    pub fn name(&self) -> String {
        match self {
            Source::Stdin => "<stdin>".to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }

    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T> {
        let content = match self {
            Source::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).map(|_| buf)
            }
            Source::File(path) => std::fs::read_to_string(path),
        }
        .map_err(|source| Error::Io {
            name: self.name(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| Error::Json {
            name: self.name(),
            source,
        })
    }
}

/// Where a JSON document is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn new(path: &Path) -> Self {
        if path.as_os_str() == STDIO {
            Destination::Stdout
        } else {
            Destination::File(path.to_path_buf())
        }
    }

    pub fn name(&self) -> String {
        match self {
            Destination::Stdout => "<stdout>".to_string(),
            Destination::File(path) => path.display().to_string(),
        }
    }

    /// Pretty-prints `value` with a trailing newline, replacing any existing
    /// file.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut json = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
            name: self.name(),
            source,
        })?;
        json.push('\n');

        let written = match self {
            Destination::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(json.as_bytes())
                    .and_then(|()| stdout.flush())
            }
            Destination::File(path) => std::fs::write(path, json),
        };
        written.map_err(|source| Error::Io {
            name: self.name(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdio() {
        assert_eq!(Source::new(Path::new("-")), Source::Stdin);
        assert_eq!(Destination::new(Path::new("-")), Destination::Stdout);
        assert_eq!(
            Destination::new(Path::new("out.json")),
            Destination::File(PathBuf::from("out.json"))
        );
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.json");

        Destination::new(&path)
            .write_json(&["a.io/b:1", "c.io/d:2"])
            .unwrap();
        let back: Vec<String> = Source::new(&path).read_json().unwrap();
        assert_eq!(back, vec!["a.io/b:1", "c.io/d:2"]);
    }

    #[test]
    fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = Source::new(&path).read_json::<Vec<String>>().unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
