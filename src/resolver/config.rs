// ABOUTME: Resolver selection and settings, loadable from YAML or CLI arguments.
// ABOUTME: Builds the configured ImageResolver.

use super::error::{
    MissingPathSnafu, ParseConfigSnafu, ReadConfigSnafu, ResolveError, UnknownArgumentSnafu,
};
use super::skopeo::{DEFAULT_ATTEMPTS, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PROGRAM};
use super::{ImageResolver, ResolverKind, ScriptResolver, SkopeoResolver};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default)]
    pub kind: ResolverKind,

    /// Program to run. Required for `script`, defaults to `skopeo` otherwise.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub auth_file: Option<PathBuf>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: ResolverKind::default(),
            path: None,
            auth_file: None,
            command_timeout: default_command_timeout(),
            attempts: default_attempts(),
        }
    }
}

impl ResolverConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ResolveError> {
        serde_yaml::from_str(yaml).context(ParseConfigSnafu)
    }

    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        Self::from_yaml(&content)
    }

    /// Applies `key=value` resolver arguments. Known keys are `path` and
    /// `authFile`.
    pub fn apply_args<'a, I>(&mut self, args: I) -> Result<(), ResolveError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in args {
            match key {
                "path" => self.path = Some(PathBuf::from(value)),
                "authFile" => self.auth_file = Some(PathBuf::from(value)),
                _ => return UnknownArgumentSnafu { key }.fail(),
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn ImageResolver>, ResolveError> {
        match self.kind {
            ResolverKind::Skopeo => {
                let program = self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
                tracing::debug!("Using skopeo at {}", program.display());

                let resolver = SkopeoResolver::new(program, self.auth_file.clone())?
                    .with_command_timeout(self.command_timeout)
                    .with_attempts(self.attempts);
                Ok(Box::new(resolver))
            }
            ResolverKind::Script => {
                let path = self.path.clone().context(MissingPathSnafu { kind: self.kind })?;
                tracing::debug!("Using resolver script {}", path.display());
                Ok(Box::new(ScriptResolver::new(path)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveErrorKind;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = ResolverConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.command_timeout, Duration::from_secs(300));
        assert_eq!(config.attempts, 3);
    }

    #[test]
    fn parses_humantime_timeout() {
        let config = ResolverConfig::from_yaml(
            "kind: script\npath: /usr/local/bin/resolve\ncommandTimeout: 1m 30s\n",
        )
        .unwrap();
        assert_eq!(config.kind, ResolverKind::Script);
        assert_eq!(config.command_timeout, Duration::from_secs(90));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = ResolverConfig::from_yaml("kind: skopeo\nretries: 4\n").unwrap_err();
        assert_eq!(err.kind(), ResolveErrorKind::Configuration);
    }

    #[test]
    fn args_override_fields() {
        let mut config = ResolverConfig::default();
        config
            .apply_args([("path", "/opt/skopeo"), ("authFile", "/tmp/auth.json")])
            .unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/opt/skopeo")));
        assert_eq!(config.auth_file, Some(PathBuf::from("/tmp/auth.json")));

        assert!(matches!(
            config.apply_args([("bogus", "1")]),
            Err(ResolveError::UnknownArgument { .. })
        ));
    }

    #[test]
    fn script_requires_path() {
        let config = ResolverConfig {
            kind: ResolverKind::Script,
            ..ResolverConfig::default()
        };
        assert!(matches!(
            config.build(),
            Err(ResolveError::MissingPath { .. })
        ));
    }
}
