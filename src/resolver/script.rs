// ABOUTME: Resolves references by delegating to a user-provided executable.
// ABOUTME: The script prints the bare sha256 digest for the reference it is given.

use super::command::{CommandRunner, TokioRunner};
use super::error::{CommandFailedSnafu, MissingDigestSnafu, ResolveError, SpawnSnafu};
use super::{ImageResolver, image_name_of};
use async_trait::async_trait;
use snafu::{ResultExt, ensure};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ScriptResolver {
    path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for ScriptResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptResolver")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ScriptResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            runner: Arc::new(TokioRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageResolver for ScriptResolver {
    async fn resolve_image_reference(&self, reference: &str) -> Result<String, ResolveError> {
        tracing::debug!("Running {} {}", self.path.display(), reference);

        let output = self
            .runner
            .run(&self.path, &[reference.to_string()])
            .await
            .context(SpawnSnafu {
                program: self.path.clone(),
            })?;

        ensure!(
            output.success,
            CommandFailedSnafu {
                program: self.path.clone(),
                reference,
                status: output.status.clone(),
                output: output.combined(),
            }
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let digest = stdout.trim();
        ensure!(!digest.is_empty(), MissingDigestSnafu { reference });

        Ok(format!("{}@sha256:{}", image_name_of(reference), digest))
    }
}
