// ABOUTME: Resolves tags to digests by inspecting the registry with skopeo.
// ABOUTME: Hashes raw v2 manifests locally, falls back to skopeo's reported digest.

use super::command::{CommandOutput, CommandRunner, TokioRunner};
use super::error::{
    AuthFileSnafu, CommandFailedSnafu, InvalidResponseSnafu, MissingDigestSnafu, ResolveError,
    SpawnSnafu,
};
use super::{ImageResolver, image_name_of};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use snafu::{OptionExt, ResultExt, ensure};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PROGRAM: &str = "skopeo";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_ATTEMPTS: u32 = 3;

pub struct SkopeoResolver {
    program: PathBuf,
    auth_file: Option<PathBuf>,
    command_timeout: Duration,
    attempts: u32,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for SkopeoResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkopeoResolver")
            .field("program", &self.program)
            .field("auth_file", &self.auth_file)
            .field("command_timeout", &self.command_timeout)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl SkopeoResolver {
    /// Fails when `auth_file` is given but cannot be accessed.
    pub fn new(
        program: impl Into<PathBuf>,
        auth_file: Option<PathBuf>,
    ) -> Result<Self, ResolveError> {
        if let Some(path) = &auth_file {
            std::fs::metadata(path).context(AuthFileSnafu { path: path.clone() })?;
        }

        Ok(Self {
            program: program.into(),
            auth_file,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
            runner: Arc::new(TokioRunner),
        })
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Total number of inspection attempts, including the first.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn inspect_args(&self, reference: &str) -> Vec<String> {
        let mut args = vec![
            "--command-timeout".to_string(),
            // skopeo takes whole seconds and treats 0 as no timeout
            format!("{}s", self.command_timeout.as_secs().max(1)),
            "inspect".to_string(),
            format!("docker://{reference}"),
        ];
        if let Some(auth_file) = &self.auth_file {
            args.push("--authfile".to_string());
            args.push(auth_file.display().to_string());
        }
        args
    }

    async fn inspect(
        &self,
        reference: &str,
        args: &[String],
    ) -> Result<(CommandOutput, serde_json::Value), ResolveError> {
        let output = self
            .runner
            .run(&self.program, args)
            .await
            .context(SpawnSnafu {
                program: self.program.clone(),
            })?;

        ensure!(
            output.success,
            CommandFailedSnafu {
                program: self.program.clone(),
                reference,
                status: output.status.clone(),
                output: output.combined(),
            }
        );

        let json = serde_json::from_slice(&output.stdout).context(InvalidResponseSnafu { reference })?;
        Ok((output, json))
    }

    async fn inspect_digest(&self, reference: &str) -> Result<String, ResolveError> {
        let name = image_name_of(reference);
        let args = self.inspect_args(reference);

        let mut raw_args = args.clone();
        raw_args.push("--raw".to_string());
        tracing::debug!("skopeo inspect raw args are {:?}", raw_args);

        let (raw, manifest) = self.inspect(reference, &raw_args).await?;
        if manifest.get("schemaVersion").and_then(serde_json::Value::as_f64) == Some(2.0) {
            let digest = hex::encode(Sha256::digest(&raw.stdout));
            return Ok(format!("{name}@sha256:{digest}"));
        }

        tracing::debug!("skopeo inspect args are {:?}", args);
        let (_, inspected) = self.inspect(reference, &args).await?;
        let digest = inspected
            .get("Digest")
            .and_then(serde_json::Value::as_str)
            .context(MissingDigestSnafu { reference })?;

        Ok(format!("{name}@{digest}"))
    }
}

#[async_trait]
impl ImageResolver for SkopeoResolver {
    async fn resolve_image_reference(&self, reference: &str) -> Result<String, ResolveError> {
        let mut attempt = 1;

        loop {
            match self.inspect_digest(reference).await {
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    tracing::warn!(
                        "Inspecting {} failed (attempt {}/{}): {}",
                        reference,
                        attempt,
                        self.attempts,
                        e
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::Path;

    /// Replays canned outputs in order and records every invocation.
    #[derive(Default)]
    struct ScriptedRunner {
        responses: Mutex<Vec<std::io::Result<CommandOutput>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<std::io::Result<CommandOutput>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
            self.calls.lock().push(args.to_vec());
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(std::io::Error::other("no scripted response left")))
        }
    }

    fn ok(stdout: &str) -> std::io::Result<CommandOutput> {
        Ok(CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }

    fn failed(stderr: &str) -> std::io::Result<CommandOutput> {
        Ok(CommandOutput {
            success: false,
            status: "exit status: 1".to_string(),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    fn resolver(runner: Arc<ScriptedRunner>) -> SkopeoResolver {
        SkopeoResolver::new("skopeo", None).unwrap().with_runner(runner)
    }

    const RAW_V2: &str = r#"{"schemaVersion": 2, "mediaType": "application/vnd.docker.distribution.manifest.v2+json"}"#;

    #[tokio::test]
    async fn v2_manifest_is_hashed_locally() {
        let runner = ScriptedRunner::new(vec![ok(RAW_V2)]);
        let resolved = resolver(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap();

        let digest = hex::encode(Sha256::digest(RAW_V2.as_bytes()));
        assert_eq!(resolved, format!("registry.io/app@sha256:{digest}"));
        assert_eq!(
            runner.calls(),
            vec![vec![
                "--command-timeout",
                "300s",
                "inspect",
                "docker://registry.io/app:1",
                "--raw"
            ]]
        );
    }

    #[tokio::test]
    async fn v1_manifest_uses_reported_digest() {
        let runner = ScriptedRunner::new(vec![
            ok(r#"{"schemaVersion": 1}"#),
            ok(r#"{"Digest": "sha256:abcdef"}"#),
        ]);
        let resolved = resolver(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap();

        assert_eq!(resolved, "registry.io/app@sha256:abcdef");
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].last().map(String::as_str), Some("docker://registry.io/app:1"));
    }

    #[tokio::test]
    async fn missing_digest_is_not_retried() {
        let runner = ScriptedRunner::new(vec![ok(r#"{"schemaVersion": 1}"#), ok("{}")]);
        let err = resolver(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::MissingDigest { .. }));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let runner = ScriptedRunner::new(vec![failed("timeout"), ok(RAW_V2)]);
        let resolved = resolver(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap();

        assert!(resolved.starts_with("registry.io/app@sha256:"));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let runner = ScriptedRunner::new(vec![failed("one"), failed("two"), ok("not json")]);
        let err = resolver(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::InvalidResponse { .. }));
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn sub_second_timeout_rounds_up_to_one_second() {
        let resolver = SkopeoResolver::new("skopeo", None)
            .unwrap()
            .with_command_timeout(Duration::from_millis(500));

        let args = resolver.inspect_args("registry.io/app:1");
        assert_eq!(args[..2], ["--command-timeout", "1s"]);
    }

    #[tokio::test]
    async fn auth_file_is_passed_through() {
        let auth = tempfile::NamedTempFile::new().unwrap();
        let runner = ScriptedRunner::new(vec![ok(RAW_V2)]);
        SkopeoResolver::new("skopeo", Some(auth.path().to_path_buf()))
            .unwrap()
            .with_runner(runner.clone())
            .resolve_image_reference("registry.io/app:1")
            .await
            .unwrap();

        let calls = runner.calls();
        let args = &calls[0];
        let flag = args.iter().position(|a| a == "--authfile").unwrap();
        assert_eq!(args[flag + 1], auth.path().display().to_string());
    }

    #[test]
    fn missing_auth_file_is_rejected() {
        let err = SkopeoResolver::new("skopeo", Some(PathBuf::from("/nonexistent/auth.json")))
            .unwrap_err();
        assert!(matches!(err, ResolveError::AuthFile { .. }));
    }
}
