// ABOUTME: Seam between resolvers and the external programs they run.
// ABOUTME: The default runner spawns the program with tokio::process.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Captured result of one program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// stdout followed by stderr, for error messages.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text.trim().to_string()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs programs as child processes and waits for them to exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output().await?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
