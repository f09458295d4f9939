//! External command processor invocation
//!
//! The engine talks to the command processor only through [`ProcessRunner`], so tests
//! can replace the real child process with a scripted fake.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// One child process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,

    /// Written to standard input, which is then closed
    pub stdin: String,

    /// Kill the child when it runs longer than this
    pub timeout: Option<Duration>,
}

/// Captured output of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Process runner errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Runs an invocation to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError>;
}

/// Runs the command processor as a local child process
#[derive(Debug, Clone, Default)]
pub struct ChildProcessRunner;

impl ChildProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for ChildProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError> {
        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            "Spawning command processor"
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunnerError::SpawnFailed(format!("{}: {}", invocation.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(invocation.stdin.as_bytes())
                .await
                .map_err(|e| RunnerError::IoError(e.to_string()))?;
            // Dropping stdin closes the stream so the tool sees end of input
        }

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match invocation.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result.map_err(|e| RunnerError::IoError(e.to_string()))?,
                Err(_) => return Err(RunnerError::Timeout(limit)),
            },
            None => child
                .wait_with_output()
                .await
                .map_err(|e| RunnerError::IoError(e.to_string()))?,
        };

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}
