//! Execution engine: one script against one target

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::deploy::runner::{Invocation, ProcessRunner, RunnerError};
use crate::deploy::signatures::Signatures;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::result::{ExecutionResult, Outcome};
use crate::models::target::ConnectionDescriptor;

/// Stamps the session with time, database and connected user
pub const PREAMBLE_QUERY: &str = r#"select
  '|'
  || to_char(sysdate, 'YYYY-MM-DD"T"HH24:MI:SS') || '|'
  || name || '|'
  || SYS_CONTEXT('USERENV', 'SESSION_USER')
  || '|'
    as "|timestamp|database_name|user|"
  from v$database;"#;

/// Command processor options
#[derive(Debug, Clone)]
pub struct Options {
    /// Command processor and its fixed arguments
    pub command: String,

    /// `ORACLE_HOME` of the child process
    pub oracle_home: String,

    /// Base directory of the per-user wallets
    pub wallet_dir: PathBuf,

    /// Explicit `TNS_ADMIN`, overriding the per-user wallet
    pub tns_admin: Option<PathBuf>,

    /// Kill the command processor after this long
    pub timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            command: "/oracle/product/db/19/bin/sqlplus -L".to_string(),
            oracle_home: "/oracle/product/db/19".to_string(),
            wallet_dir: PathBuf::from("/etc/oracle/wallet"),
            tns_admin: None,
            timeout: None,
        }
    }
}

/// Whether the identity needs the privileged connect variant
pub fn is_privileged(user: &str) -> bool {
    user.to_uppercase().contains("SYS")
}

/// Runs scripts through the command processor and classifies its output
pub struct ExecutionEngine {
    options: Options,
    runner: Arc<dyn ProcessRunner>,
    signatures: Arc<Signatures>,
}

impl ExecutionEngine {
    pub fn new(options: Options, runner: Arc<dyn ProcessRunner>, signatures: Arc<Signatures>) -> Self {
        Self {
            options,
            runner,
            signatures,
        }
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    /// Fail early when the command processor is not configured
    pub fn validate(&self) -> Result<(), DeployError> {
        self.program().map(|_| ())
    }

    fn program(&self) -> Result<&str, DeployError> {
        self.options
            .command
            .split_whitespace()
            .next()
            .ok_or_else(|| DeployError::ConfigError("SQL command processor not set".to_string()))
    }

    /// Build the child process invocation for one script
    pub fn invocation(
        &self,
        descriptor: &ConnectionDescriptor,
        script: &Path,
        user: &str,
    ) -> Result<Invocation, DeployError> {
        let program = self.program()?.to_string();

        let mut args: Vec<String> = self
            .options
            .command
            .split_whitespace()
            .skip(1)
            .map(str::to_string)
            .collect();
        // Wallet based login, credentials come from TNS_ADMIN
        args.push(format!("/@//{}", descriptor.connect_string()));
        if is_privileged(user) {
            args.push("AS".to_string());
            args.push("SYSDBA".to_string());
        }

        let tns_admin = self
            .options
            .tns_admin
            .clone()
            .unwrap_or_else(|| self.options.wallet_dir.join(user.to_lowercase()));

        Ok(Invocation {
            program,
            args,
            env: vec![
                ("ORACLE_HOME".to_string(), self.options.oracle_home.clone()),
                ("TNS_ADMIN".to_string(), tns_admin.display().to_string()),
            ],
            stdin: format!("{}\n@\"{}\"\n", PREAMBLE_QUERY, script.display()),
            timeout: self.options.timeout,
        })
    }

    /// Run one script against one target, writing its log artifact.
    ///
    /// A fatal signature ends the run with [`Outcome::FatalAbort`]; the caller skips the
    /// target's remaining scripts. A non-empty error stream fails the whole run.
    pub async fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        script: &Path,
        user: &str,
        log: &File,
        echo: bool,
    ) -> Result<ExecutionResult, DeployError> {
        let invocation = self.invocation(descriptor, script, user)?;
        let stamp = format!(
            "|{}|{}|{}|",
            Local::now().to_rfc3339(),
            descriptor.target,
            user
        );

        info!(
            db = %descriptor.target,
            script = %script.display(),
            log = %log.path().display(),
            "Running SQL script"
        );

        let output = match self.runner.run(&invocation).await {
            Ok(output) => output,
            Err(RunnerError::Timeout(limit)) => {
                write_failure_log(log, &format!("{stamp}\n")).await;
                return Err(DeployError::Timeout {
                    script: script.display().to_string(),
                    target: descriptor.target.clone(),
                    limit,
                });
            }
            Err(e) => {
                write_failure_log(log, &format!("{stamp}\n{e}\n")).await;
                return Err(DeployError::ScriptExecution {
                    script: script.display().to_string(),
                    target: descriptor.target.clone(),
                    stderr: e.to_string(),
                });
            }
        };

        // The tool gives no partial result on stderr, any error output fails the run
        if !output.stderr.is_empty() {
            let mut content = format!("{stamp}\n");
            for line in output.stdout.lines().chain(output.stderr.lines()) {
                content.push_str(line);
                content.push('\n');
            }
            write_failure_log(log, &content).await;
            warn!(
                db = %descriptor.target,
                script = %script.display(),
                "SQL script wrote to stderr"
            );
            return Err(DeployError::ScriptExecution {
                script: script.display().to_string(),
                target: descriptor.target.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        let scan = self.signatures.scan(output.stdout.lines());

        let mut content = format!("{stamp}\n");
        for line in &scan.lines {
            if echo {
                println!("{}", line);
            }
            content.push_str(line);
            content.push('\n');
        }
        log.write_string(&content).await?;

        let outcome = match scan.fatal {
            Some(line) => {
                warn!(db = %descriptor.target, line = %line, "Fatal signature in output");
                Outcome::FatalAbort { line }
            }
            None => Outcome::Completed,
        };

        debug!(
            db = %descriptor.target,
            script = %script.display(),
            lines = scan.lines.len(),
            errors = scan.errors.len(),
            "SQL script finished"
        );

        Ok(ExecutionResult {
            target: descriptor.target.clone(),
            script: script.to_path_buf(),
            log_path: log.path().to_path_buf(),
            lines: scan.lines,
            errors: scan.errors,
            outcome,
        })
    }
}

/// Best-effort log of a failed run; the run's own error is what gets reported
async fn write_failure_log(log: &File, content: &str) {
    if let Err(e) = log.write_string(content).await {
        warn!("Failed to write log file {}: {}", log.path().display(), e);
    }
}
