//! Execution results and per-target reports

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Terminal outcome of one tool run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The tool ran to the end of its output
    Completed,

    /// A fatal signature ended the run, carrying the matching line
    FatalAbort { line: String },
}

/// Result of running one script against one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub target: String,
    pub script: PathBuf,

    /// Log artifact written for this run
    pub log_path: PathBuf,

    /// Raw tool output lines that were consumed, in order
    pub lines: Vec<String>,

    /// Lines classified as generic errors, a subset of `lines`
    pub errors: Vec<String>,

    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, Outcome::FatalAbort { .. })
    }
}

/// Status of one script on one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScriptStatus {
    Completed,
    FatalAbort { line: String },
    Failed { kind: String, message: String },
    Skipped,
}

impl ScriptStatus {
    /// Whether the run left a log worth classifying
    pub fn is_classifiable(&self) -> bool {
        matches!(self, ScriptStatus::Completed | ScriptStatus::FatalAbort { .. })
    }
}

/// One script's entry in a target report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRun {
    pub script: PathBuf,
    pub log_path: Option<PathBuf>,
    pub status: ScriptStatus,
}

/// Error that ended a target, kept as text so reports stay cloneable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub kind: String,
    pub message: String,
}

impl From<&DeployError> for TargetFailure {
    fn from(err: &DeployError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything that happened on one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: String,
    pub failure: Option<TargetFailure>,
    pub scripts: Vec<ScriptRun>,
}

impl TargetReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            failure: None,
            scripts: Vec::new(),
        }
    }

    /// A target that failed before any script ran
    pub fn rejected(target: impl Into<String>, scripts: &[PathBuf], err: &DeployError) -> Self {
        Self {
            target: target.into(),
            failure: Some(TargetFailure::from(err)),
            scripts: scripts
                .iter()
                .map(|script| ScriptRun {
                    script: script.clone(),
                    log_path: None,
                    status: ScriptStatus::Skipped,
                })
                .collect(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}
