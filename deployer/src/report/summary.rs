//! Deployment report and its printed summary

use std::fmt::Write;
use std::path::PathBuf;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::RequestState;
use crate::models::request::RunMode;
use crate::models::result::{ExecutionResult, ScriptStatus, TargetReport};
use crate::report::aggregate::AggregatedReport;

/// Everything a request produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub request_id: String,

    /// Request timestamp, also part of every log artifact name
    pub timestamp: String,

    pub mode: RunMode,
    pub state: RequestState,
    pub targets: Vec<TargetReport>,
    pub results: Vec<ExecutionResult>,
    pub aggregate: AggregatedReport,
}

impl DeploymentReport {
    /// Whether any target ended in a fatal, policy or resolution error.
    ///
    /// Generic classified errors do not count as failures.
    pub fn has_failures(&self) -> bool {
        self.targets.iter().any(TargetReport::is_failed)
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| t.is_failed())
    }

    /// Process exit status for the request
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Log artifacts written during the request, in target then script order
    pub fn log_artifacts(&self) -> Vec<PathBuf> {
        self.targets
            .iter()
            .flat_map(|t| t.scripts.iter())
            .filter_map(|s| s.log_path.clone())
            .collect()
    }
}

fn status_label(status: &ScriptStatus) -> String {
    match status {
        ScriptStatus::Completed => "completed".green().to_string(),
        ScriptStatus::FatalAbort { .. } => "fatal_abort".red().to_string(),
        ScriptStatus::Failed { kind, .. } => kind.red().to_string(),
        ScriptStatus::Skipped => "skipped".yellow().to_string(),
    }
}

/// Render the final summary: per-target outcome, then the error frequency list
pub fn render_summary(report: &DeploymentReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} ({}, {} target(s))",
        "Deployment".bold(),
        report.request_id,
        report.mode,
        report.targets.len()
    );

    for target in &report.targets {
        match &target.failure {
            None => {
                let _ = writeln!(
                    out,
                    "  {} {}: {} script(s) completed",
                    "✓".green(),
                    target.target.bold(),
                    target.scripts.len()
                );
            }
            Some(failure) => {
                let _ = writeln!(
                    out,
                    "  {} {}: {}",
                    "✗".red(),
                    target.target.bold(),
                    failure.message
                );
                for run in &target.scripts {
                    let _ = writeln!(
                        out,
                        "      {}: {}",
                        run.script.display(),
                        status_label(&run.status)
                    );
                }
            }
        }
    }

    if !report.aggregate.is_empty() {
        let _ = writeln!(out, "{}", "ORA- errors found".yellow().bold());
        for entry in &report.aggregate.entries {
            let _ = writeln!(out, "{}x : {} ", entry.count, entry.line);
        }
    }

    out
}
