//! Concurrency coordinator
//!
//! Drives one request through `Init -> Resolving -> Executing -> Collecting -> Reported`.
//! Serial mode runs targets one after another and keeps results in memory. Parallel
//! mode starts one worker per target; workers hand back only script statuses, and the
//! classified errors are rebuilt afterwards by rescanning the persisted log artifacts.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::deploy::engine::ExecutionEngine;
use crate::deploy::fsm::{RequestEvent, RequestFsm};
use crate::deploy::policy::PolicyGate;
use crate::deploy::resolver::TargetResolver;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::request::{DeploymentRequest, RunMode};
use crate::models::result::{
    ExecutionResult, Outcome, ScriptRun, ScriptStatus, TargetFailure, TargetReport,
};
use crate::models::target::ConnectionDescriptor;
use crate::report::aggregate::aggregate;
use crate::report::summary::DeploymentReport;
use crate::storage::layout::{request_timestamp, script_labels, LogLayout};

/// Runs deployment requests
pub struct Coordinator {
    engine: Arc<ExecutionEngine>,
    resolver: Arc<dyn TargetResolver>,
    policy: PolicyGate,
    log_dir: PathBuf,
}

impl Coordinator {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        resolver: Arc<dyn TargetResolver>,
        policy: PolicyGate,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            resolver,
            policy,
            log_dir: log_dir.into(),
        }
    }

    /// Run a request stamped with the current time
    pub async fn execute(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentReport, DeployError> {
        self.execute_at(request, request_timestamp()).await
    }

    /// Run a request with an explicit request timestamp.
    ///
    /// Only request-level problems are returned as `Err`; anything scoped to a target
    /// ends up in that target's report.
    pub async fn execute_at(
        &self,
        request: &DeploymentRequest,
        timestamp: impl Into<String>,
    ) -> Result<DeploymentReport, DeployError> {
        request.validate()?;
        self.engine.validate()?;

        let mut fsm = RequestFsm::new();
        let request_id = uuid::Uuid::new_v4().to_string();
        let layout = LogLayout::new(&self.log_dir, timestamp);
        let mode = request.mode();

        info!(
            request_id = %request_id,
            mode = %mode,
            targets = ?request.targets,
            scripts = ?request.scripts,
            user = %request.user,
            "Starting deployment"
        );

        advance(&mut fsm, RequestEvent::Start)?;

        let violation = match self.check_scripts(request).await {
            Ok(violation) => violation,
            Err(e) => return Err(fail(&mut fsm, &request_id, e)),
        };

        let preflights: Vec<Result<ConnectionDescriptor, DeployError>> = match &violation {
            // Same scripts everywhere, so no target may run them
            Some(violation) => {
                error!("{}", violation);
                request
                    .targets
                    .iter()
                    .map(|_| Err(restate(violation)))
                    .collect()
            }
            None => match mode {
                RunMode::Serial => {
                    let mut preflights = Vec::with_capacity(request.targets.len());
                    for target in &request.targets {
                        preflights.push(self.preflight(target, request).await);
                    }
                    preflights
                }
                RunMode::Parallel => {
                    join_all(
                        request
                            .targets
                            .iter()
                            .map(|target| self.preflight(target, request)),
                    )
                    .await
                }
            },
        };

        advance(&mut fsm, RequestEvent::Resolved)?;

        let (targets, results) = match mode {
            RunMode::Serial => {
                let collected = match self.execute_serial(request, preflights, &layout).await {
                    Ok(collected) => collected,
                    Err(e) => return Err(fail(&mut fsm, &request_id, e)),
                };
                advance(&mut fsm, RequestEvent::Collect)?;
                collected
            }
            RunMode::Parallel => {
                let reports = match self.execute_parallel(request, preflights, &layout).await {
                    Ok(reports) => reports,
                    Err(e) => return Err(fail(&mut fsm, &request_id, e)),
                };
                advance(&mut fsm, RequestEvent::Collect)?;
                let results = self.collect_from_logs(&reports).await;
                (reports, results)
            }
        };

        let aggregate = aggregate(&results);
        advance(&mut fsm, RequestEvent::Report)?;

        let report = DeploymentReport {
            request_id,
            timestamp: layout.timestamp().to_string(),
            mode,
            state: fsm.state().clone(),
            targets,
            results,
            aggregate,
        };

        info!(
            request_id = %report.request_id,
            failed_targets = report.failed_targets().count(),
            errors = report.aggregate.total(),
            "Deployment finished"
        );

        Ok(report)
    }

    /// Restricted SQL scan over every script, done once per request
    async fn check_scripts(
        &self,
        request: &DeploymentRequest,
    ) -> Result<Option<DeployError>, DeployError> {
        if !request.flags.enforce_restricted_check {
            debug!("Restricted SQL check disabled");
            return Ok(None);
        }

        for script in &request.scripts {
            let content = File::new(script).read_string().await.map_err(|e| {
                DeployError::ConfigError(format!(
                    "Cannot read SQL script {}: {}",
                    script.display(),
                    e
                ))
            })?;
            if let Err(violation) = self.policy.check_script(&content) {
                return Ok(Some(violation));
            }
        }
        Ok(None)
    }

    /// Resolve one target and apply the target policies
    async fn preflight(
        &self,
        target: &str,
        request: &DeploymentRequest,
    ) -> Result<ConnectionDescriptor, DeployError> {
        let descriptor = self.resolver.resolve(target).await?;
        debug!(
            db = %target,
            connect = %descriptor.connect_string(),
            lifecycle = %descriptor.lifecycle,
            "Target resolved"
        );

        self.policy
            .check_target(&descriptor, request.flags.enforce_production_check)?;
        self.policy
            .check_app(&descriptor, request.required_app.as_deref())?;
        Ok(descriptor)
    }

    async fn execute_serial(
        &self,
        request: &DeploymentRequest,
        preflights: Vec<Result<ConnectionDescriptor, DeployError>>,
        layout: &LogLayout,
    ) -> Result<(Vec<TargetReport>, Vec<ExecutionResult>), DeployError> {
        let mut reports = Vec::with_capacity(preflights.len());
        let mut results = Vec::new();

        for (target, preflight) in request.targets.iter().zip(preflights) {
            match preflight {
                Ok(descriptor) => {
                    info!("dbname: {}", target);
                    let (report, target_results) = run_target(
                        &self.engine,
                        &descriptor,
                        &request.scripts,
                        &request.user,
                        layout,
                        true,
                    )
                    .await?;
                    reports.push(report);
                    results.extend(target_results);
                }
                Err(e) => {
                    error!("Skipping {}: {}", target, e);
                    reports.push(TargetReport::rejected(target, &request.scripts, &e));
                }
            }
        }

        Ok((reports, results))
    }

    async fn execute_parallel(
        &self,
        request: &DeploymentRequest,
        preflights: Vec<Result<ConnectionDescriptor, DeployError>>,
        layout: &LogLayout,
    ) -> Result<Vec<TargetReport>, DeployError> {
        let mut slots: Vec<Option<TargetReport>> = vec![None; request.targets.len()];
        let mut workers = Vec::new();

        for (index, (target, preflight)) in request.targets.iter().zip(preflights).enumerate() {
            match preflight {
                Ok(descriptor) => {
                    let engine = self.engine.clone();
                    let scripts = request.scripts.clone();
                    let user = request.user.clone();
                    let layout = layout.clone();
                    let handle = tokio::spawn(async move {
                        run_target(&engine, &descriptor, &scripts, &user, &layout, false)
                            .await
                            .map(|(report, _)| report)
                    });
                    workers.push((index, target.clone(), handle));
                }
                Err(e) => {
                    error!("Skipping {}: {}", target, e);
                    slots[index] = Some(TargetReport::rejected(target, &request.scripts, &e));
                }
            }
        }

        info!("Waiting for {} worker(s)", workers.len());

        // Wait for every worker, whatever happened to the others
        let (meta, handles): (Vec<_>, Vec<_>) = workers
            .into_iter()
            .map(|(index, target, handle)| ((index, target), handle))
            .unzip();
        let joined = join_all(handles).await;

        let mut aborted = None;
        for ((index, target), outcome) in meta.into_iter().zip(joined) {
            let report = match outcome {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => {
                    aborted.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    let err = DeployError::Internal(format!("worker for {} died: {}", target, e));
                    error!("{}", err);
                    TargetReport::rejected(&target, &request.scripts, &err)
                }
            };
            slots[index] = Some(report);
        }

        match aborted {
            Some(e) => Err(e),
            None => Ok(slots.into_iter().flatten().collect()),
        }
    }

    /// Rebuild execution results from the persisted log artifacts
    async fn collect_from_logs(&self, reports: &[TargetReport]) -> Vec<ExecutionResult> {
        let signatures = self.engine.signatures();
        let mut results = Vec::new();

        for report in reports {
            for run in &report.scripts {
                if !run.status.is_classifiable() {
                    continue;
                }
                let Some(log_path) = &run.log_path else {
                    continue;
                };

                let content = match File::new(log_path).read_string().await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!("Cannot read log file {}: {}", log_path.display(), e);
                        continue;
                    }
                };

                let scan = signatures.scan_log(&content);
                let outcome = match scan.fatal {
                    Some(line) => Outcome::FatalAbort { line },
                    None => Outcome::Completed,
                };
                results.push(ExecutionResult {
                    target: report.target.clone(),
                    script: run.script.clone(),
                    log_path: log_path.clone(),
                    lines: scan.lines,
                    errors: scan.errors,
                    outcome,
                });
            }
        }

        results
    }
}

/// Run every script of a request on one target, in order.
///
/// The first fatal abort or failed run ends the target; later scripts are skipped.
/// Errors that are not scoped to the target abort the whole request.
async fn run_target(
    engine: &ExecutionEngine,
    descriptor: &ConnectionDescriptor,
    scripts: &[PathBuf],
    user: &str,
    layout: &LogLayout,
    echo: bool,
) -> Result<(TargetReport, Vec<ExecutionResult>), DeployError> {
    let mut report = TargetReport::new(&descriptor.target);
    let mut results = Vec::new();
    let labels = script_labels(scripts);
    let mut remaining = scripts.iter().zip(labels.iter());

    for (script, label) in remaining.by_ref() {
        let log = layout.artifact(label, &descriptor.target);

        match engine.run(descriptor, script, user, &log, echo).await {
            Ok(result) => {
                let fatal = match &result.outcome {
                    Outcome::Completed => None,
                    Outcome::FatalAbort { line } => Some(line.clone()),
                };
                report.scripts.push(ScriptRun {
                    script: script.clone(),
                    log_path: Some(log.path().to_path_buf()),
                    status: match &fatal {
                        None => ScriptStatus::Completed,
                        Some(line) => ScriptStatus::FatalAbort { line: line.clone() },
                    },
                });
                results.push(result);

                if let Some(line) = fatal {
                    let err = DeployError::FatalAbort {
                        target: descriptor.target.clone(),
                        line,
                    };
                    error!("{}", err);
                    report.failure = Some(TargetFailure::from(&err));
                    break;
                }
            }
            Err(e) if !e.is_target_scoped() => return Err(e),
            Err(e) => {
                error!("{}", e);
                let log_path = if log.exists().await {
                    Some(log.path().to_path_buf())
                } else {
                    None
                };
                report.scripts.push(ScriptRun {
                    script: script.clone(),
                    log_path,
                    status: ScriptStatus::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                });
                report.failure = Some(TargetFailure::from(&e));
                break;
            }
        }
    }

    for (script, _) in remaining {
        report.scripts.push(ScriptRun {
            script: script.clone(),
            log_path: None,
            status: ScriptStatus::Skipped,
        });
    }

    Ok((report, results))
}

/// Move the request to `Failed` and hand the error back
fn fail(fsm: &mut RequestFsm, request_id: &str, err: DeployError) -> DeployError {
    if let Err(e) = fsm.process(RequestEvent::Fail(err.to_string())) {
        warn!("{}", e);
    }
    error!(
        request_id = %request_id,
        state = ?fsm.state(),
        reason = %fsm.error().unwrap_or_default(),
        "Deployment aborted"
    );
    err
}

fn advance(fsm: &mut RequestFsm, event: RequestEvent) -> Result<(), DeployError> {
    fsm.process(event).map_err(DeployError::StateError)
}

/// Copy of a policy violation for each rejected target
fn restate(violation: &DeployError) -> DeployError {
    match violation {
        DeployError::RestrictedOperation { fragment, line } => DeployError::RestrictedOperation {
            fragment: fragment.clone(),
            line: line.clone(),
        },
        other => DeployError::Internal(other.to_string()),
    }
}
