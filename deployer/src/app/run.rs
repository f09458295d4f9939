//! Run one deployment request end to end

use tracing::info;

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::DeployError;
use crate::models::request::DeploymentRequest;
use crate::report::publish::publish;
use crate::report::summary::DeploymentReport;

/// Execute the request, then attach the log artifacts to its ticket
pub async fn run(
    request: &DeploymentRequest,
    options: &AppOptions,
) -> Result<DeploymentReport, DeployError> {
    let state = AppState::init(options)?;
    execute(&state, request).await
}

/// Execute the request with already wired collaborators
pub async fn execute(
    state: &AppState,
    request: &DeploymentRequest,
) -> Result<DeploymentReport, DeployError> {
    info!(
        "Deploying {} script(s) to {} target(s) as {} ({})",
        request.scripts.len(),
        request.targets.len(),
        request.user,
        request.mode()
    );

    let report = state.coordinator.execute(request).await?;

    if let Some(ticket) = request.ticket.as_deref() {
        let artifacts = report.log_artifacts();
        let uploaded = publish(state.tracker.as_ref(), Some(ticket), &artifacts).await;
        info!(
            "{} of {} log file(s) attached to {}",
            uploaded,
            artifacts.len(),
            ticket
        );
    }

    Ok(report)
}
