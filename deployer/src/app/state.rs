//! Application state: the wired-up collaborators of one run

use std::sync::Arc;

use tracing::debug;

use crate::app::options::AppOptions;
use crate::deploy::coordinator::Coordinator;
use crate::deploy::engine::ExecutionEngine;
use crate::deploy::policy::PolicyGate;
use crate::deploy::runner::ChildProcessRunner;
use crate::deploy::signatures::Signatures;
use crate::errors::DeployError;
use crate::http::registry::RegistryClient;
use crate::http::tracker::IssueTrackerClient;
use crate::report::publish::AttachmentSink;

pub struct AppState {
    pub coordinator: Coordinator,
    pub tracker: Arc<dyn AttachmentSink>,
}

impl AppState {
    /// Wire the production collaborators from the options
    pub fn init(options: &AppOptions) -> Result<Self, DeployError> {
        let signatures = Arc::new(Signatures::new(&options.signatures));
        let engine = Arc::new(ExecutionEngine::new(
            options.tool.clone(),
            Arc::new(ChildProcessRunner::new()),
            signatures,
        ));
        let registry = Arc::new(RegistryClient::new(&options.registry)?);
        let tracker = Arc::new(IssueTrackerClient::new(&options.tracker)?);
        let policy = PolicyGate::new(&options.restricted_fragments);

        debug!(
            "Registry at {}, tracker at {}, logs in {}",
            options.registry.base_url,
            options.tracker.base_url,
            options.log_dir.display()
        );

        Ok(Self {
            coordinator: Coordinator::new(engine, registry, policy, &options.log_dir),
            tracker,
        })
    }
}
