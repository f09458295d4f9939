//! Finite State Machine for a deployment request

use serde::{Deserialize, Serialize};

/// Request state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Validated, nothing resolved yet
    Init,

    /// Resolving targets and running pre-flight checks
    Resolving,

    /// Scripts running on targets
    Executing,

    /// Gathering classified errors from the runs
    Collecting,

    /// Report built
    Reported,

    /// Request aborted before reporting
    Failed,
}

/// Request event
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// Begin resolving targets
    Start,

    /// All targets resolved or rejected
    Resolved,

    /// Every execution finished
    Collect,

    /// Report built
    Report,

    /// Request-level failure
    Fail(String),
}

/// Request FSM
#[derive(Debug, Clone)]
pub struct RequestFsm {
    state: RequestState,
    error: Option<String>,
}

impl RequestFsm {
    /// Create a new FSM in init state
    pub fn new() -> Self {
        Self {
            state: RequestState::Init,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RequestEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (RequestState::Init, RequestEvent::Start) => RequestState::Resolving,
            (RequestState::Resolving, RequestEvent::Resolved) => RequestState::Executing,
            (RequestState::Executing, RequestEvent::Collect) => RequestState::Collecting,
            (RequestState::Collecting, RequestEvent::Report) => RequestState::Reported,

            // Any unfinished state may fail
            (
                RequestState::Init
                | RequestState::Resolving
                | RequestState::Executing
                | RequestState::Collecting,
                RequestEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                RequestState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Whether the request reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RequestState::Reported | RequestState::Failed)
    }
}

impl Default for RequestFsm {
    fn default() -> Self {
        Self::new()
    }
}
