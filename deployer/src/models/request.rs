//! Deployment request model

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Execution mode across targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One target at a time, tool output streamed live
    Serial,

    /// One worker per target, results collected from the log artifacts
    Parallel,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Serial => write!(f, "serial"),
            RunMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Policy and scheduling switches of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlags {
    /// Scan scripts for restricted SQL before execution
    pub enforce_restricted_check: bool,

    /// Refuse targets registered as production
    pub enforce_production_check: bool,

    /// Run targets concurrently
    pub run_parallel: bool,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self {
            enforce_restricted_check: true,
            enforce_production_check: false,
            run_parallel: false,
        }
    }
}

/// A request to run scripts against targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Target names, unique, in input order
    pub targets: Vec<String>,

    /// Scripts, executed in this order on every target
    pub scripts: Vec<PathBuf>,

    /// Identity used to connect
    pub user: String,

    /// Policy and scheduling switches
    pub flags: RequestFlags,

    /// Application the targets must be registered for
    pub required_app: Option<String>,

    /// Ticket that receives the log artifacts
    pub ticket: Option<String>,
}

impl DeploymentRequest {
    /// Create a request with default flags
    pub fn new<T, S>(targets: T, scripts: S, user: impl Into<String>) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<PathBuf>,
    {
        let mut unique: Vec<String> = Vec::new();
        for target in targets.into_iter().map(Into::into) {
            if !target.is_empty() && !unique.contains(&target) {
                unique.push(target);
            }
        }

        Self {
            targets: unique,
            scripts: scripts.into_iter().map(Into::into).collect(),
            user: user.into(),
            flags: RequestFlags::default(),
            required_app: None,
            ticket: None,
        }
    }

    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_required_app(mut self, app: Option<String>) -> Self {
        self.required_app = app.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn with_ticket(mut self, ticket: Option<String>) -> Self {
        self.ticket = ticket.filter(|t| !t.trim().is_empty());
        self
    }

    /// Execution mode selected by the flags
    pub fn mode(&self) -> RunMode {
        if self.flags.run_parallel {
            RunMode::Parallel
        } else {
            RunMode::Serial
        }
    }

    /// Reject requests that cannot run at all
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.targets.is_empty() {
            return Err(DeployError::ConfigError(
                "Database name not specified".to_string(),
            ));
        }
        if self.scripts.is_empty() {
            return Err(DeployError::ConfigError(
                "SQL script filename not specified".to_string(),
            ));
        }
        if self.user.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "Connecting user not specified".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a free-form list ("DB1, DB2;DB3") into names.
///
/// Every non-alphanumeric character separates names, so `_` and `-` do too.
pub fn split_names(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
