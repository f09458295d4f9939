//! Error types for sqldeploy

use std::time::Duration;

use thiserror::Error;

/// Main error type for a deployment request
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Restricted SQL: {fragment} found on line {line:?}")]
    RestrictedOperation { fragment: String, line: String },

    #[error("Database {0} is registered as production")]
    ProductionGuard(String),

    #[error("Database {target} is not registered for application {app}")]
    AppMismatch { target: String, app: String },

    #[error("Database {target} is not registered: {reason}")]
    NotRegistered { target: String, reason: String },

    #[error("SQL script {script} failed on {target} with error: {stderr}")]
    ScriptExecution {
        script: String,
        target: String,
        stderr: String,
    },

    #[error("Connection failed to {target}: {line}")]
    FatalAbort { target: String, line: String },

    #[error("SQL script {script} on {target} did not finish within {limit:?}")]
    Timeout {
        script: String,
        target: String,
        limit: Duration,
    },

    #[error("Invalid state transition: {0}")]
    StateError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Whether the error only ends the current target, leaving sibling targets running
    pub fn is_target_scoped(&self) -> bool {
        matches!(
            self,
            DeployError::RestrictedOperation { .. }
                | DeployError::ProductionGuard(_)
                | DeployError::AppMismatch { .. }
                | DeployError::NotRegistered { .. }
                | DeployError::ScriptExecution { .. }
                | DeployError::FatalAbort { .. }
                | DeployError::Timeout { .. }
                | DeployError::HttpError(_)
                | DeployError::ApiError(_)
                | DeployError::IoError(_)
        )
    }

    /// Short stable name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::IoError(_) => "io",
            DeployError::JsonError(_) => "json",
            DeployError::HttpError(_) => "http",
            DeployError::ApiError(_) => "api",
            DeployError::ConfigError(_) => "configuration",
            DeployError::RestrictedOperation { .. } => "restricted_operation",
            DeployError::ProductionGuard(_) => "production_guard",
            DeployError::AppMismatch { .. } => "app_mismatch",
            DeployError::NotRegistered { .. } => "not_registered",
            DeployError::ScriptExecution { .. } => "script_execution",
            DeployError::FatalAbort { .. } => "fatal_abort",
            DeployError::Timeout { .. } => "timeout",
            DeployError::StateError(_) => "state",
            DeployError::UploadError(_) => "upload",
            DeployError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
