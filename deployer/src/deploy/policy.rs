//! Pre-flight policy checks
//!
//! Textual guard rails evaluated before any process is spawned. The restricted SQL
//! scan matches fragments case-insensitively inside each line and does not parse SQL.

use tracing::debug;

use crate::errors::DeployError;
use crate::models::target::ConnectionDescriptor;

/// Operations that must never reach a target through this tool
pub const DEFAULT_RESTRICTED_FRAGMENTS: &[&str] = &[
    "PROFILE DEFAULT",
    "GRANT DBA",
    "SYSDBA",
    "ALTER SYSTEM SET",
    "NOAUDIT",
    "SHUTDOWN",
];

pub fn default_restricted_fragments() -> Vec<String> {
    DEFAULT_RESTRICTED_FRAGMENTS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

/// Policy gate
#[derive(Debug, Clone)]
pub struct PolicyGate {
    /// Upper-cased deny-list
    restricted: Vec<String>,
}

impl PolicyGate {
    pub fn new(restricted_fragments: &[String]) -> Self {
        Self {
            restricted: restricted_fragments
                .iter()
                .map(|f| f.trim().to_uppercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// Fail on the first line containing a restricted fragment
    pub fn check_script(&self, content: &str) -> Result<(), DeployError> {
        for line in content.lines() {
            let upper = line.trim_end().to_uppercase();
            if let Some(fragment) = self.restricted.iter().find(|f| upper.contains(f.as_str())) {
                return Err(DeployError::RestrictedOperation {
                    fragment: fragment.clone(),
                    line: line.trim_end().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Refuse production targets when the guard is enforced
    pub fn check_target(
        &self,
        descriptor: &ConnectionDescriptor,
        enforce_production_check: bool,
    ) -> Result<(), DeployError> {
        if !enforce_production_check {
            debug!("Production check disabled for {}", descriptor.target);
            return Ok(());
        }
        if descriptor.is_production() {
            return Err(DeployError::ProductionGuard(descriptor.target.clone()));
        }
        Ok(())
    }

    /// Require the target to be registered for the given application
    pub fn check_app(
        &self,
        descriptor: &ConnectionDescriptor,
        required_app: Option<&str>,
    ) -> Result<(), DeployError> {
        let Some(app) = required_app else {
            return Ok(());
        };
        if descriptor.applications.contains(&app.to_uppercase()) {
            Ok(())
        } else {
            Err(DeployError::AppMismatch {
                target: descriptor.target.clone(),
                app: app.to_string(),
            })
        }
    }
}

impl Default for PolicyGate {
    fn default() -> Self {
        Self::new(&default_restricted_fragments())
    }
}
