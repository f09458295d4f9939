//! Target resolution boundary

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::models::target::ConnectionDescriptor;

/// Looks up connection data for a target name.
///
/// Unknown targets and malformed registry answers both surface as
/// [`DeployError::NotRegistered`].
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<ConnectionDescriptor, DeployError>;
}
