//! Database registry lookups

use api_models::models::DbRecord;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::deploy::resolver::TargetResolver;
use crate::errors::DeployError;
use crate::http::client::{ApiOptions, HttpClient};
use crate::models::target::ConnectionDescriptor;

/// Resolves targets through the registry REST API, `GET {base}/{target}`
pub struct RegistryClient {
    http: HttpClient,
}

impl RegistryClient {
    pub fn new(options: &ApiOptions) -> Result<Self, DeployError> {
        Ok(Self {
            http: HttpClient::new(options)?,
        })
    }
}

#[async_trait]
impl TargetResolver for RegistryClient {
    async fn resolve(&self, target: &str) -> Result<ConnectionDescriptor, DeployError> {
        debug!("Resolving {} via {}", target, self.http.base_url());

        let record: DbRecord = self.http.get(&[target]).await.map_err(|e| {
            warn!("Registry lookup for {} failed: {}", target, e);
            DeployError::NotRegistered {
                target: target.to_string(),
                reason: e.to_string(),
            }
        })?;

        ConnectionDescriptor::from_record(target, &record)
    }
}
