//! Resolved connection data for one target

use api_models::models::DbRecord;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Default listener port of an easy-connect descriptor
pub const DEFAULT_PORT: u16 = 1521;

/// Connection data for one target, created once per target per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Target name as requested
    pub target: String,

    /// Listener host
    pub host: String,

    /// Listener port
    pub port: u16,

    /// Service name
    pub service: String,

    /// Lifecycle classification, e.g. "Production"
    pub lifecycle: String,

    /// Applications the database is registered for
    pub applications: String,
}

impl ConnectionDescriptor {
    /// Build a descriptor from a registry record
    pub fn from_record(target: &str, record: &DbRecord) -> Result<Self, DeployError> {
        let (host, port, service) = parse_easy_connect(&record.connect_descriptor)
            .ok_or_else(|| DeployError::NotRegistered {
                target: target.to_string(),
                reason: format!(
                    "malformed connect descriptor {:?}",
                    record.connect_descriptor
                ),
            })?;

        Ok(Self {
            target: target.to_string(),
            host,
            port,
            service,
            lifecycle: record.env_status.clone(),
            applications: record.app_name.clone(),
        })
    }

    /// Easy-connect string, `host:port/service`
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service)
    }

    /// Whether the registry classifies this target as production
    pub fn is_production(&self) -> bool {
        self.lifecycle.to_lowercase().contains("production")
    }
}

/// Parse `[//]host[:port]/service[:server][/instance]`; everything after the first
/// slash is kept as the service part
fn parse_easy_connect(value: &str) -> Option<(String, u16, String)> {
    let value = value.trim().trim_start_matches("//");
    let (address, service) = value.split_once('/')?;
    if service.is_empty() || service.starts_with('/') {
        return None;
    }

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().ok()?),
        None => (address, DEFAULT_PORT),
    };
    if host.is_empty() {
        return None;
    }

    Some((host.to_string(), port, service.to_string()))
}
