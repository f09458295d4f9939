//! API models

use serde::{Deserialize, Serialize};

/// Database record returned by the registry for one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbRecord {
    /// Easy-connect descriptor, `host[:port]/service`
    pub connect_descriptor: String,

    /// Lifecycle classification, e.g. "Production" or "Test"
    #[serde(default)]
    pub env_status: String,

    /// Applications the database is registered for
    #[serde(default)]
    pub app_name: String,
}

/// Attachment metadata returned by the issue tracker after an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    pub details: Option<serde_json::Value>,
}
