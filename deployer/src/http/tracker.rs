//! Issue tracker attachments

use std::path::Path;

use api_models::models::AttachmentInfo;
use async_trait::async_trait;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::http::client::{ApiOptions, HttpClient};
use crate::report::publish::AttachmentSink;

/// Uploads log artifacts with `POST {base}/issue/{ticket}/attachments`
pub struct IssueTrackerClient {
    http: HttpClient,
}

impl IssueTrackerClient {
    pub fn new(options: &ApiOptions) -> Result<Self, DeployError> {
        Ok(Self {
            http: HttpClient::new(options)?,
        })
    }
}

#[async_trait]
impl AttachmentSink for IssueTrackerClient {
    async fn upload(&self, ticket: &str, artifact: &Path) -> Result<(), DeployError> {
        let file = File::new(artifact);
        let contents = file.read_bytes().await?;

        let body = self
            .http
            .post_file(
                &["issue", ticket, "attachments"],
                file.file_name(),
                contents,
                &[("X-Atlassian-Token", "nocheck")],
            )
            .await
            .map_err(|e| DeployError::UploadError(format!("{}: {}", file.file_name(), e)))?;

        // The tracker answers with the attachments it created
        if let Ok(attachments) = serde_json::from_str::<Vec<AttachmentInfo>>(&body) {
            for attachment in attachments {
                debug!(
                    "Attachment {} created: {} ({} bytes)",
                    attachment.id, attachment.filename, attachment.size
                );
            }
        }
        Ok(())
    }
}
