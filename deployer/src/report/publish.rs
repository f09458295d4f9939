//! Best-effort publishing of log artifacts to a ticket

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::DeployError;

/// Receives log artifacts as ticket attachments
#[async_trait]
pub trait AttachmentSink: Send + Sync {
    async fn upload(&self, ticket: &str, artifact: &Path) -> Result<(), DeployError>;
}

/// Upload every artifact to the ticket.
///
/// Failures are logged and skipped; they never change the request outcome. Returns
/// the number of artifacts uploaded.
pub async fn publish(
    sink: &dyn AttachmentSink,
    ticket: Option<&str>,
    artifacts: &[PathBuf],
) -> usize {
    let Some(ticket) = ticket else {
        return 0;
    };

    let mut uploaded = 0;
    for artifact in artifacts {
        match sink.upload(ticket, artifact).await {
            Ok(()) => {
                info!("log file {} uploaded to {}", artifact.display(), ticket);
                uploaded += 1;
            }
            Err(e) => {
                warn!("Failed to upload {} to {}: {}", artifact.display(), ticket, e);
            }
        }
    }
    uploaded
}
