//! Audit log service client

use crate::error::Result;
use crate::http::ServiceEndpoint;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Operations the orchestrator needs from the audit log
#[async_trait]
pub trait AuditLogService: Send + Sync {
    /// Drop every log record of this application
    async fn reset(&self) -> Result<()>;

    /// Application id the audit log issued to this harness
    fn application_identity(&self) -> &str;
}

/// HTTP client for the audit log service
#[derive(Debug, Clone)]
pub struct AuditLogClient {
    endpoint: ServiceEndpoint,
    app_id: String,
}

impl AuditLogClient {
    pub fn new(endpoint: &str, app_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("audit log", endpoint, timeout)?,
            app_id: app_id.into(),
        })
    }
}

#[async_trait]
impl AuditLogService for AuditLogClient {
    async fn reset(&self) -> Result<()> {
        let request = self.endpoint.post("initialize")?.bearer_auth(&self.app_id);
        self.endpoint.send(request).await?;
        info!(app_id = %self.app_id, "audit log reset");
        Ok(())
    }

    fn application_identity(&self) -> &str {
        &self.app_id
    }
}
