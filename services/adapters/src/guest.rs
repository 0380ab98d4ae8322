//! Zero-identity guest client that bootstraps the target application

use crate::error::Result;
use crate::http::ServiceEndpoint;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Where the application should reach the auxiliary services
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapSettings {
    pub bank_endpoint: String,
    pub bank_appid: String,
    pub log_endpoint: String,
    pub log_appid: String,
}

/// Application bootstrap performed before any investor exists
#[async_trait]
pub trait ApplicationBootstrap: Send + Sync {
    async fn initialize(&self, settings: &BootstrapSettings) -> Result<()>;
}

/// Guest client: talks to the application without a bank id or credentials
#[derive(Debug, Clone)]
pub struct GuestClient {
    endpoint: ServiceEndpoint,
}

impl GuestClient {
    pub fn new(app_endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("application", app_endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl ApplicationBootstrap for GuestClient {
    async fn initialize(&self, settings: &BootstrapSettings) -> Result<()> {
        let request = self.endpoint.post("initialize")?.form(settings);
        self.endpoint.send(request).await?;
        info!(
            bank = %settings.bank_endpoint,
            log = %settings.log_endpoint,
            "application initialized"
        );
        Ok(())
    }
}
