//! Bank (ledger) service client
//!
//! The harness uses the bank for two things: registering every investor's
//! bank id before the investor signs up with the application, and granting
//! credit to investors that start with currency.

use crate::error::Result;
use crate::http::ServiceEndpoint;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Operations the orchestrator needs from the bank
#[async_trait]
pub trait BankService: Send + Sync {
    /// Register a fresh bank id
    async fn register_identity(&self, bank_id: &str) -> Result<()>;

    /// Add `amount` of currency to an existing bank id
    async fn grant_credit(&self, bank_id: &str, amount: i64) -> Result<()>;

    /// Application id the bank issued to this harness
    fn application_identity(&self) -> &str;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    bank_id: &'a str,
}

#[derive(Serialize)]
struct CreditRequest<'a> {
    bank_id: &'a str,
    price: i64,
}

/// HTTP client for the bank service
#[derive(Debug, Clone)]
pub struct BankClient {
    endpoint: ServiceEndpoint,
    app_id: String,
}

impl BankClient {
    pub fn new(endpoint: &str, app_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("bank", endpoint, timeout)?,
            app_id: app_id.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.base().as_str()
    }
}

#[async_trait]
impl BankService for BankClient {
    async fn register_identity(&self, bank_id: &str) -> Result<()> {
        let request = self
            .endpoint
            .post("register")?
            .bearer_auth(&self.app_id)
            .json(&RegisterRequest { bank_id });
        self.endpoint.send(request).await?;
        debug!(bank_id, "bank id registered");
        Ok(())
    }

    async fn grant_credit(&self, bank_id: &str, amount: i64) -> Result<()> {
        let request = self
            .endpoint
            .post("add_credit")?
            .bearer_auth(&self.app_id)
            .json(&CreditRequest {
                bank_id,
                price: amount,
            });
        self.endpoint.send(request).await?;
        debug!(bank_id, amount, "credit granted");
        Ok(())
    }

    fn application_identity(&self) -> &str {
        &self.app_id
    }
}
