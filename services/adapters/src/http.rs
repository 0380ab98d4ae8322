//! Shared HTTP plumbing for service clients

use crate::error::{AdapterError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Error body returned by the bank and audit log services
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Base URL + client + bearer token for one external service
#[derive(Debug, Clone)]
pub(crate) struct ServiceEndpoint {
    service: &'static str,
    base: Url,
    client: Client,
}

impl ServiceEndpoint {
    pub(crate) fn new(service: &'static str, endpoint: &str, timeout: Duration) -> Result<Self> {
        let base = parse_base(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AdapterError::ClientBuild)?;
        Ok(Self {
            service,
            base,
            client,
        })
    }

    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn post(&self, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|source| AdapterError::InvalidEndpoint {
                endpoint: format!("{}{}", self.base, path),
                source,
            })?;
        Ok(self.client.post(url))
    }

    /// Send the request and map any non-2xx answer to [`AdapterError::Status`]
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await.map_err(|source| AdapterError::Request {
            service: self.service,
            source,
        })?;
        self.check(response).await
    }

    async fn check(&self, response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            debug!(service = self.service, %status, "request ok");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        Err(AdapterError::Status {
            service: self.service,
            status: status.as_u16(),
            message,
        })
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins keep its path
fn parse_base(endpoint: &str) -> Result<Url> {
    let normalized = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    };
    Url::parse(&normalized).map_err(|source| AdapterError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })
}
