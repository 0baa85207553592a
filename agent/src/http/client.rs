//! HTTP client implementation

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::AgentError;

const SERVER_TOKEN_HEADER: &str = "X-Server-Token";

/// Typed REST surface to the control plane
pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    server_token: String,
}

impl ControlPlaneClient {
    /// Create a new control-plane client
    pub fn new(base_url: &str, server_token: &str) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_token: server_token.to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path under `/api/agents`
    pub(crate) fn agents_url(&self, path: &str) -> String {
        format!("{}/api/agents{}", self.base_url, path)
    }

    /// Absolute URL for any other backend path
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, AgentError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .send()
            .await?;

        Self::decode(url, response).await
    }

    /// Make a POST request
    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, AgentError> {
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(url)
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        Self::decode(url, response).await
    }

    /// Make a PATCH request
    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, AgentError> {
        debug!("PATCH {}", url);

        let mut request = self
            .client
            .patch(url)
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        Self::decode(url, response).await
    }

    /// PUT raw bytes to a pre-signed object-store URL. No server token:
    /// the URL itself carries the authorization.
    pub async fn put_presigned(
        &self,
        url: &str,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<(), AgentError> {
        debug!("PUT {} ({} bytes)", url, bytes.len());

        let response = self
            .client
            .put(url)
            .timeout(timeout)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Pre-signed upload failed: {}", status);
            return Err(AgentError::ControlPlaneError(format!(
                "upload failed with {}",
                status
            )));
        }

        Ok(())
    }

    /// GET raw bytes from a pre-signed object-store URL
    pub async fn get_presigned(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, AgentError> {
        debug!("GET {} (presigned)", url);

        let response = self.client.get(url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Pre-signed download failed: {}", status);
            return Err(AgentError::ControlPlaneError(format!(
                "download failed with {}",
                status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, AgentError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP request to {} failed: {} - {}", url, status, body);
            return Err(AgentError::ControlPlaneError(format!(
                "{}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}
