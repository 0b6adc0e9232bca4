//! HTTP transport to the ACP backend.
//!
//! The backend is treated as an opaque JSON-over-HTTP service: `GET` and
//! `POST` with JSON bodies, a static `x-api-key` header, and remote status
//! codes surfaced on failure. The transport keeps a small built-in retry
//! on 429/5xx; the policy-level retry in [`crate::retry`] composes on top.

use crate::constants::{API_KEY_HEADER, TRANSPORT_ATTEMPTS, TRANSPORT_BASE_DELAY_MS};
use crate::error::{AcpError, AcpResult};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// JSON-over-HTTP client for the ACP backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    /// Create a client with a default `reqwest::Client`.
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> AcpResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AcpError::Network {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(base_url, api_key, client))
    }

    /// Create a client with a pre-configured `reqwest::Client` (custom
    /// timeouts, proxies, TLS config).
    pub fn with_client(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path_and_query);
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
    }

    async fn execute(&self, builder: RequestBuilder) -> AcpResult<Value> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| AcpError::InvalidParameter {
                    message: "request body is not cloneable".to_string(),
                })?;

            match Self::send_once(request).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let transient = matches!(
                        &err,
                        AcpError::Status { status, .. }
                            if *status == 429 || (500..600).contains(status)
                    );
                    if attempt >= TRANSPORT_ATTEMPTS || !transient {
                        return Err(err);
                    }
                    let delay =
                        Duration::from_millis(TRANSPORT_BASE_DELAY_MS << (attempt - 1).min(8));
                    debug!(
                        component = "backend",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transport retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(request: RequestBuilder) -> AcpResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AcpError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| AcpError::Serialization {
            message: format!("Failed to parse response body: {e}"),
        })
    }

    /// `GET` a path (with query string) and parse the JSON response.
    pub async fn get_json(&self, path_and_query: &str) -> AcpResult<Value> {
        self.execute(self.request(Method::GET, path_and_query)).await
    }

    /// `POST` a JSON body to a path and parse the JSON response.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> AcpResult<Value> {
        self.execute(self.request(Method::POST, path).json(body))
            .await
    }
}
