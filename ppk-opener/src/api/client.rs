//! Open-box HTTP client
//!
//! One POST per scan cycle, no retries. Timeout is the client default unless
//! configured.

use super::types::{AccessRequest, AccessResponse, BoxId};
use crate::config::Config;
use crate::error::{Error, Result};
use ppk_common::config::RequestDefaults;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("ppk-opener/", env!("CARGO_PKG_VERSION"));

/// Remote call that asks a box to open
pub trait AccessApi: Send + Sync {
    fn open_box(&self, box_id: &BoxId) -> impl Future<Output = Result<AccessResponse>> + Send;
}

/// reqwest-backed access API client
pub struct AccessClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
    defaults: RequestDefaults,
}

impl AccessClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        defaults: RequestDefaults,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            token: token.into(),
            defaults,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.token.clone(),
            config.request.clone(),
            config.timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AccessApi for AccessClient {
    async fn open_box(&self, box_id: &BoxId) -> Result<AccessResponse> {
        let request = AccessRequest::new(box_id.clone(), &self.defaults);
        debug!(box_id = %box_id, endpoint = %self.endpoint, "Sending open-box request");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = status.canonical_reason().unwrap_or("Unknown").to_string();
            warn!(box_id = %box_id, code = status.as_u16(), "Open-box request rejected");
            return Err(Error::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let access_response: AccessResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        if access_response.result != 0 {
            warn!(
                box_id = %box_id,
                result = access_response.result,
                error_number = access_response.error_number,
                "Server reported non-zero result"
            );
        }

        info!(
            box_id = %box_id,
            payload_len = access_response.data.len(),
            "Open-box request accepted"
        );
        Ok(access_response)
    }
}
