use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::credentials::ResolvedCredentials;
use super::routing::UpstreamTarget;

#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: String,
}

/// A failed outbound call. `status` and `body` are set when the upstream
/// answered with a non-2xx response; a transport failure carries neither.
#[derive(Debug, Clone)]
pub struct UpstreamFailure {
    pub status: Option<StatusCode>,
    pub body: Option<String>,
    pub message: String,
}

/// Sends exactly one POST per call. No retries and no backoff.
#[derive(Clone)]
pub struct UpstreamInvoker {
    client: reqwest::Client,
}

impl UpstreamInvoker {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn build_client(timeout_ms: u64) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
    }

    pub async fn invoke(
        &self,
        target: &UpstreamTarget,
        credentials: &ResolvedCredentials,
        body: &Value,
    ) -> Result<UpstreamReply, UpstreamFailure> {
        debug!(operation = target.operation.as_str(), "invoking upstream");

        let request = credentials.apply(self.client.post(&target.url).json(body));
        let response = request.send().await.map_err(|err| UpstreamFailure {
            status: err.status(),
            body: None,
            message: err.without_url().to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| UpstreamFailure {
            status: Some(status),
            body: None,
            message: err.without_url().to_string(),
        })?;

        if !status.is_success() {
            return Err(UpstreamFailure {
                status: Some(status),
                body: Some(body),
                message: format!("upstream returned status {}", status.as_u16()),
            });
        }

        Ok(UpstreamReply { status, body })
    }
}
