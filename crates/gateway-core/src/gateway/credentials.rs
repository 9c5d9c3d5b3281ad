use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use tracing::warn;

use super::error::GatewayError;
use super::google_auth::AmbientIdentity;
use super::routing::AuthStyle;
use crate::config::GatewayConfig;

const API_KEY_QUERY_PARAM: &str = "key";

/// Outbound credentials for a single request. Each variant knows how to
/// attach itself to the upstream call.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    StaticKey {
        value: String,
    },
    CloudToken {
        access_token: String,
        project_id: String,
        expires_at: DateTime<Utc>,
    },
}

impl ResolvedCredentials {
    pub fn auth_style(&self) -> AuthStyle {
        match self {
            Self::StaticKey { .. } => AuthStyle::QueryParamKey,
            Self::CloudToken { .. } => AuthStyle::BearerHeader,
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::StaticKey { .. } => None,
            Self::CloudToken { project_id, .. } => Some(project_id),
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::StaticKey { value } => request.query(&[(API_KEY_QUERY_PARAM, value.as_str())]),
            Self::CloudToken { access_token, .. } => request.bearer_auth(access_token),
        }
    }
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticKey { .. } => f
                .debug_struct("StaticKey")
                .field("value", &"<redacted>")
                .finish(),
            Self::CloudToken {
                project_id,
                expires_at,
                ..
            } => f
                .debug_struct("CloudToken")
                .field("access_token", &"<redacted>")
                .field("project_id", project_id)
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// Decides which secret each request is sent with. Nothing is cached: every
/// call re-resolves from the configured defaults and the ambient identity.
#[derive(Clone)]
pub struct CredentialResolver {
    default_api_key: Option<String>,
    project_id_override: Option<String>,
    identity: Arc<dyn AmbientIdentity>,
}

impl CredentialResolver {
    pub fn new(config: &GatewayConfig, identity: Arc<dyn AmbientIdentity>) -> Self {
        Self {
            default_api_key: non_blank(config.default_api_key.as_deref()),
            project_id_override: non_blank(config.google_project_id.as_deref()),
            identity,
        }
    }

    /// Caller-supplied key first, then the configured default.
    pub fn resolve_static_key(
        &self,
        caller_api_key: Option<&str>,
    ) -> Result<ResolvedCredentials, GatewayError> {
        non_blank(caller_api_key)
            .or_else(|| self.default_api_key.clone())
            .map(|value| ResolvedCredentials::StaticKey { value })
            .ok_or_else(GatewayError::missing_credentials)
    }

    pub async fn resolve_cloud_token(&self) -> Result<ResolvedCredentials, GatewayError> {
        let token = self.identity.access_token().await.map_err(|err| {
            warn!(error = %err, "ambient cloud identity unavailable");
            if err.is_discovery_failure() {
                GatewayError::auth_config(
                    "Google Cloud authentication failed. Please configure Application Default Credentials.",
                )
            } else {
                GatewayError::auth_config(format!("Google Cloud authentication failed: {err}"))
            }
        })?;

        let project_id = self
            .project_id_override
            .clone()
            .or(token.project_id)
            .ok_or_else(GatewayError::missing_project_id)?;

        Ok(ResolvedCredentials::CloudToken {
            access_token: token.access_token,
            project_id,
            expires_at: token.expires_at,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
