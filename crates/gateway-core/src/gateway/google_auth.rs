//! Ambient Google Cloud identity discovery, in the order used by Application
//! Default Credentials: explicit credentials file, gcloud well-known file,
//! then the compute metadata server.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CloudIdentityConfig;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";
const METADATA_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub type AmbientIdentityFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CloudAccessToken, IdentityError>> + Send + 'a>>;

/// Source of OAuth access tokens taken from the execution environment.
pub trait AmbientIdentity: Send + Sync {
    fn access_token<'a>(&'a self) -> AmbientIdentityFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct CloudAccessToken {
    pub access_token: String,
    /// Project discovered alongside the identity, if any.
    pub project_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no application default credentials were found")]
    NotConfigured,
    #[error("credentials file {path} is unusable: {message}")]
    InvalidCredentialsFile { path: String, message: String },
    #[error("unsupported credentials type {0}")]
    UnsupportedCredentialType(String),
    #[error("failed to sign service account assertion: {0}")]
    Signing(String),
    #[error("token endpoint unavailable: {0}")]
    TokenRequestUnavailable(String),
    #[error("token endpoint rejected the request with status {status}")]
    TokenRequestRejected {
        status: u16,
        oauth_error: Option<String>,
    },
    #[error("token endpoint returned an invalid payload: {0}")]
    TokenResponseInvalid(String),
}

impl IdentityError {
    /// True when no identity could be discovered at all, as opposed to an
    /// identity that was found but could not produce a token.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured
                | Self::InvalidCredentialsFile { .. }
                | Self::UnsupportedCredentialType(_)
        )
    }
}

#[derive(Clone)]
pub struct GoogleDefaultIdentity {
    client: reqwest::Client,
    config: CloudIdentityConfig,
}

impl GoogleDefaultIdentity {
    pub fn new(client: reqwest::Client, config: CloudIdentityConfig) -> Self {
        Self { client, config }
    }

    async fn discover(&self) -> Result<CredentialSource, IdentityError> {
        if let Some(path) = &self.config.credentials_file {
            debug!(path = %path.display(), "using explicit credentials file");
            return read_credentials_file(path).await.map(CredentialSource::File);
        }

        if let Some(path) = &self.config.well_known_credentials_file
            && tokio::fs::try_exists(path).await.unwrap_or(false)
        {
            debug!(path = %path.display(), "using gcloud well-known credentials file");
            return read_credentials_file(path).await.map(CredentialSource::File);
        }

        if let Some(host) = &self.config.metadata_host
            && let Some(project_id) = self.probe_metadata_server(host).await
        {
            debug!(host = %host, "using compute metadata server identity");
            return Ok(CredentialSource::MetadataServer {
                host: host.clone(),
                project_id,
            });
        }

        Err(IdentityError::NotConfigured)
    }

    async fn probe_metadata_server(&self, host: &str) -> Option<Option<String>> {
        let response = self
            .client
            .get(format!("http://{host}/computeMetadata/v1/project/project-id"))
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .timeout(METADATA_PROBE_TIMEOUT)
            .send()
            .await
            .ok()?;

        let flavor_matches = response
            .headers()
            .get(METADATA_FLAVOR_HEADER)
            .and_then(|value| value.to_str().ok())
            == Some(METADATA_FLAVOR);
        if !flavor_matches {
            return None;
        }

        if !response.status().is_success() {
            return Some(None);
        }

        let project_id = response.text().await.ok().and_then(non_empty_trimmed);
        Some(project_id)
    }

    async fn fetch_token(&self, source: CredentialSource) -> Result<CloudAccessToken, IdentityError> {
        match source {
            CredentialSource::File(CredentialsFile::ServiceAccount(key)) => {
                let token_url = key
                    .token_uri
                    .clone()
                    .unwrap_or_else(|| self.config.token_url.clone());
                let assertion = sign_service_account_assertion(&key, &token_url, Utc::now())?;
                let token = self
                    .exchange(
                        &token_url,
                        &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                    )
                    .await?;
                Ok(self.finish(token, key.project_id))
            }
            CredentialSource::File(CredentialsFile::AuthorizedUser(user)) => {
                let token_url = user
                    .token_uri
                    .clone()
                    .unwrap_or_else(|| self.config.token_url.clone());
                let token = self
                    .exchange(
                        &token_url,
                        &[
                            ("grant_type", "refresh_token"),
                            ("client_id", user.client_id.as_str()),
                            ("client_secret", user.client_secret.as_str()),
                            ("refresh_token", user.refresh_token.as_str()),
                        ],
                    )
                    .await?;
                Ok(self.finish(token, user.quota_project_id))
            }
            CredentialSource::MetadataServer { host, project_id } => {
                let response = self
                    .client
                    .get(format!(
                        "http://{host}/computeMetadata/v1/instance/service-accounts/default/token"
                    ))
                    .query(&[("scopes", CLOUD_PLATFORM_SCOPE)])
                    .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
                    .send()
                    .await
                    .map_err(|err| {
                        IdentityError::TokenRequestUnavailable(err.without_url().to_string())
                    })?;
                let token = read_token_response(response).await?;
                Ok(self.finish(token, project_id))
            }
        }
    }

    async fn exchange(
        &self,
        token_url: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, IdentityError> {
        let response = self
            .client
            .post(token_url)
            .form(form)
            .send()
            .await
            .map_err(|err| IdentityError::TokenRequestUnavailable(err.without_url().to_string()))?;

        read_token_response(response).await
    }

    fn finish(&self, token: TokenResponse, identity_project_id: Option<String>) -> CloudAccessToken {
        let lifetime = token
            .expires_in
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

        CloudAccessToken {
            access_token: token.access_token,
            project_id: self
                .config
                .environment_project_id
                .clone()
                .or(identity_project_id.and_then(non_empty_trimmed)),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        }
    }
}

impl AmbientIdentity for GoogleDefaultIdentity {
    fn access_token<'a>(&'a self) -> AmbientIdentityFuture<'a> {
        Box::pin(async move {
            let source = self.discover().await?;
            let token = self.fetch_token(source).await?;
            info!(
                has_project_id = token.project_id.is_some(),
                expires_at = %token.expires_at,
                "obtained cloud access token"
            );
            Ok(token)
        })
    }
}

enum CredentialSource {
    File(CredentialsFile),
    MetadataServer {
        host: String,
        project_id: Option<String>,
    },
}

enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    project_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorizedUserCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    quota_project_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
}

async fn read_credentials_file(path: &Path) -> Result<CredentialsFile, IdentityError> {
    let invalid = |message: String| IdentityError::InvalidCredentialsFile {
        path: path.display().to_string(),
        message,
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| invalid(err.to_string()))?;
    let value = serde_json::from_str::<Value>(&raw).map_err(|err| invalid(err.to_string()))?;

    let credential_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match credential_type.as_str() {
        "service_account" => serde_json::from_value(value)
            .map(CredentialsFile::ServiceAccount)
            .map_err(|err| invalid(err.to_string())),
        "authorized_user" => serde_json::from_value(value)
            .map(CredentialsFile::AuthorizedUser)
            .map_err(|err| invalid(err.to_string())),
        "" => Err(invalid("missing credentials type".to_string())),
        _ => Err(IdentityError::UnsupportedCredentialType(credential_type)),
    }
}

fn sign_service_account_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String, IdentityError> {
    let issued_at = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: audience,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECONDS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|err| IdentityError::Signing(err.to_string()))?;
    encode(&header, &claims, &encoding_key).map_err(|err| IdentityError::Signing(err.to_string()))
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, IdentityError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let oauth_error = serde_json::from_str::<OAuthErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error);
        return Err(IdentityError::TokenRequestRejected {
            status: status.as_u16(),
            oauth_error,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|err| IdentityError::TokenResponseInvalid(err.without_url().to_string()))
}

fn non_empty_trimmed(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
