use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{
    first_trimmed_env, optional_path_env, optional_trimmed_env, parse_bool_env,
    parse_http_url_env, parse_u64_env,
};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5001";
pub const DEFAULT_TEXT_API_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_IMAGE_API_BASE_URL: &str = "https://us-central1-aiplatform.googleapis.com/v1";
pub const DEFAULT_IMAGE_LOCATION: &str = "us-central1";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen@006";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";

/// Process-wide settings, read once at startup and handed to the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub static_dir: Option<PathBuf>,
    /// Provider key used when the caller does not send `X-AIME-API-Key`.
    pub default_api_key: Option<String>,
    /// Overrides the project discovered from the ambient cloud identity.
    pub google_project_id: Option<String>,
    pub upstream: UpstreamConfig,
    pub cloud_identity: CloudIdentityConfig,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub text_api_base_url: String,
    pub image_api_base_url: String,
    pub image_location: String,
    pub image_model: String,
    pub default_text_model: String,
    pub chat_model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CloudIdentityConfig {
    pub credentials_file: Option<PathBuf>,
    pub well_known_credentials_file: Option<PathBuf>,
    pub environment_project_id: Option<String>,
    pub token_url: String,
    /// `None` disables the metadata server probe.
    pub metadata_host: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Loads `.env` from the working directory when one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: optional_trimmed_env("GATEWAY_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            static_dir: optional_path_env("GATEWAY_STATIC_DIR"),
            default_api_key: optional_trimmed_env("API_KEY"),
            google_project_id: optional_trimmed_env("GOOGLE_PROJECT_ID"),
            upstream: UpstreamConfig::from_env()?,
            cloud_identity: CloudIdentityConfig::from_env()?,
        })
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_text_model = optional_trimmed_env("GATEWAY_DEFAULT_TEXT_MODEL")
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());

        Ok(Self {
            text_api_base_url: parse_http_url_env(
                "GATEWAY_TEXT_API_BASE_URL",
                DEFAULT_TEXT_API_BASE_URL,
            )?,
            image_api_base_url: parse_http_url_env(
                "GATEWAY_IMAGE_API_BASE_URL",
                DEFAULT_IMAGE_API_BASE_URL,
            )?,
            image_location: optional_trimmed_env("GATEWAY_IMAGE_LOCATION")
                .unwrap_or_else(|| DEFAULT_IMAGE_LOCATION.to_string()),
            image_model: optional_trimmed_env("GATEWAY_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            chat_model: optional_trimmed_env("GATEWAY_CHAT_MODEL")
                .unwrap_or_else(|| default_text_model.clone()),
            default_text_model,
            timeout_ms: parse_u64_env("GATEWAY_UPSTREAM_TIMEOUT_MS", DEFAULT_UPSTREAM_TIMEOUT_MS)?,
        })
    }
}

impl CloudIdentityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let metadata_host = if parse_bool_env("NO_GCE_CHECK", false)? {
            None
        } else {
            Some(
                optional_trimmed_env("GCE_METADATA_HOST")
                    .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
            )
        };

        Ok(Self {
            credentials_file: optional_path_env("GOOGLE_APPLICATION_CREDENTIALS"),
            well_known_credentials_file: well_known_credentials_file(),
            environment_project_id: first_trimmed_env(&["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"]),
            token_url: parse_http_url_env("GOOGLE_OAUTH_TOKEN_URL", DEFAULT_OAUTH_TOKEN_URL)?,
            metadata_host,
        })
    }
}

fn well_known_credentials_file() -> Option<PathBuf> {
    if let Some(config_dir) = optional_path_env("CLOUDSDK_CONFIG") {
        return Some(config_dir.join(WELL_KNOWN_CREDENTIALS_FILE));
    }

    optional_path_env("HOME").map(|home| {
        home.join(".config")
            .join("gcloud")
            .join(WELL_KNOWN_CREDENTIALS_FILE)
    })
}
