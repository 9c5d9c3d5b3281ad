use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use gateway_core::config::{CloudIdentityConfig, GatewayConfig, UpstreamConfig};
use gateway_core::gateway::{
    AmbientIdentity, AmbientIdentityFuture, CloudAccessToken, GatewayService, IdentityError,
    UpstreamInvoker,
};
use gateway_server::http::{AppState, build_router};

pub const TEST_ACCESS_TOKEN: &str = "ya29.integration-token";
pub const TEXT_API_PATH: &str = "/v1beta/models";
pub const IMAGE_API_PATH: &str = "/v1";

#[derive(Debug, Clone, Copy)]
pub enum IdentityOutcome {
    Token { project_id: Option<&'static str> },
    NotConfigured,
}

/// Ambient identity double that counts how often a token was requested.
pub struct TestIdentity {
    outcome: IdentityOutcome,
    calls: AtomicUsize,
}

impl TestIdentity {
    pub fn new(outcome: IdentityOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AmbientIdentity for TestIdentity {
    fn access_token<'a>(&'a self) -> AmbientIdentityFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                IdentityOutcome::Token { project_id } => Ok(CloudAccessToken {
                    access_token: TEST_ACCESS_TOKEN.to_string(),
                    project_id: project_id.map(ToString::to_string),
                    expires_at: Utc::now() + Duration::minutes(30),
                }),
                IdentityOutcome::NotConfigured => Err(IdentityError::NotConfigured),
            }
        })
    }
}

pub struct TestGatewayOptions {
    pub default_api_key: Option<&'static str>,
    pub google_project_id: Option<&'static str>,
    pub static_dir: Option<PathBuf>,
}

impl Default for TestGatewayOptions {
    fn default() -> Self {
        Self {
            default_api_key: Some("server-key"),
            google_project_id: None,
            static_dir: None,
        }
    }
}

pub fn test_config(upstream_base_url: &str, options: &TestGatewayOptions) -> GatewayConfig {
    GatewayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        static_dir: options.static_dir.clone(),
        default_api_key: options.default_api_key.map(ToString::to_string),
        google_project_id: options.google_project_id.map(ToString::to_string),
        upstream: UpstreamConfig {
            text_api_base_url: format!("{upstream_base_url}{TEXT_API_PATH}"),
            image_api_base_url: format!("{upstream_base_url}{IMAGE_API_PATH}"),
            image_location: "us-central1".to_string(),
            image_model: "imagen@006".to_string(),
            default_text_model: "gemini-1.5-flash-latest".to_string(),
            chat_model: "gemini-1.5-flash-latest".to_string(),
            timeout_ms: 5_000,
        },
        cloud_identity: CloudIdentityConfig {
            credentials_file: None,
            well_known_credentials_file: None,
            environment_project_id: None,
            token_url: format!("{upstream_base_url}/token"),
            metadata_host: None,
        },
    }
}

pub fn build_test_router(
    upstream_base_url: &str,
    options: TestGatewayOptions,
    identity: Arc<TestIdentity>,
) -> axum::Router {
    let config = test_config(upstream_base_url, &options);
    let http_client = UpstreamInvoker::build_client(config.upstream.timeout_ms)
        .expect("http client should initialize");

    build_router(AppState {
        gateway: GatewayService::new(&config, http_client, identity),
        static_dir: config.static_dir.clone(),
    })
}
