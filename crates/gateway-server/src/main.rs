use std::net::SocketAddr;
use std::sync::Arc;

use gateway_core::config::{GatewayConfig, load_dotenv};
use gateway_core::gateway::{GatewayService, GoogleDefaultIdentity, UpstreamInvoker};
use gateway_server::http;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "gateway_server=info,gateway_core=info,tower_http=info".to_string()
        }))
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load gateway config");
            std::process::exit(1);
        }
    };

    if config.default_api_key.is_none() {
        warn!("API_KEY is not set; text and chat requests need the caller key header");
    }

    let http_client = match UpstreamInvoker::build_client(config.upstream.timeout_ms) {
        Ok(http_client) => http_client,
        Err(err) => {
            error!(error = %err, "failed to initialize upstream http client");
            std::process::exit(1);
        }
    };

    let identity = Arc::new(GoogleDefaultIdentity::new(
        http_client.clone(),
        config.cloud_identity.clone(),
    ));
    let app = http::build_router(http::AppState {
        gateway: GatewayService::new(&config, http_client, identity),
        static_dir: config.static_dir.clone(),
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, bind_addr = %config.bind_addr, "invalid bind address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, %addr, "failed to bind gateway listener");
            std::process::exit(1);
        }
    };

    info!(
        addr = %listener.local_addr().unwrap_or(addr),
        text_model = %config.upstream.default_text_model,
        image_model = %config.upstream.image_model,
        "aime gateway listening"
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "gateway server exited with error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
