use std::path::PathBuf;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Router, middleware};
use gateway_core::gateway::GatewayService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

mod chat;
mod errors;
mod health;
mod image;
mod observability;
mod proxy;

/// Optional per-request override of the server's default provider key.
pub const CALLER_API_KEY_HEADER: &str = "x-aime-api-key";

#[derive(Clone)]
pub struct AppState {
    pub gateway: GatewayService,
    pub static_dir: Option<PathBuf>,
}

pub fn build_router(app_state: AppState) -> Router {
    let static_dir = app_state.static_dir.clone();

    let api_routes = Router::new()
        .route("/api/proxy", post(proxy::proxy).options(preflight))
        .route("/api/chat", post(chat::chat).options(preflight))
        .route("/api/image", post(image::image).options(preflight))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    let router = Router::new()
        .route("/healthz", get(health::healthz))
        .merge(api_routes);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(middleware::from_fn(
        observability::request_observability_middleware,
    ))
}

/// CORS preflight: empty 200, nothing else runs.
async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

fn caller_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CALLER_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
