use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use gateway_core::gateway::{GenerationKind, GenerationRequest};
use serde_json::Value;

use super::errors::{gateway_error_response, json_rejection_response, normalized_response};
use super::{AppState, caller_api_key};

pub(super) async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let request = GenerationRequest::new(GenerationKind::Chat, payload)
        .with_caller_api_key(caller_api_key(&headers));

    match state.gateway.dispatch(request).await {
        Ok(response) => normalized_response(response),
        Err(err) => gateway_error_response(err),
    }
}
