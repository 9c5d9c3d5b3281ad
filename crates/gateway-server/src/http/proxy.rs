use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use gateway_core::gateway::GenerationRequest;
use serde_json::Value;

use super::errors::{gateway_error_response, json_rejection_response, normalized_response};
use super::{AppState, caller_api_key};

pub(super) async fn proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let request = match GenerationRequest::text(payload) {
        Ok(request) => request.with_caller_api_key(caller_api_key(&headers)),
        Err(err) => return gateway_error_response(err),
    };

    match state.gateway.dispatch(request).await {
        Ok(response) => normalized_response(response),
        Err(err) => gateway_error_response(err),
    }
}
