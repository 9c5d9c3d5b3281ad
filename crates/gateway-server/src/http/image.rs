use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use gateway_core::gateway::{GenerationKind, GenerationRequest};
use serde_json::Value;

use super::AppState;
use super::errors::{gateway_error_response, json_rejection_response, normalized_response};

// The image route authenticates with the ambient cloud identity only, so the
// caller key header is ignored here.
pub(super) async fn image(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match state
        .gateway
        .dispatch(GenerationRequest::new(GenerationKind::Image, payload))
        .await
    {
        Ok(response) => normalized_response(response),
        Err(err) => gateway_error_response(err),
    }
}
