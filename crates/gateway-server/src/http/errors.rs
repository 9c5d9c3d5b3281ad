use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use gateway_core::gateway::{GatewayError, NormalizedResponse};
use gateway_core::models::ErrorResponse;
use tracing::warn;

pub(super) fn normalized_response(response: NormalizedResponse) -> Response {
    (response.status, Json(response.body)).into_response()
}

pub(super) fn gateway_error_response(err: GatewayError) -> Response {
    (
        err.status,
        Json(ErrorResponse {
            error: err.message,
        }),
    )
        .into_response()
}

/// Every unreadable body is the caller's input error, whatever axum's own
/// rejection status would have been.
pub(super) fn json_rejection_response(rejection: JsonRejection) -> Response {
    warn!(error = %rejection, status = rejection.status().as_u16(), "rejected request body");
    gateway_error_response(GatewayError::invalid_input(rejection.body_text()))
}
