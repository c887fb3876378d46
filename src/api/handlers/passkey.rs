//! Passkey verification endpoint.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use super::types::{VerifyPasskeyRequest, VerifyPasskeyResponse};
use crate::passkey::{PasskeyError, PasskeyGate, VerifyOutcome};

#[utoipa::path(
    post,
    path = "/v1/auth/passkey/verify",
    request_body = VerifyPasskeyRequest,
    responses(
        (status = 200, description = "Passkey verified", body = VerifyPasskeyResponse),
        (status = 400, description = "Malformed identity or code", body = VerifyPasskeyResponse),
        (status = 401, description = "Invalid passkey", body = VerifyPasskeyResponse),
        (status = 403, description = "Account suspended", body = VerifyPasskeyResponse),
        (status = 500, description = "Internal error", body = VerifyPasskeyResponse)
    ),
    tag = "auth"
)]
pub async fn verify(
    gate: Extension<Arc<PasskeyGate>>,
    payload: Option<Json<VerifyPasskeyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match gate.verify(&request.email, &request.passkey).await {
        Ok(outcome) => verify_response(outcome),
        Err(PasskeyError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(VerifyPasskeyResponse::message(&message)),
        )
            .into_response(),
        Err(err) => {
            error!("passkey verification failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyPasskeyResponse::message("Error fetching user data")),
            )
                .into_response()
        }
    }
}

/// Map a terminal outcome onto the wire contract. `NoSecret` deliberately
/// shares the invalid-code body so responses cannot be used to probe which
/// accounts exist.
fn verify_response(outcome: VerifyOutcome) -> Response {
    match outcome {
        VerifyOutcome::Verified => (
            StatusCode::OK,
            Json(VerifyPasskeyResponse::message("Passkey verified successfully")),
        )
            .into_response(),
        VerifyOutcome::Suspended { .. } => (
            StatusCode::FORBIDDEN,
            Json(VerifyPasskeyResponse {
                suspended: Some(true),
                ..VerifyPasskeyResponse::message(
                    "Your account is suspended for 1 minute. Try again later.",
                )
            }),
        )
            .into_response(),
        VerifyOutcome::InvalidSuspended { .. } => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyPasskeyResponse {
                suspended: Some(true),
                ..VerifyPasskeyResponse::message(
                    "Invalid passkey. Your account is suspended for 1 minute.",
                )
            }),
        )
            .into_response(),
        VerifyOutcome::InvalidLastAttempt => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyPasskeyResponse {
                last_attempt: Some(true),
                ..VerifyPasskeyResponse::message("Invalid passkey. Last attempt before suspension.")
            }),
        )
            .into_response(),
        VerifyOutcome::NoSecret | VerifyOutcome::InvalidRetry { .. } => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyPasskeyResponse {
                retry: Some(true),
                ..VerifyPasskeyResponse::message("Invalid passkey. Please try again.")
            }),
        )
            .into_response(),
    }
}
