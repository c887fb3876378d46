//! Enrollment endpoints.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use super::types::{EnrollRequest, EnrollResponse, EnrolledParams, EnrolledResponse};
use crate::passkey::{
    EnrollOutcome, EnrollmentStore, EnrollmentWorkflow, PasskeyError, SecurityQuestions,
};

const DEFAULT_IDP: &str = "local";

#[utoipa::path(
    post,
    path = "/v1/auth/enroll",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrolled or declined", body = EnrollResponse),
        (status = 400, description = "Already enrolled or invalid input", body = EnrollResponse),
        (status = 500, description = "Internal error", body = EnrollResponse)
    ),
    tag = "auth"
)]
pub async fn enroll(
    workflow: Extension<Arc<EnrollmentWorkflow>>,
    payload: Option<Json<EnrollRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let questions = SecurityQuestions {
        question1: request.question1,
        answer1: request.answer1,
        question2: request.question2,
        answer2: request.answer2,
        question3: request.question3,
        answer3: request.answer3,
    };
    let idp = request.idp.as_deref().unwrap_or(DEFAULT_IDP);

    match workflow
        .enroll(&request.email, &request.password, idp, &questions)
        .await
    {
        Ok(outcome) => enroll_response(&outcome),
        Err(PasskeyError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(EnrollResponse { message }),
        )
            .into_response(),
        Err(err) => {
            error!("enrollment failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(EnrollResponse {
                    message: "Error enrolling in AuthFlow Authenticator".to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn enroll_response(outcome: &EnrollOutcome) -> Response {
    match outcome {
        EnrollOutcome::Enrolled => (
            StatusCode::OK,
            Json(EnrollResponse {
                message: "Check your email for the enrollment PIN.".to_string(),
            }),
        )
            .into_response(),
        EnrollOutcome::AlreadyEnrolled => (
            StatusCode::BAD_REQUEST,
            Json(EnrollResponse {
                message: "User is already enrolled in AuthFlow Authenticator".to_string(),
            }),
        )
            .into_response(),
        EnrollOutcome::Declined => (
            StatusCode::OK,
            Json(EnrollResponse {
                message: "You choose to not enroll in AuthFlow".to_string(),
            }),
        )
            .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/enrolled",
    params(
        ("email" = String, Query, description = "Identity to check")
    ),
    responses(
        (status = 200, description = "Enrollment status", body = EnrolledResponse),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn enrolled(
    store: Extension<Arc<dyn EnrollmentStore>>,
    params: Query<EnrolledParams>,
) -> Response {
    match store.get(params.email.trim().to_lowercase().as_str()).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(EnrolledResponse {
                is_enrolled: record.status == crate::passkey::EnrollmentStatus::Enrolled,
            }),
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "User not found").into_response(),
        Err(err) => {
            error!("enrollment status lookup failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
