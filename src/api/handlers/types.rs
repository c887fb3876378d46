//! Request/response types for the passkey endpoints.
//!
//! Flag names (`suspended`, `lastAttempt`, `retry`) and the enrollment
//! status key (`isEnrolled`) keep the camelCase wire shape existing clients
//! already parse.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyPasskeyRequest {
    pub email: String,
    pub passkey: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPasskeyResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
}

impl VerifyPasskeyResponse {
    pub(crate) fn message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ..Self::default()
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EnrollRequest {
    pub email: String,
    pub password: String,
    /// Identity-provider tag, e.g. `google-oauth2`. Defaults to `local`.
    pub idp: Option<String>,
    pub question1: String,
    pub answer1: String,
    pub question2: String,
    pub answer2: String,
    pub question3: String,
    pub answer3: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EnrollResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledResponse {
    pub is_enrolled: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct EnrolledParams {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn verify_response_skips_unset_flags() -> Result<()> {
        let response = VerifyPasskeyResponse::message("Passkey verified successfully");
        let value = serde_json::to_value(&response)?;
        let object = value.as_object().context("expected object")?;
        assert_eq!(object.len(), 1);
        assert!(object.contains_key("message"));
        Ok(())
    }

    #[test]
    fn verify_response_flags_use_camel_case() -> Result<()> {
        let response = VerifyPasskeyResponse {
            message: "Invalid passkey. Last attempt before suspension.".to_string(),
            last_attempt: Some(true),
            ..VerifyPasskeyResponse::default()
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("lastAttempt").and_then(serde_json::Value::as_bool),
            Some(true)
        );
        Ok(())
    }

    #[test]
    fn enroll_request_round_trips() -> Result<()> {
        let request: EnrollRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "p",
            "question1": "q1", "answer1": "a1",
            "question2": "q2", "answer2": "a2",
            "question3": "q3", "answer3": "a3"
        }))?;
        assert_eq!(request.email, "a@x.com");
        assert_eq!(request.idp, None);
        Ok(())
    }

    #[test]
    fn enrolled_response_uses_camel_case() -> Result<()> {
        let value = serde_json::to_value(EnrolledResponse { is_enrolled: true })?;
        assert_eq!(
            value.get("isEnrolled").and_then(serde_json::Value::as_bool),
            Some(true)
        );
        Ok(())
    }
}
