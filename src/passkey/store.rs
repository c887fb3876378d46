//! Collaborator interfaces and the enrollment data model.
//!
//! The core never talks to Postgres or an email gateway directly; it goes
//! through these traits so the decision logic stays testable in-process and a
//! deployment can swap implementations at the boundary.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Enrollment state kept as a tri-state: the column is nullable and a row
/// written outside the enrollment flow may carry no decision yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Unset,
    Declined,
    Enrolled,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(false) => Self::Declined,
            Some(true) => Self::Enrolled,
        }
    }

    #[must_use]
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Declined => Some(false),
            Self::Enrolled => Some(true),
        }
    }
}

/// One identity's enrollment credentials. The hash, salt, and PIN are always
/// generated together by the workflow; nothing else writes these fields.
#[derive(Clone, Debug)]
pub struct EnrollmentRecord {
    pub identity: String,
    pub password_hash: Vec<u8>,
    pub salt: Vec<u8>,
    pub pin: String,
    pub idp: String,
    pub status: EnrollmentStatus,
}

/// The three security questions captured at enrollment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityQuestions {
    pub question1: String,
    pub answer1: String,
    pub question2: String,
    pub answer2: String,
    pub question3: String,
    pub answer3: String,
}

/// Read access to enrolled shared secrets, plus the durable suspension flag.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the enrolled secret for an identity. `None` covers both a
    /// missing row and a row without a secret.
    async fn get_secret(&self, identity: &str) -> Result<Option<SecretString>>;

    /// Record a suspension in durable storage. Invoked best-effort after the
    /// in-memory decision; the caller logs and swallows failures.
    async fn persist_suspension(&self, identity: &str, until: DateTime<Utc>) -> Result<()>;
}

/// Lookup and upsert of enrollment records.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn get(&self, identity: &str) -> Result<Option<EnrollmentRecord>>;

    /// Write the record and, when present, the security questions in one
    /// atomic step.
    async fn upsert(
        &self,
        record: &EnrollmentRecord,
        questions: Option<&SecurityQuestions>,
    ) -> Result<()>;
}

/// Delivery of the one-time enrollment code.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_enrollment_code(&self, identity: &str, pin: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_status_round_trips() {
        for status in [
            EnrollmentStatus::Unset,
            EnrollmentStatus::Declined,
            EnrollmentStatus::Enrolled,
        ] {
            assert_eq!(EnrollmentStatus::from_flag(status.as_flag()), status);
        }
    }

    #[test]
    fn security_questions_serialize_flat() {
        let questions = SecurityQuestions {
            question1: "q1".to_string(),
            answer1: "a1".to_string(),
            question2: "q2".to_string(),
            answer2: "a2".to_string(),
            question3: "q3".to_string(),
            answer3: "a3".to_string(),
        };
        let value = serde_json::to_value(&questions).ok();
        let answer = value
            .as_ref()
            .and_then(|value| value.get("answer3"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(answer, Some("a3"));
    }
}
