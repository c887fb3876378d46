//! Passkey (TOTP second-factor) verification and enrollment.
//!
//! Flow Overview:
//! 1) A verification request enters [`gate::PasskeyGate`], which checks the
//!    in-memory suspension state before anything else.
//! 2) The shared secret is fetched from the [`store::SecretStore`]; a missing
//!    secret is reported without touching the failure counter.
//! 3) [`totp::TotpVerifier`] checks the submitted code against the current
//!    time step plus a bounded drift window.
//! 4) The outcome is recorded in the [`ledger::AttemptLedger`]; the third
//!    consecutive failure suspends the identity for a fixed window and the
//!    suspension is persisted best-effort.
//!
//! Security boundaries:
//! - Failure counting is atomic per identity; concurrent requests for the
//!   same identity cannot skip the suspension threshold.
//! - Code comparison is constant-time across the drift window.
//! - A missing secret and a wrong code produce the same caller-facing
//!   rejection to avoid account enumeration.

pub(crate) mod enroll;
pub(crate) mod error;
pub(crate) mod gate;
pub(crate) mod ledger;
pub(crate) mod repo;
pub(crate) mod store;
pub(crate) mod totp;

pub use enroll::{EnrollOutcome, EnrollmentWorkflow};
pub use error::PasskeyError;
pub use gate::{PasskeyGate, VerifyOutcome};
pub use ledger::{AttemptLedger, Failure, InMemoryAttemptLedger, Suspension};
pub use repo::{OutboxNotifier, PgEnrollmentStore, PgSecretStore};
pub use store::{
    EnrollmentRecord, EnrollmentStatus, EnrollmentStore, Notifier, SecretStore, SecurityQuestions,
};
pub use totp::TotpVerifier;

use regex::Regex;

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_SUSPENSION_SECONDS: i64 = 60;
const DEFAULT_DRIFT_WINDOW: u8 = 1;
const DEFAULT_LEDGER_TTL_SECONDS: i64 = 24 * 60 * 60;
const ENV_FAILURE_THRESHOLD: &str = "AUTHFLOW_FAILURE_THRESHOLD";
const ENV_SUSPENSION_SECONDS: &str = "AUTHFLOW_SUSPENSION_SECONDS";

/// Passkey configuration loaded at startup.
#[derive(Clone, Copy, Debug)]
pub struct PasskeyConfig {
    failure_threshold: u32,
    suspension_seconds: i64,
    drift_window: u8,
    ledger_ttl_seconds: i64,
}

impl PasskeyConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            suspension_seconds: DEFAULT_SUSPENSION_SECONDS,
            drift_window: DEFAULT_DRIFT_WINDOW,
            ledger_ttl_seconds: DEFAULT_LEDGER_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_suspension_seconds(mut self, seconds: i64) -> Self {
        self.suspension_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_drift_window(mut self, steps: u8) -> Self {
        self.drift_window = steps;
        self
    }

    #[must_use]
    pub fn with_ledger_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ledger_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    #[must_use]
    pub fn suspension_seconds(&self) -> i64 {
        self.suspension_seconds
    }

    #[must_use]
    pub fn drift_window(&self) -> u8 {
        self.drift_window
    }

    #[must_use]
    pub fn ledger_ttl_seconds(&self) -> i64 {
        self.ledger_ttl_seconds
    }

    /// Load passkey configuration from environment variables, falling back to
    /// the defaults (threshold 3, 60 second suspension).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(threshold) = parse_u32_env(ENV_FAILURE_THRESHOLD) {
            config = config.with_failure_threshold(threshold);
        }
        if let Some(seconds) = parse_i64_env(ENV_SUSPENSION_SECONDS) {
            config = config.with_suspension_seconds(seconds);
        }
        config
    }
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u32_env(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

fn parse_i64_env(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

/// Normalize an identity for lookup: trim and lowercase, then check the shape.
///
/// Identities are email addresses; every table keys on the normalized form so
/// lookups stay consistent across verification and enrollment.
pub(crate) fn normalize_identity(identity: &str) -> Result<String, PasskeyError> {
    let normalized = identity.trim().to_lowercase();
    let shape = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .is_ok_and(|regex| regex.is_match(&normalized));
    if shape {
        Ok(normalized)
    } else {
        Err(PasskeyError::Validation("malformed identity".to_string()))
    }
}

/// A submitted code must be exactly `digits` ASCII digits.
pub(crate) fn validate_code(code: &str, digits: usize) -> Result<(), PasskeyError> {
    if code.len() == digits && code.bytes().all(|byte| byte.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PasskeyError::Validation("malformed passkey code".to_string()))
    }
}
