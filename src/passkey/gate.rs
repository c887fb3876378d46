//! Verification decision flow.
//!
//! One call runs CHECK_SUSPENSION -> LOOKUP_SECRET -> VERIFY_CODE ->
//! RECORD_OUTCOME and returns a terminal [`VerifyOutcome`]. Calls are
//! independent: replaying a request re-enters the flow from the suspension
//! check and is evaluated against whatever state the ledger holds then.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::PasskeyError;
use super::ledger::AttemptLedger;
use super::store::SecretStore;
use super::totp::TotpVerifier;
use super::{normalize_identity, validate_code};

/// Terminal outcome of one verification call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Active suspension; the code was not evaluated and nothing was written.
    Suspended { until: DateTime<Utc> },
    /// No enrolled secret on file. The failure counter is untouched; callers
    /// present this exactly like a wrong code so accounts cannot be
    /// enumerated.
    NoSecret,
    /// Code accepted; the failure count was reset.
    Verified,
    /// Wrong code, attempts left before the warning.
    InvalidRetry { attempts_remaining: u32 },
    /// Wrong code, one attempt left before suspension.
    InvalidLastAttempt,
    /// Wrong code that reached the threshold and started a suspension.
    InvalidSuspended { until: DateTime<Utc> },
}

/// Orchestrates the secret store, attempt ledger, and TOTP check.
pub struct PasskeyGate {
    secrets: Arc<dyn SecretStore>,
    ledger: Arc<dyn AttemptLedger>,
    verifier: TotpVerifier,
}

impl PasskeyGate {
    #[must_use]
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        ledger: Arc<dyn AttemptLedger>,
        verifier: TotpVerifier,
    ) -> Self {
        Self {
            secrets,
            ledger,
            verifier,
        }
    }

    /// Verify a submitted passkey code for an identity.
    ///
    /// # Errors
    /// `Validation` for a malformed identity or code (checked before the
    /// ledger is touched), `Persistence`/`Internal` when the secret lookup
    /// fails. A store timeout or outage is never reported as "no secret".
    pub async fn verify(&self, identity: &str, code: &str) -> Result<VerifyOutcome, PasskeyError> {
        let identity = normalize_identity(identity)?;
        validate_code(code, self.verifier.digits())?;
        self.verify_at(&identity, code, Utc::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome, PasskeyError> {
        let status = self.ledger.check_suspension(identity, now);
        if status.suspended {
            if let Some(until) = status.until {
                warn!(identity = %identity, %until, "passkey attempt while suspended");
                return Ok(VerifyOutcome::Suspended { until });
            }
        }

        let secret = self
            .secrets
            .get_secret(identity)
            .await
            .map_err(PasskeyError::Persistence)?;

        let Some(secret) = secret else {
            info!(identity = %identity, "no enrolled secret on file");
            return Ok(VerifyOutcome::NoSecret);
        };

        if self.verifier.verify(&secret, code, now)? {
            self.ledger.record_success(identity);
            info!(identity = %identity, "passkey verified");
            return Ok(VerifyOutcome::Verified);
        }

        let failure = self.ledger.record_failure(identity, now);
        if failure.just_suspended {
            let until = failure.suspended_until.unwrap_or(now);
            warn!(
                identity = %identity,
                count = failure.count,
                %until,
                "failure threshold reached, suspending"
            );
            // The in-memory decision is authoritative; losing the durable
            // flag only matters to other instances, so log and move on.
            if let Err(err) = self.secrets.persist_suspension(identity, until).await {
                warn!(identity = %identity, "failed to persist suspension: {err}");
            }
            return Ok(VerifyOutcome::InvalidSuspended { until });
        }

        warn!(
            identity = %identity,
            count = failure.count,
            remaining = failure.attempts_remaining,
            "invalid passkey attempt"
        );
        if failure.attempts_remaining == 1 {
            Ok(VerifyOutcome::InvalidLastAttempt)
        } else {
            Ok(VerifyOutcome::InvalidRetry {
                attempts_remaining: failure.attempts_remaining,
            })
        }
    }
}
