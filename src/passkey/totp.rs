//! Time-based one-time code verification.
//!
//! Codes are SHA-1 HOTP over a 30 second step, six digits, matching the
//! secrets issued to authenticator apps. A submitted code is accepted when it
//! matches the expected code for the evaluation step or any step within the
//! drift window either side. Candidate comparisons are constant-time and
//! every step in the window is always evaluated, so match position does not
//! leak through timing.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use subtle::{Choice, ConstantTimeEq};
use totp_rs::{Algorithm, Secret, TOTP};

use super::error::PasskeyError;

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;

/// Stateless verifier; cheap to copy into the gate.
#[derive(Clone, Copy, Debug)]
pub struct TotpVerifier {
    drift_window: u8,
}

impl TotpVerifier {
    #[must_use]
    pub fn new(drift_window: u8) -> Self {
        Self { drift_window }
    }

    #[must_use]
    pub fn digits(&self) -> usize {
        TOTP_DIGITS
    }

    /// Check a submitted code against the shared secret at `now`.
    ///
    /// # Errors
    /// Returns an error if the stored secret is not valid base32 or the
    /// evaluation time predates the epoch; never for a plain mismatch.
    pub fn verify(
        &self,
        secret: &SecretString,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PasskeyError> {
        let secret_bytes = Secret::Encoded(secret.expose_secret().to_string())
            .to_bytes()
            .map_err(|err| {
                PasskeyError::Internal(format!("stored secret is not valid base32: {err:?}"))
            })?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            self.drift_window,
            TOTP_STEP_SECONDS,
            secret_bytes,
            None,
            "user".to_string(),
        )
        .map_err(|err| PasskeyError::Internal(format!("totp init error: {err:?}")))?;

        let timestamp = u64::try_from(now.timestamp())
            .map_err(|_| PasskeyError::Internal("evaluation time predates the epoch".to_string()))?;

        let span = u64::from(self.drift_window) * TOTP_STEP_SECONDS;
        let mut candidate = timestamp.saturating_sub(span);
        let last = timestamp.saturating_add(span);

        let mut matched = Choice::from(0u8);
        while candidate <= last {
            let expected = totp.generate(candidate);
            matched |= expected.as_bytes().ct_eq(code.as_bytes());
            candidate += TOTP_STEP_SECONDS;
        }

        Ok(matched.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET_BASE32: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    fn secret() -> SecretString {
        SecretString::from(SECRET_BASE32.to_string())
    }

    fn code_at(time: DateTime<Utc>) -> String {
        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            1,
            TOTP_STEP_SECONDS,
            Secret::Encoded(SECRET_BASE32.to_string()).to_bytes().unwrap(),
            None,
            "user".to_string(),
        )
        .unwrap();
        totp.generate(u64::try_from(time.timestamp()).unwrap())
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 27, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_code_for_current_step() {
        let verifier = TotpVerifier::new(1);
        let now = base_time();
        let code = code_at(now);
        assert!(verifier.verify(&secret(), &code, now).unwrap());
    }

    #[test]
    fn accepts_code_within_drift_window() {
        let verifier = TotpVerifier::new(1);
        let now = base_time();
        let code = code_at(now);

        let one_step = chrono::Duration::seconds(i64::try_from(TOTP_STEP_SECONDS).unwrap());
        assert!(verifier.verify(&secret(), &code, now + one_step).unwrap());
        assert!(verifier.verify(&secret(), &code, now - one_step).unwrap());
    }

    #[test]
    fn rejects_code_outside_drift_window() {
        let verifier = TotpVerifier::new(1);
        let now = base_time();
        let code = code_at(now);

        let two_steps = chrono::Duration::seconds(2 * i64::try_from(TOTP_STEP_SECONDS).unwrap());
        assert!(!verifier.verify(&secret(), &code, now + two_steps).unwrap());
        assert!(!verifier.verify(&secret(), &code, now - two_steps).unwrap());
    }

    #[test]
    fn rejects_correct_code_with_wrong_secret() {
        let verifier = TotpVerifier::new(1);
        let now = base_time();
        let code = code_at(now);
        let other = SecretString::from("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string());
        assert!(!verifier.verify(&other, &code, now).unwrap());
    }

    #[test]
    fn rejects_wrong_length_code() {
        let verifier = TotpVerifier::new(1);
        let now = base_time();
        assert!(!verifier.verify(&secret(), "12345", now).unwrap());
    }

    #[test]
    fn rejects_malformed_secret() {
        let verifier = TotpVerifier::new(1);
        let bad = SecretString::from("not base32 at all!!".to_string());
        assert!(verifier.verify(&bad, "123456", base_time()).is_err());
    }
}
