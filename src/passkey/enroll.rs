//! Enrollment decision flow.
//!
//! A request regenerates the full credential set (salt, salted password
//! hash, one-time PIN) on every pass through the workflow; PINs are never
//! reused between attempts. The notifier only fires after the record write
//! committed, so a failed write can never leak a PIN for state that does not
//! exist.

use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::PasskeyError;
use super::store::{
    EnrollmentRecord, EnrollmentStatus, EnrollmentStore, Notifier, SecurityQuestions,
};
use super::normalize_identity;

const SALT_BYTES: usize = 16;
const PIN_MIN: u32 = 10_000_000;
const PIN_MAX_EXCLUSIVE: u32 = 100_000_000;

/// Terminal outcome of one enrollment call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollOutcome {
    /// Record written with enrollment on; the PIN is on its way.
    Enrolled,
    /// An enrolled record already exists; nothing was mutated.
    AlreadyEnrolled,
    /// A record that previously declined enrollment stays declined. Its
    /// credentials are regenerated but no questions are stored and no PIN is
    /// sent.
    Declined,
}

/// Orchestrates enrollment lookups, credential generation, and notification.
pub struct EnrollmentWorkflow {
    store: Arc<dyn EnrollmentStore>,
    notifier: Arc<dyn Notifier>,
}

impl EnrollmentWorkflow {
    #[must_use]
    pub fn new(store: Arc<dyn EnrollmentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Run the enrollment decision for an identity.
    ///
    /// # Errors
    /// `Validation` for a malformed identity or empty password;
    /// `Persistence` when the store or notifier fails. A store failure aborts
    /// before the notifier is invoked.
    pub async fn enroll(
        &self,
        identity: &str,
        password: &str,
        idp: &str,
        questions: &SecurityQuestions,
    ) -> Result<EnrollOutcome, PasskeyError> {
        let identity = normalize_identity(identity)?;
        if password.is_empty() {
            return Err(PasskeyError::Validation("missing password".to_string()));
        }

        let existing = self
            .store
            .get(&identity)
            .await
            .map_err(PasskeyError::Persistence)?;

        let status = existing.map(|record| record.status);
        match status {
            Some(EnrollmentStatus::Enrolled) => {
                info!(identity = %identity, "enrollment rejected, already enrolled");
                Ok(EnrollOutcome::AlreadyEnrolled)
            }
            Some(EnrollmentStatus::Declined) => {
                let record =
                    issue_credentials(&identity, password, idp, EnrollmentStatus::Declined)?;
                self.store
                    .upsert(&record, None)
                    .await
                    .map_err(PasskeyError::Persistence)?;
                warn!(identity = %identity, "identity previously declined enrollment");
                Ok(EnrollOutcome::Declined)
            }
            Some(EnrollmentStatus::Unset) | None => {
                let record =
                    issue_credentials(&identity, password, idp, EnrollmentStatus::Enrolled)?;
                self.store
                    .upsert(&record, Some(questions))
                    .await
                    .map_err(PasskeyError::Persistence)?;
                self.notifier
                    .send_enrollment_code(&identity, &record.pin)
                    .await
                    .map_err(PasskeyError::Persistence)?;
                info!(identity = %identity, idp = %record.idp, "identity enrolled");
                Ok(EnrollOutcome::Enrolled)
            }
        }
    }
}

/// Generate a fresh credential set: random salt, `SHA-256(password || salt)`,
/// and an 8-digit uniformly random PIN.
fn issue_credentials(
    identity: &str,
    password: &str,
    idp: &str,
    status: EnrollmentStatus,
) -> Result<EnrollmentRecord, PasskeyError> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|err| PasskeyError::Internal(format!("failed to generate salt: {err}")))?;

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let password_hash = hasher.finalize().to_vec();

    let pin = OsRng.gen_range(PIN_MIN..PIN_MAX_EXCLUSIVE).to_string();

    Ok(EnrollmentRecord {
        identity: identity.to_string(),
        password_hash,
        salt: salt.to_vec(),
        pin,
        idp: idp.to_string(),
        status,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeEnrollmentStore {
        records: Mutex<HashMap<String, EnrollmentRecord>>,
        questions: Mutex<HashMap<String, SecurityQuestions>>,
        fail_writes: bool,
    }

    impl FakeEnrollmentStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                questions: Mutex::new(HashMap::new()),
                fail_writes: false,
            }
        }

        fn with_status(identity: &str, status: EnrollmentStatus) -> Self {
            let store = Self::new();
            store.records.lock().unwrap().insert(
                identity.to_string(),
                EnrollmentRecord {
                    identity: identity.to_string(),
                    password_hash: vec![1; 32],
                    salt: vec![2; 16],
                    pin: "12345678".to_string(),
                    idp: "google-oauth2".to_string(),
                    status,
                },
            );
            store
        }
    }

    #[async_trait]
    impl EnrollmentStore for FakeEnrollmentStore {
        async fn get(&self, identity: &str) -> Result<Option<EnrollmentRecord>> {
            Ok(self.records.lock().unwrap().get(identity).cloned())
        }

        async fn upsert(
            &self,
            record: &EnrollmentRecord,
            questions: Option<&SecurityQuestions>,
        ) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("write failed"));
            }
            self.records
                .lock()
                .unwrap()
                .insert(record.identity.clone(), record.clone());
            if let Some(questions) = questions {
                self.questions
                    .lock()
                    .unwrap()
                    .insert(record.identity.clone(), questions.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_enrollment_code(&self, identity: &str, pin: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((identity.to_string(), pin.to_string()));
            Ok(())
        }
    }

    fn questions() -> SecurityQuestions {
        SecurityQuestions {
            question1: "q1".to_string(),
            answer1: "a1".to_string(),
            question2: "q2".to_string(),
            answer2: "a2".to_string(),
            question3: "q3".to_string(),
            answer3: "a3".to_string(),
        }
    }

    fn workflow(
        store: FakeEnrollmentStore,
    ) -> (Arc<FakeEnrollmentStore>, Arc<RecordingNotifier>, EnrollmentWorkflow) {
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let workflow = EnrollmentWorkflow::new(store.clone(), notifier.clone());
        (store, notifier, workflow)
    }

    #[tokio::test]
    async fn new_identity_enrolls_and_gets_exactly_one_pin() {
        let (store, notifier, workflow) = workflow(FakeEnrollmentStore::new());

        let outcome = workflow
            .enroll("a@x.com", "p", "google-oauth2", &questions())
            .await
            .unwrap();
        assert_eq!(outcome, EnrollOutcome::Enrolled);

        let records = store.records.lock().unwrap();
        let record = records.get("a@x.com").unwrap();
        assert_eq!(record.status, EnrollmentStatus::Enrolled);
        assert_eq!(record.pin.len(), 8);
        assert!(record.pin.bytes().all(|byte| byte.is_ascii_digit()));
        assert_eq!(record.salt.len(), 16);
        assert_eq!(record.password_hash.len(), 32);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("a@x.com".to_string(), record.pin.clone()));

        assert!(store.questions.lock().unwrap().contains_key("a@x.com"));
    }

    #[tokio::test]
    async fn enrolled_identity_is_rejected_without_mutation() {
        let (store, notifier, workflow) =
            workflow(FakeEnrollmentStore::with_status("a@x.com", EnrollmentStatus::Enrolled));

        let outcome = workflow
            .enroll("a@x.com", "p", "google-oauth2", &questions())
            .await
            .unwrap();
        assert_eq!(outcome, EnrollOutcome::AlreadyEnrolled);

        let records = store.records.lock().unwrap();
        assert_eq!(records.get("a@x.com").unwrap().pin, "12345678");
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn declined_identity_stays_declined_with_fresh_credentials() {
        let (store, notifier, workflow) =
            workflow(FakeEnrollmentStore::with_status("a@x.com", EnrollmentStatus::Declined));

        let outcome = workflow
            .enroll("a@x.com", "p", "google-oauth2", &questions())
            .await
            .unwrap();
        assert_eq!(outcome, EnrollOutcome::Declined);

        let records = store.records.lock().unwrap();
        let record = records.get("a@x.com").unwrap();
        assert_eq!(record.status, EnrollmentStatus::Declined);
        // Credentials rotated, but no questions stored and no PIN sent.
        assert_ne!(record.pin, "12345678");
        assert!(store.questions.lock().unwrap().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unset_record_is_promoted_to_enrolled() {
        let (store, notifier, workflow) =
            workflow(FakeEnrollmentStore::with_status("a@x.com", EnrollmentStatus::Unset));

        let outcome = workflow
            .enroll("a@x.com", "p", "google-oauth2", &questions())
            .await
            .unwrap();
        assert_eq!(outcome, EnrollOutcome::Enrolled);

        let records = store.records.lock().unwrap();
        assert_eq!(records.get("a@x.com").unwrap().status, EnrollmentStatus::Enrolled);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_aborts_before_notification() {
        let mut store = FakeEnrollmentStore::new();
        store.fail_writes = true;
        let (_, notifier, workflow) = workflow(store);

        let result = workflow
            .enroll("a@x.com", "p", "google-oauth2", &questions())
            .await;
        assert!(matches!(result, Err(PasskeyError::Persistence(_))));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_password_is_rejected_up_front() {
        let (store, _, workflow) = workflow(FakeEnrollmentStore::new());

        let result = workflow.enroll("a@x.com", "", "google-oauth2", &questions()).await;
        assert!(matches!(result, Err(PasskeyError::Validation(_))));
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[test]
    fn issued_pins_are_eight_digits_and_vary() {
        let first = issue_credentials("a@x.com", "p", "local", EnrollmentStatus::Enrolled).unwrap();
        let second = issue_credentials("a@x.com", "p", "local", EnrollmentStatus::Enrolled).unwrap();

        for record in [&first, &second] {
            assert_eq!(record.pin.len(), 8);
            let value: u32 = record.pin.parse().unwrap();
            assert!((PIN_MIN..PIN_MAX_EXCLUSIVE).contains(&value));
        }
        // Fresh salt every issue; identical passwords hash differently.
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.password_hash, second.password_hash);
    }

    #[test]
    fn password_hash_binds_password_and_salt() {
        let record = issue_credentials("a@x.com", "p", "local", EnrollmentStatus::Enrolled).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(b"p");
        hasher.update(&record.salt);
        assert_eq!(record.password_hash, hasher.finalize().to_vec());
    }
}
