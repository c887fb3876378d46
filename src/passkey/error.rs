use thiserror::Error;

/// Error taxonomy for the passkey core.
///
/// Only conditions that abort a flow are errors. Expected decision results
/// (no secret on file, code mismatch, active suspension) are carried by
/// [`crate::passkey::gate::VerifyOutcome`] and
/// [`crate::passkey::enroll::EnrollOutcome`] so callers can map them to
/// responses without error downcasting.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// Malformed identity, code, or password. Rejected before the ledger or
    /// any collaborator is touched.
    #[error("{0}")]
    Validation(String),
    /// A collaborator (secret store, enrollment store, notifier) failed
    /// during the read or write path.
    #[error("persistence error: {0}")]
    Persistence(anyhow::Error),
    /// Anything unexpected: corrupt stored secret, clock before the epoch.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn validation_displays_message_only() {
        let err = PasskeyError::Validation("invalid identity".to_string());
        assert_eq!(err.to_string(), "invalid identity");
    }

    #[test]
    fn persistence_wraps_source() {
        let err = PasskeyError::Persistence(anyhow!("connection reset"));
        assert_eq!(err.to_string(), "persistence error: connection reset");
    }
}
