//! # Authflow (Passkey Second-Factor Authority)
//!
//! `authflow` verifies time-based one-time passkeys as a second factor and
//! guards the enrollment that issues them. It tracks per-identity failure
//! counts, suspends an identity for a fixed window after repeated failures,
//! and resets atomically on success, all under concurrent requests.
//!
//! ## Verification
//!
//! Every verification call is an independent pass through suspension check,
//! secret lookup, TOTP check, and outcome recording. Failure counting is
//! serialized per identity, so concurrent wrong codes cannot slip past the
//! suspension threshold. Suspensions live in process memory and are mirrored
//! to durable storage best-effort for other instances to observe.
//!
//! ## Enrollment
//!
//! Enrollment generates a fresh salted password hash and a one-time 8-digit
//! PIN per attempt, persists them transactionally, and queues the PIN for
//! email delivery through a database outbox. An identity that already holds
//! an enrolled record is rejected; one that previously declined stays
//! declined.
//!
//! ## Abuse resistance
//!
//! A missing secret and a wrong code return the same response to prevent
//! account enumeration, and code comparison is constant-time across the
//! accepted drift window.

pub mod api;
pub mod cli;
pub mod passkey;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
