//! Per-identity failure counting and timed suspension.
//!
//! The ledger owns all mutation of attempt state. It is the synchronization
//! point for concurrent verification requests: the read-modify-write of a
//! failure count happens under a per-identity lock, so two concurrent failed
//! attempts cannot both observe the same count and skip the suspension
//! threshold. The outer table lock is held only for lookup and insertion.
//!
//! Entries are created lazily on first use and evicted once untouched for
//! longer than the configured TTL, so the table stays bounded even when
//! identities never return.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::PasskeyConfig;

/// Result of a suspension check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Suspension {
    pub suspended: bool,
    pub until: Option<DateTime<Utc>>,
}

/// Result of recording a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Failure {
    /// The failure count this attempt reached (the threshold itself when the
    /// attempt triggered a suspension; the stored count is reset to zero).
    pub count: u32,
    pub just_suspended: bool,
    pub attempts_remaining: u32,
    /// Set when this failure started a suspension.
    pub suspended_until: Option<DateTime<Utc>>,
}

/// Attempt state service. Injected behind a trait so a multi-instance
/// deployment can substitute a shared store for the in-process table.
pub trait AttemptLedger: Send + Sync {
    /// Read the current suspension state, creating a zero-value record for
    /// unknown identities. Suspended iff an expiry is set and still in the
    /// future relative to `now`.
    fn check_suspension(&self, identity: &str, now: DateTime<Utc>) -> Suspension;

    /// Reset the failure count and clear any suspension.
    fn record_success(&self, identity: &str);

    /// Increment the failure count; at the threshold, start a suspension and
    /// reset the count for a fresh cycle.
    fn record_failure(&self, identity: &str, now: DateTime<Utc>) -> Failure;
}

#[derive(Debug, Default)]
struct AttemptRecord {
    failures: u32,
    suspended_until: Option<DateTime<Utc>>,
}

struct Slot {
    record: Arc<Mutex<AttemptRecord>>,
    last_seen: DateTime<Utc>,
}

/// Process-wide attempt table keyed by identity.
pub struct InMemoryAttemptLedger {
    threshold: u32,
    suspension: Duration,
    entry_ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl InMemoryAttemptLedger {
    #[must_use]
    pub fn new(config: &PasskeyConfig) -> Self {
        Self {
            threshold: config.failure_threshold(),
            suspension: Duration::seconds(config.suspension_seconds()),
            entry_ttl: Duration::seconds(config.ledger_ttl_seconds()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of identities currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch or create the per-identity record. Stale slots are dropped when
    /// a new identity is inserted, keeping the table bounded.
    fn entry(&self, identity: &str, now: DateTime<Utc>) -> Arc<Mutex<AttemptRecord>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(identity) {
            slot.last_seen = now;
            return Arc::clone(&slot.record);
        }

        let ttl = self.entry_ttl;
        slots.retain(|_, slot| now.signed_duration_since(slot.last_seen) < ttl);

        let record = Arc::new(Mutex::new(AttemptRecord::default()));
        slots.insert(
            identity.to_string(),
            Slot {
                record: Arc::clone(&record),
                last_seen: now,
            },
        );
        record
    }
}

impl AttemptLedger for InMemoryAttemptLedger {
    fn check_suspension(&self, identity: &str, now: DateTime<Utc>) -> Suspension {
        let entry = self.entry(identity, now);
        let record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        match record.suspended_until {
            Some(until) if until > now => Suspension {
                suspended: true,
                until: Some(until),
            },
            _ => Suspension {
                suspended: false,
                until: None,
            },
        }
    }

    fn record_success(&self, identity: &str) {
        let entry = self.entry(identity, Utc::now());
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        record.failures = 0;
        record.suspended_until = None;
    }

    fn record_failure(&self, identity: &str, now: DateTime<Utc>) -> Failure {
        let entry = self.entry(identity, now);
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let count = record.failures.saturating_add(1);
        if count >= self.threshold {
            let until = now + self.suspension;
            record.failures = 0;
            record.suspended_until = Some(until);
            Failure {
                count,
                just_suspended: true,
                attempts_remaining: 0,
                suspended_until: Some(until),
            }
        } else {
            record.failures = count;
            Failure {
                count,
                just_suspended: false,
                attempts_remaining: self.threshold - count,
                suspended_until: None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ledger() -> InMemoryAttemptLedger {
        InMemoryAttemptLedger::new(&PasskeyConfig::new())
    }

    #[test]
    fn unknown_identity_starts_unsuspended() {
        let ledger = ledger();
        let status = ledger.check_suspension("a@x.com", Utc::now());
        assert!(!status.suspended);
        assert_eq!(status.until, None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn third_failure_suspends_and_resets_count() {
        let ledger = ledger();
        let now = Utc::now();

        let first = ledger.record_failure("a@x.com", now);
        assert_eq!(first.count, 1);
        assert_eq!(first.attempts_remaining, 2);
        assert!(!first.just_suspended);

        let second = ledger.record_failure("a@x.com", now);
        assert_eq!(second.count, 2);
        assert_eq!(second.attempts_remaining, 1);

        let third = ledger.record_failure("a@x.com", now);
        assert!(third.just_suspended);
        assert_eq!(third.count, 3);
        assert_eq!(third.suspended_until, Some(now + Duration::seconds(60)));

        // Count restarted at zero for the next cycle.
        let after = ledger.record_failure("a@x.com", now + Duration::seconds(61));
        assert_eq!(after.count, 1);
    }

    #[test]
    fn suspension_expires_with_time() {
        let ledger = ledger();
        let now = Utc::now();
        for _ in 0..3 {
            ledger.record_failure("a@x.com", now);
        }

        let during = ledger.check_suspension("a@x.com", now + Duration::seconds(10));
        assert!(during.suspended);
        assert_eq!(during.until, Some(now + Duration::seconds(60)));

        let after = ledger.check_suspension("a@x.com", now + Duration::seconds(61));
        assert!(!after.suspended);
    }

    #[test]
    fn success_resets_count_and_clears_suspension() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.record_failure("a@x.com", now);
        ledger.record_failure("a@x.com", now);
        ledger.record_success("a@x.com");

        let next = ledger.record_failure("a@x.com", now);
        assert_eq!(next.count, 1);

        for _ in 0..2 {
            ledger.record_failure("a@x.com", now);
        }
        ledger.record_success("a@x.com");
        assert!(!ledger.check_suspension("a@x.com", now).suspended);
    }

    #[test]
    fn identities_are_tracked_independently() {
        let ledger = ledger();
        let now = Utc::now();
        for _ in 0..3 {
            ledger.record_failure("a@x.com", now);
        }
        assert!(ledger.check_suspension("a@x.com", now).suspended);
        assert!(!ledger.check_suspension("b@x.com", now).suspended);
        assert_eq!(ledger.record_failure("b@x.com", now).count, 1);
    }

    #[test]
    fn concurrent_failures_reach_threshold_exactly_once() {
        let ledger = Arc::new(ledger());
        let now = Utc::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.record_failure("a@x.com", now))
            })
            .collect();

        let mut counts: Vec<u32> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .map(|failure| failure.count)
            .collect();
        counts.sort_unstable();

        // Atomic per-identity increments: every attempt observed a distinct
        // count and exactly one reached the threshold.
        assert_eq!(counts, vec![1, 2, 3]);
        assert!(ledger.check_suspension("a@x.com", now).suspended);
    }

    #[test]
    fn stale_entries_are_evicted_on_insert() {
        let ledger = InMemoryAttemptLedger::new(
            &PasskeyConfig::new().with_ledger_ttl_seconds(3600),
        );
        let start = Utc::now();
        ledger.record_failure("old@x.com", start);
        assert_eq!(ledger.len(), 1);

        // A new identity arriving past the TTL sweeps the stale slot.
        ledger.record_failure("new@x.com", start + Duration::seconds(3601));
        assert_eq!(ledger.len(), 1);

        // The evicted identity starts a fresh cycle.
        let fresh = ledger.record_failure("old@x.com", start + Duration::seconds(3602));
        assert_eq!(fresh.count, 1);
    }
}
