//! Redelivery Guard
//!
//! Stripe retries deliveries it did not see acknowledged, so the same event
//! ID can arrive more than once, sometimes concurrently. An ID is claimed
//! before dispatch and released afterwards; only successfully dispatched IDs
//! are remembered, so a failed dispatch stays eligible for retry.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::{PaymentError, Result};

/// Default number of event IDs remembered
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Outcome of trying to claim an event ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the event and must call [`RedeliveryGuard::finish`]
    Claimed,
    /// Another delivery of the same event is being dispatched right now
    InFlight,
    /// The event was already dispatched successfully
    Processed,
}

#[derive(Default)]
struct Seen {
    processed: HashSet<String>,
    order: VecDeque<String>,
    in_flight: HashSet<String>,
}

/// Bounded FIFO set of processed event IDs plus the IDs being dispatched
pub struct RedeliveryGuard {
    seen: Mutex<Seen>,
    capacity: usize,
}

impl Default for RedeliveryGuard {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RedeliveryGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(Seen::default()),
            capacity: capacity.max(1),
        }
    }

    /// Claim an event for dispatch
    ///
    /// Events without an ID cannot be deduplicated and are always claimed.
    pub fn begin(&self, event_id: &str) -> Result<Claim> {
        if event_id.is_empty() {
            return Ok(Claim::Claimed);
        }

        let mut seen = self.lock()?;
        if seen.processed.contains(event_id) {
            return Ok(Claim::Processed);
        }
        if !seen.in_flight.insert(event_id.to_string()) {
            return Ok(Claim::InFlight);
        }
        Ok(Claim::Claimed)
    }

    /// Release a claimed event, remembering it when dispatch succeeded
    pub fn finish(&self, event_id: &str, success: bool) -> Result<()> {
        if event_id.is_empty() {
            return Ok(());
        }

        let mut seen = self.lock()?;
        seen.in_flight.remove(event_id);
        if !success || !seen.processed.insert(event_id.to_string()) {
            return Ok(());
        }
        seen.order.push_back(event_id.to_string());

        while seen.order.len() > self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.processed.remove(&oldest);
            }
        }
        Ok(())
    }

    /// Number of remembered IDs
    pub fn len(&self) -> usize {
        self.seen.lock().map_or(0, |s| s.order.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Seen>> {
        self.seen
            .lock()
            .map_err(|_| PaymentError::Storage("redelivery guard lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_dispatch_is_remembered() {
        let guard = RedeliveryGuard::default();
        assert_eq!(guard.begin("evt_1").unwrap(), Claim::Claimed);
        guard.finish("evt_1", true).unwrap();

        assert_eq!(guard.begin("evt_1").unwrap(), Claim::Processed);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_second_claim_while_in_flight() {
        let guard = RedeliveryGuard::default();
        assert_eq!(guard.begin("evt_1").unwrap(), Claim::Claimed);
        assert_eq!(guard.begin("evt_1").unwrap(), Claim::InFlight);
    }

    #[test]
    fn test_failed_dispatch_released_for_retry() {
        let guard = RedeliveryGuard::default();
        guard.begin("evt_1").unwrap();
        guard.finish("evt_1", false).unwrap();

        assert!(guard.is_empty());
        assert_eq!(guard.begin("evt_1").unwrap(), Claim::Claimed);
    }

    #[test]
    fn test_evicts_oldest() {
        let guard = RedeliveryGuard::new(2);
        for id in ["evt_1", "evt_2", "evt_3"] {
            guard.begin(id).unwrap();
            guard.finish(id, true).unwrap();
        }

        assert_eq!(guard.begin("evt_1").unwrap(), Claim::Claimed);
        assert_eq!(guard.begin("evt_2").unwrap(), Claim::Processed);
        assert_eq!(guard.begin("evt_3").unwrap(), Claim::Processed);
    }

    #[test]
    fn test_empty_id_never_remembered() {
        let guard = RedeliveryGuard::default();
        assert_eq!(guard.begin("").unwrap(), Claim::Claimed);
        guard.finish("", true).unwrap();
        assert!(guard.is_empty());
        assert_eq!(guard.begin("").unwrap(), Claim::Claimed);
    }
}
