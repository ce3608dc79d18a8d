//! In-flight request registry
//!
//! Tracks work by the caller's correlation id so a cancel signal can reach it.
//! Each id moves `Accepted -> Completed | Cancelled`. Cancels may arrive before
//! the accept they refer to (the two calls race on separate connections), so
//! a cancel for an unseen id is remembered for `grace` and applied when the
//! accept shows up. Finished ids are remembered for the same window so late
//! cancels for them are recognised as no-ops.
//!
//! All transitions for one id go through a single map entry, which serialises
//! them; different ids never contend.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub id: String,
    pub arrived_at: Instant,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
enum Slot {
    InFlight(InFlightRequest),
    /// Cancel seen before any accept
    CancelledEarly { at: Instant },
    /// Terminal; kept only so late cancels are recognised
    Finished { at: Instant },
}

/// Result of registering work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    /// A cancel for this id was already waiting; the work will be suppressed
    AlreadyCancelled,
    /// The id was already in flight; the existing registration is kept
    Duplicate,
}

/// Result of a cancel signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The id was in flight and is now marked cancelled
    Cancelled,
    /// The id is unknown; the cancel is remembered for a later accept
    Remembered,
    /// The id already finished; nothing to do
    AlreadyFinished,
}

/// What the worker should do with its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Deliver,
    Suppress,
}

#[derive(Debug)]
pub struct RequestRegistry {
    slots: DashMap<String, Slot>,
    grace: Duration,
}

impl RequestRegistry {
    pub fn new(grace: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            grace,
        }
    }

    /// Register work for `id` before it starts.
    pub fn accept(&self, id: &str) -> AcceptOutcome {
        let fresh = |cancelled| {
            Slot::InFlight(InFlightRequest {
                id: id.to_string(),
                arrived_at: Instant::now(),
                cancelled,
            })
        };

        match self.slots.entry(id.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(fresh(false));
                AcceptOutcome::Accepted
            }
            Entry::Occupied(mut entry) => {
                let outcome = match entry.get() {
                    Slot::CancelledEarly { .. } => AcceptOutcome::AlreadyCancelled,
                    Slot::InFlight(_) => AcceptOutcome::Duplicate,
                    Slot::Finished { .. } => AcceptOutcome::Accepted,
                };
                match outcome {
                    AcceptOutcome::AlreadyCancelled => {
                        tracing::info!(request_id = %id, "Accepted request was cancelled before it arrived");
                        entry.insert(fresh(true));
                    }
                    AcceptOutcome::Duplicate => {
                        tracing::warn!(request_id = %id, "Duplicate accept for in-flight request");
                    }
                    AcceptOutcome::Accepted => {
                        tracing::warn!(request_id = %id, "Finished request id resurfaced, treating as new");
                        entry.insert(fresh(false));
                    }
                }
                outcome
            }
        }
    }

    /// Apply a cancel signal for `id`.
    pub fn cancel(&self, id: &str) -> CancelOutcome {
        match self.slots.entry(id.to_string()) {
            Entry::Vacant(entry) => {
                tracing::warn!(request_id = %id, "Cancel for unknown request, remembering it");
                entry.insert(Slot::CancelledEarly { at: Instant::now() });
                CancelOutcome::Remembered
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::InFlight(request) => {
                    request.cancelled = true;
                    CancelOutcome::Cancelled
                }
                Slot::CancelledEarly { .. } => CancelOutcome::Remembered,
                Slot::Finished { .. } => CancelOutcome::AlreadyFinished,
            },
        }
    }

    /// The worker is about to write its response; decide whether it may.
    ///
    /// Either way the id stops being tracked as in flight.
    pub fn finish(&self, id: &str) -> Delivery {
        match self.slots.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let delivery = match entry.get() {
                    Slot::InFlight(request) if request.cancelled => Delivery::Suppress,
                    Slot::InFlight(_) => Delivery::Deliver,
                    Slot::CancelledEarly { .. } => {
                        tracing::warn!(request_id = %id, "Finishing a request that was never accepted");
                        Delivery::Suppress
                    }
                    Slot::Finished { .. } => {
                        tracing::warn!(request_id = %id, "Request finished twice");
                        Delivery::Deliver
                    }
                };
                entry.insert(Slot::Finished { at: Instant::now() });
                delivery
            }
            Entry::Vacant(entry) => {
                tracing::warn!(request_id = %id, "Finishing an untracked request");
                entry.insert(Slot::Finished { at: Instant::now() });
                Delivery::Deliver
            }
        }
    }

    /// Is `id` currently in flight?
    pub fn is_tracked(&self, id: &str) -> bool {
        matches!(
            self.slots.get(id).as_deref(),
            Some(Slot::InFlight(_))
        )
    }

    pub fn in_flight(&self, id: &str) -> Option<InFlightRequest> {
        match self.slots.get(id).as_deref() {
            Some(Slot::InFlight(request)) => Some(request.clone()),
            _ => None,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::InFlight(_)))
            .count()
    }

    /// Remembered cancels still waiting for their accept
    pub fn pending_cancel_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::CancelledEarly { .. }))
            .count()
    }

    /// Drop remembered cancels and finished markers older than the grace period.
    ///
    /// Returns how many entries were purged. In-flight work is never purged.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot {
            Slot::InFlight(_) => true,
            Slot::CancelledEarly { at } | Slot::Finished { at } => {
                now.duration_since(*at) < self.grace
            }
        });
        before.saturating_sub(self.slots.len())
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RequestRegistry {
        RequestRegistry::new(Duration::from_secs(30))
    }

    #[test]
    fn test_accept_then_finish_delivers() {
        let registry = registry();
        assert_eq!(registry.accept("a"), AcceptOutcome::Accepted);
        assert!(registry.is_tracked("a"));
        assert_eq!(registry.in_flight_count(), 1);

        assert_eq!(registry.finish("a"), Delivery::Deliver);
        assert!(!registry.is_tracked("a"));
        assert_eq!(registry.in_flight_count(), 0);
    }

    #[test]
    fn test_cancel_while_in_flight_suppresses() {
        let registry = registry();
        registry.accept("x");
        assert_eq!(registry.cancel("x"), CancelOutcome::Cancelled);
        assert!(registry.in_flight("x").map(|r| r.cancelled).unwrap_or(false));

        assert_eq!(registry.finish("x"), Delivery::Suppress);
        assert!(!registry.is_tracked("x"));
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let registry = registry();
        registry.accept("done");
        assert_eq!(registry.finish("done"), Delivery::Deliver);

        assert_eq!(registry.cancel("done"), CancelOutcome::AlreadyFinished);
        assert_eq!(registry.pending_cancel_count(), 0);
        assert!(!registry.is_tracked("done"));
    }

    #[test]
    fn test_cancel_before_accept_is_remembered() {
        let registry = registry();
        assert_eq!(registry.cancel("y"), CancelOutcome::Remembered);
        assert_eq!(registry.pending_cancel_count(), 1);
        assert!(!registry.is_tracked("y"));

        assert_eq!(registry.accept("y"), AcceptOutcome::AlreadyCancelled);
        assert_eq!(registry.pending_cancel_count(), 0);
        assert_eq!(registry.finish("y"), Delivery::Suppress);
        assert!(!registry.is_tracked("y"));
    }

    #[test]
    fn test_duplicate_accept_keeps_cancellation() {
        let registry = registry();
        registry.accept("d");
        registry.cancel("d");
        assert_eq!(registry.accept("d"), AcceptOutcome::Duplicate);
        assert_eq!(registry.finish("d"), Delivery::Suppress);
    }

    #[test]
    fn test_resurfaced_id_is_treated_as_new() {
        let registry = registry();
        registry.accept("r");
        registry.finish("r");
        assert_eq!(registry.accept("r"), AcceptOutcome::Accepted);
        assert_eq!(registry.finish("r"), Delivery::Deliver);
    }

    #[test]
    fn test_finish_untracked_delivers() {
        let registry = registry();
        assert_eq!(registry.finish("ghost"), Delivery::Deliver);
    }

    #[test]
    fn test_purge_expired_keeps_in_flight() {
        let registry = RequestRegistry::new(Duration::ZERO);
        registry.accept("live");
        registry.cancel("early");
        registry.accept("done");
        registry.finish("done");

        assert_eq!(registry.purge_expired(), 2);
        assert!(registry.is_tracked("live"));
        assert_eq!(registry.pending_cancel_count(), 0);

        // The early cancel expired, so a late accept runs normally
        assert_eq!(registry.accept("early"), AcceptOutcome::Accepted);
    }

    #[test]
    fn test_purge_respects_grace() {
        let registry = registry();
        registry.cancel("early");
        assert_eq!(registry.purge_expired(), 0);
        assert_eq!(registry.pending_cancel_count(), 1);
    }

    #[test]
    fn test_concurrent_cancel_and_finish_pick_one_outcome() {
        use std::sync::Arc;

        for round in 0..200 {
            let registry = Arc::new(registry());
            let id = format!("race-{}", round);
            registry.accept(&id);

            let canceller = {
                let registry = registry.clone();
                let id = id.clone();
                std::thread::spawn(move || registry.cancel(&id))
            };
            let delivery = registry.finish(&id);
            let cancel = canceller.join().unwrap();

            match cancel {
                CancelOutcome::Cancelled => assert_eq!(delivery, Delivery::Suppress),
                CancelOutcome::AlreadyFinished => assert_eq!(delivery, Delivery::Deliver),
                CancelOutcome::Remembered => panic!("cancel lost track of {}", id),
            }
            assert!(!registry.is_tracked(&id));
        }
    }
}
