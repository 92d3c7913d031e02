//! Latest-request-wins ordering for re-issued queries.
//!
//! Every query takes a [`Ticket`]; when its response arrives it is applied
//! only if no newer ticket has been issued since. Nothing is cancelled in
//! flight, stale responses are simply dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Position of a request in its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// A value slot guarded by a [`RequestSequence`].
#[derive(Debug, Default)]
pub struct LatestOnly<T> {
    sequence: RequestSequence,
    value: Mutex<Option<(Ticket, T)>>,
}

impl<T: Clone> LatestOnly<T> {
    pub fn new() -> Self {
        Self {
            sequence: RequestSequence::new(),
            value: Mutex::new(None),
        }
    }

    pub fn issue(&self) -> Ticket {
        self.sequence.issue()
    }

    /// Store `value` if `ticket` is still the latest. Returns whether it was applied.
    pub fn apply(&self, ticket: Ticket, value: T) -> bool {
        if !self.sequence.is_current(ticket) {
            return false;
        }
        let mut slot = match self.value.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A newer ticket may have been issued and resolved while we waited for the lock.
        if !self.sequence.is_current(ticket) {
            return false;
        }
        *slot = Some((ticket, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        let slot = match self.value.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().map(|(_, v)| v.clone())
    }
}
