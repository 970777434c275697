//! Per-key debounce tickets
//!
//! Scheduling hands out a fresh ticket that replaces any earlier one for the
//! same key. After waiting out the window the caller claims its ticket; only
//! the latest ticket can be claimed, so bursts collapse to one action.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

#[derive(Debug)]
struct Tickets<K> {
    next: u64,
    pending: HashMap<K, u64>,
}

/// Latest-ticket-wins debouncer
#[derive(Debug)]
pub struct Debouncer<K> {
    inner: Mutex<Tickets<K>>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tickets {
                next: 0,
                pending: HashMap::new(),
            }),
        }
    }

    /// Issue a ticket for `key`, superseding any pending one
    pub fn schedule(&self, key: K) -> u64 {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        inner.next += 1;
        let ticket = inner.next;
        inner.pending.insert(key, ticket);
        ticket
    }

    /// Claim `ticket` if it is still the latest for `key`
    ///
    /// A successful claim removes the pending entry.
    pub fn claim(&self, key: &K, ticket: u64) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.pending.get(key) == Some(&ticket) {
            inner.pending.remove(key);
            true
        } else {
            false
        }
    }

    pub fn cancel(&self, key: &K) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pending.remove(key);
        }
    }

    /// Drop every pending ticket
    pub fn cancel_all(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pending.clear();
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().map(|i| i.pending.len()).unwrap_or(0)
    }
}

impl<K: Eq + Hash + Clone> Default for Debouncer<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_ticket_wins() {
        let debouncer = Debouncer::new();
        let first = debouncer.schedule("a");
        let second = debouncer.schedule("a");

        assert!(!debouncer.claim(&"a", first));
        assert!(debouncer.claim(&"a", second));
        // Claimed tickets are consumed
        assert!(!debouncer.claim(&"a", second));
    }

    #[test]
    fn keys_are_independent() {
        let debouncer = Debouncer::new();
        let a = debouncer.schedule("a");
        let b = debouncer.schedule("b");
        assert_eq!(debouncer.pending(), 2);
        assert!(debouncer.claim(&"a", a));
        assert!(debouncer.claim(&"b", b));
    }

    #[test]
    fn cancel_all_invalidates_tickets() {
        let debouncer = Debouncer::new();
        let a = debouncer.schedule("a");
        let b = debouncer.schedule("b");
        debouncer.cancel_all();

        assert!(!debouncer.claim(&"a", a));
        assert!(!debouncer.claim(&"b", b));
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn cancel_single_key() {
        let debouncer = Debouncer::new();
        let a = debouncer.schedule("a");
        let b = debouncer.schedule("b");
        debouncer.cancel(&"a");
        assert!(!debouncer.claim(&"a", a));
        assert!(debouncer.claim(&"b", b));
    }
}
