//! Admission control for running scans
//!
//! Active scans are kept in admission order. Admitting a scan cancels any
//! scan of the same document, then evicts from the front until there is
//! room. All of it happens under one lock.
//!
//! Scans still installing the scanner or reading their document are
//! registered as pending: they hold no slot but are reached by the same
//! cancellation calls.

use crate::scan::DocumentId;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct ActiveScan {
    id: u64,
    document: DocumentId,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Slots {
    next_id: u64,
    queue: VecDeque<ActiveScan>,
    pending: Vec<ActiveScan>,
}

impl Slots {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// FIFO set of in-flight scans with a concurrency bound
#[derive(Debug)]
pub struct ActiveScans {
    limit: usize,
    inner: Mutex<Slots>,
}

impl ActiveScans {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            inner: Mutex::new(Slots::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Track a scan that is not admitted yet, superseding any pending scan
    /// of the same document
    pub fn register_pending(
        &self,
        document: &DocumentId,
        token: CancellationToken,
    ) -> AdmissionGuard<'_> {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        inner.pending.retain(|scan| {
            if &scan.document == document {
                scan.token.cancel();
                false
            } else {
                true
            }
        });

        let id = inner.next_id();
        inner.pending.push(ActiveScan {
            id,
            document: document.clone(),
            token,
        });

        AdmissionGuard { scans: self, id }
    }

    /// Admit a scan, returning a guard that releases the slot on drop
    pub fn admit(&self, document: &DocumentId, token: CancellationToken) -> AdmissionGuard<'_> {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        inner.queue.retain(|scan| {
            if &scan.document == document {
                debug!("Superseding running scan of {}", document);
                scan.token.cancel();
                false
            } else {
                true
            }
        });

        while inner.queue.len() >= self.limit {
            if let Some(oldest) = inner.queue.pop_front() {
                debug!("Concurrency limit reached, cancelling scan of {}", oldest.document);
                oldest.token.cancel();
            }
        }

        let id = inner.next_id();
        inner.queue.push_back(ActiveScan {
            id,
            document: document.clone(),
            token,
        });

        AdmissionGuard { scans: self, id }
    }

    fn release(&self, id: u64) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.queue.retain(|scan| scan.id != id);
        inner.pending.retain(|scan| scan.id != id);
    }

    /// Cancel the running or pending scan of `document`, if any
    pub fn cancel_document(&self, document: &DocumentId) {
        let keep = |scan: &ActiveScan| {
            if &scan.document == document {
                scan.token.cancel();
                false
            } else {
                true
            }
        };
        if let Ok(mut inner) = self.inner.lock() {
            inner.queue.retain(keep);
            inner.pending.retain(keep);
        }
    }

    /// Cancel every running and pending scan
    pub fn cancel_all(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            let Slots { queue, pending, .. } = &mut *inner;
            for scan in queue.drain(..).chain(pending.drain(..)) {
                scan.token.cancel();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scans registered but not admitted
    pub fn pending_len(&self) -> usize {
        self.inner.lock().map(|i| i.pending.len()).unwrap_or(0)
    }

    /// Documents in admission order
    pub fn documents(&self) -> Vec<DocumentId> {
        self.inner
            .lock()
            .map(|i| i.queue.iter().map(|s| s.document.clone()).collect())
            .unwrap_or_default()
    }
}

/// Holds an admission slot until dropped
#[derive(Debug)]
pub struct AdmissionGuard<'a> {
    scans: &'a ActiveScans,
    id: u64,
}

impl AdmissionGuard<'_> {
    /// Give the slot back before the guard goes out of scope
    pub fn release_now(&self) {
        self.scans.release(self.id);
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.scans.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> DocumentId {
        DocumentId::new(name)
    }

    #[test]
    fn guard_releases_slot() {
        let scans = ActiveScans::new(2);
        {
            let _guard = scans.admit(&doc("a"), CancellationToken::new());
            assert_eq!(scans.len(), 1);
        }
        assert!(scans.is_empty());
    }

    #[test]
    fn same_document_is_superseded() {
        let scans = ActiveScans::new(4);
        let first = CancellationToken::new();
        let _g1 = scans.admit(&doc("a"), first.clone());
        let second = CancellationToken::new();
        let _g2 = scans.admit(&doc("a"), second.clone());

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(scans.documents(), vec![doc("a")]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let scans = ActiveScans::new(2);
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let c = CancellationToken::new();
        let _ga = scans.admit(&doc("a"), a.clone());
        let _gb = scans.admit(&doc("b"), b.clone());
        let _gc = scans.admit(&doc("c"), c.clone());

        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!c.is_cancelled());
        assert_eq!(scans.documents(), vec![doc("b"), doc("c")]);
    }

    #[test]
    fn evicted_guard_drop_keeps_others() {
        let scans = ActiveScans::new(1);
        let ga = scans.admit(&doc("a"), CancellationToken::new());
        let _gb = scans.admit(&doc("b"), CancellationToken::new());
        drop(ga);
        assert_eq!(scans.documents(), vec![doc("b")]);
    }

    #[test]
    fn cancel_all_empties_set() {
        let scans = ActiveScans::new(3);
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let _ga = scans.admit(&doc("a"), a.clone());
        let _gb = scans.admit(&doc("b"), b.clone());

        scans.cancel_all();

        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(scans.is_empty());
    }

    #[test]
    fn pending_scans_hold_no_slot() {
        let scans = ActiveScans::new(1);
        let pending = CancellationToken::new();
        let _gp = scans.register_pending(&doc("a"), pending.clone());
        let _gb = scans.admit(&doc("b"), CancellationToken::new());

        assert!(!pending.is_cancelled());
        assert_eq!(scans.len(), 1);
        assert_eq!(scans.pending_len(), 1);
    }

    #[test]
    fn cancellation_reaches_pending_scans() {
        let scans = ActiveScans::new(2);
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let _ga = scans.register_pending(&doc("a"), a.clone());
        let _gb = scans.register_pending(&doc("b"), b.clone());

        scans.cancel_document(&doc("a"));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());

        scans.cancel_all();
        assert!(b.is_cancelled());
        assert_eq!(scans.pending_len(), 0);
    }

    #[test]
    fn newer_pending_scan_supersedes_older() {
        let scans = ActiveScans::new(1);
        let first = CancellationToken::new();
        let _g1 = scans.register_pending(&doc("a"), first.clone());
        let _g2 = scans.register_pending(&doc("a"), CancellationToken::new());

        assert!(first.is_cancelled());
        assert_eq!(scans.pending_len(), 1);
    }

    #[test]
    fn release_now_frees_slot_before_drop() {
        let scans = ActiveScans::new(1);
        let guard = scans.admit(&doc("a"), CancellationToken::new());
        guard.release_now();
        assert!(scans.is_empty());

        let other = CancellationToken::new();
        let _gb = scans.admit(&doc("b"), other.clone());
        drop(guard);
        assert!(!other.is_cancelled());
        assert_eq!(scans.documents(), vec![doc("b")]);
    }

    #[test]
    fn zero_limit_is_one() {
        assert_eq!(ActiveScans::new(0).limit(), 1);
    }
}
