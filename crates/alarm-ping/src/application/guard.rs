//! Liveness Guard
//!
//! Acquire/release bookkeeping over a named, reference-counted
//! suspend-prevention service. The guard is process-wide; each token it
//! hands out is tracked independently, so two firings for the same client
//! hold two separate tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::{ClientId, GuardToken, HoldId};
use crate::ports::SuspendPreventionService;

struct LedgerEntry {
    hold: HoldId,
    client_id: ClientId,
    service: Arc<dyn SuspendPreventionService>,
}

/// Counters describing guard activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    /// Tokens handed out.
    pub acquired: u64,
    /// Tokens released.
    pub released: u64,
    /// Releases ignored because the token was unknown or already released.
    pub ignored_releases: u64,
    /// Tokens currently held.
    pub outstanding: usize,
}

/// Process-wide suspend-prevention guard.
pub struct LivenessGuard {
    tag_prefix: String,
    next_id: AtomicU64,
    ledger: Mutex<HashMap<u64, LedgerEntry>>,
    acquired: AtomicU64,
    released: AtomicU64,
    ignored: AtomicU64,
}

impl LivenessGuard {
    /// Create a guard whose hold names are `<tag_prefix><client id>`.
    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
            next_id: AtomicU64::new(1),
            ledger: Mutex::new(HashMap::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Hold name used for `client_id`.
    pub fn tag_for(&self, client_id: &ClientId) -> String {
        format!("{}{}", self.tag_prefix, client_id)
    }

    /// Take a suspend-prevention hold for `client_id` from `service`.
    pub fn acquire(
        &self,
        service: Arc<dyn SuspendPreventionService>,
        client_id: &ClientId,
    ) -> GuardToken {
        let tag = self.tag_for(client_id);
        let hold = service.acquire(&tag);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.ledger.lock().insert(
            id,
            LedgerEntry {
                hold,
                client_id: client_id.clone(),
                service,
            },
        );
        self.acquired.fetch_add(1, Ordering::Relaxed);
        debug!("[alarm-ping] Acquired guard {} ({})", id, tag);

        GuardToken {
            id,
            client_id: client_id.clone(),
            tag,
        }
    }

    /// Release `token`.
    ///
    /// Releasing an unknown or already-released token is logged and ignored.
    /// Returns whether a hold was actually released.
    pub fn release(&self, token: &GuardToken) -> bool {
        // Take the entry under the lock, talk to the service outside it.
        let entry = self.ledger.lock().remove(&token.id);
        let Some(entry) = entry else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[alarm-ping] Ignoring release of unknown or released guard {} ({})",
                token.id, token.tag
            );
            return false;
        };

        if let Err(e) = entry.service.release(entry.hold) {
            warn!("[alarm-ping] Suspend service release failed for {}: {}", token.tag, e);
        }
        self.released.fetch_add(1, Ordering::Relaxed);
        debug!("[alarm-ping] Released guard {} ({})", token.id, token.tag);
        true
    }

    /// Whether `token` is still held.
    pub fn is_held(&self, token: &GuardToken) -> bool {
        self.ledger.lock().contains_key(&token.id)
    }

    /// Number of tokens currently held for `client_id`.
    pub fn held_count(&self, client_id: &ClientId) -> usize {
        self.ledger
            .lock()
            .values()
            .filter(|entry| &entry.client_id == client_id)
            .count()
    }

    /// Snapshot of guard counters.
    pub fn stats(&self) -> GuardStats {
        GuardStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            ignored_releases: self.ignored.load(Ordering::Relaxed),
            outstanding: self.ledger.lock().len(),
        }
    }
}

/// Scoped ownership of one [`GuardToken`].
///
/// `release` consumes the token; if the hold is dropped while still owning
/// it (e.g. the dispatch future was cancelled) the token is released then.
pub struct GuardHold {
    guard: Arc<LivenessGuard>,
    token: Option<GuardToken>,
}

impl GuardHold {
    /// Take ownership of `token`.
    pub fn new(guard: Arc<LivenessGuard>, token: GuardToken) -> Self {
        Self {
            guard,
            token: Some(token),
        }
    }

    /// Whether this hold still owns a live token.
    pub fn is_held(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| self.guard.is_held(token))
    }

    /// Release the owned token. Returns `false` if nothing was held.
    pub fn release(&mut self) -> bool {
        match self.token.take() {
            Some(token) => self.guard.release(&token),
            None => false,
        }
    }
}

impl Drop for GuardHold {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            debug!("[alarm-ping] Releasing guard {} on drop", token.tag);
            self.guard.release(&token);
        }
    }
}
