//! Ping Dispatcher
//!
//! Handles one wake firing:
//!
//! ```text
//! Fired → Resolving ─┬─ NotFound
//!                    └─ Dispatching → GuardAcquired ─┬─ StartFailed
//!                                                    └─ OperationStarted
//!                                                         → AwaitingCompletion
//!                                                         ─┬─ Succeeded
//!                                                          └─ Failed
//! ```
//!
//! Every path that acquires the guard releases it exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::guard::{GuardHold, LivenessGuard};
use super::registry::IdentityRegistry;
use crate::domain::{FiringOutcome, NotFoundReason, WakeEvent};
use crate::ports::CompletionListener;

/// Firing counters by terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Firings handled.
    pub fired: u64,
    /// Firings that ended in `NotFound`.
    pub not_found: u64,
    /// Firings where the connection sent nothing.
    pub start_failed: u64,
    /// Keep-alives that succeeded.
    pub succeeded: u64,
    /// Keep-alives that failed.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    fired: AtomicU64,
    not_found: AtomicU64,
    start_failed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Resolves, guards and sends one keep-alive per firing.
pub struct PingDispatcher {
    registry: Arc<IdentityRegistry>,
    guard: Arc<LivenessGuard>,
    counters: Counters,
}

impl PingDispatcher {
    /// Create a dispatcher over the shared registry and guard.
    pub fn new(registry: Arc<IdentityRegistry>, guard: Arc<LivenessGuard>) -> Self {
        Self {
            registry,
            guard,
            counters: Counters::default(),
        }
    }

    /// Run one firing to its terminal state.
    pub async fn dispatch(&self, event: &WakeEvent) -> FiringOutcome {
        self.counters.fired.fetch_add(1, Ordering::Relaxed);

        let Some(client_id) = event.client_id() else {
            debug!("[alarm-ping] Wake event without client id, skipping");
            return self.not_found(NotFoundReason::MissingClientId);
        };

        let Some(resolved) = self.registry.resolve(&client_id) else {
            debug!("[alarm-ping] No live connection for {}, skipping", client_id);
            return self.not_found(NotFoundReason::Unresolved);
        };

        debug!(
            "[alarm-ping] Sending keep-alive for {} (scheduled {})",
            client_id,
            event.fire_at()
        );

        let token = self
            .guard
            .acquire(resolved.host.suspend_prevention(), &client_id);
        let mut hold = GuardHold::new(self.guard.clone(), token);

        let (listener, completion) = CompletionListener::for_client(client_id.clone());
        let operation = resolved.connection.check_for_activity(listener);

        // No strong handles across the await below.
        drop(resolved);

        let Some(operation) = operation else {
            if hold.is_held() {
                hold.release();
            }
            debug!("[alarm-ping] Nothing sent for {}, guard released", client_id);
            self.counters.start_failed.fetch_add(1, Ordering::Relaxed);
            return FiringOutcome::StartFailed;
        };

        let result = completion.wait().await;
        hold.release();

        match result {
            Ok(()) => {
                debug!(
                    "[alarm-ping] Keep-alive {} succeeded for {}, guard released",
                    operation.id(),
                    client_id
                );
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                FiringOutcome::Succeeded(operation)
            }
            Err(error) => {
                info!(
                    "[alarm-ping] Keep-alive {} failed for {}: {}",
                    operation.id(),
                    client_id,
                    error
                );
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                FiringOutcome::Failed { operation, error }
            }
        }
    }

    /// Snapshot of firing counters.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            fired: self.counters.fired.load(Ordering::Relaxed),
            not_found: self.counters.not_found.load(Ordering::Relaxed),
            start_failed: self.counters.start_failed.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn not_found(&self, reason: NotFoundReason) -> FiringOutcome {
        self.counters.not_found.fetch_add(1, Ordering::Relaxed);
        FiringOutcome::NotFound(reason)
    }
}
