//! Alarm Scheduler
//!
//! Owns the single pending-wake slot of every started client. Wakes are
//! one-shot; the next one is armed only when someone calls `schedule` again.
//!
//! A fired wake must *claim* its slot before it is dispatched. `stop()` and
//! re-`schedule()` clear or replace the slot under the same lock, so once
//! either returns the superseded wake can no longer have any effect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::dispatcher::PingDispatcher;
use super::registry::IdentityRegistry;
use crate::domain::{
    ClientId, FiringOutcome, NotFoundReason, ScheduledWake, TimerTier, WakeEvent,
};
use crate::ports::{Connection, HostContext, TimeSource, TimerService, WakeHandler};

struct ClientSlot {
    timer: Arc<dyn TimerService>,
    pending: Option<ScheduledWake>,
}

impl ClientSlot {
    fn cancel_pending(&mut self) {
        if let Some(wake) = self.pending.take() {
            self.timer.cancel(wake.handle);
        }
    }
}

/// Receives fired wakes, claims the slot and hands them to the dispatcher.
struct WakeRouter {
    slots: Mutex<HashMap<ClientId, ClientSlot>>,
    registry: Arc<IdentityRegistry>,
    dispatcher: Arc<PingDispatcher>,
}

impl WakeRouter {
    /// Clear the slot if its pending wake carries `generation`.
    fn claim(&self, client_id: &ClientId, generation: u64) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(client_id) else {
            return false;
        };
        match &slot.pending {
            Some(wake) if wake.generation == generation => {
                slot.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Forget a client whose connection or host has gone away.
    ///
    /// Only an idle slot is removed: a `start` or `schedule` that ran since
    /// the claim has armed a newer wake and keeps the client.
    fn forget_unresolved(&self, client_id: &ClientId) {
        let mut slots = self.slots.lock();
        let idle = slots
            .get(client_id)
            .is_some_and(|slot| slot.pending.is_none());
        if idle && self.registry.unregister_expired(client_id) {
            slots.remove(client_id);
            debug!("[alarm-ping] Forgot {}, connection is gone", client_id);
        }
    }
}

#[async_trait]
impl WakeHandler for WakeRouter {
    async fn on_wake(&self, event: WakeEvent) -> Option<FiringOutcome> {
        // Payloads without an identity go straight to the dispatcher, which
        // ends them in NotFound.
        let client_id = event.client_id();
        if let Some(client_id) = &client_id {
            if !self.claim(client_id, event.generation()) {
                debug!(
                    "[alarm-ping] Dropping stale wake for {} (generation {})",
                    client_id,
                    event.generation()
                );
                return None;
            }
        }

        let outcome = self.dispatcher.dispatch(&event).await;
        if let (Some(client_id), FiringOutcome::NotFound(NotFoundReason::Unresolved)) =
            (&client_id, &outcome)
        {
            self.forget_unresolved(client_id);
        }
        Some(outcome)
    }
}

/// Per-client one-shot wake scheduling.
pub struct AlarmScheduler {
    registry: Arc<IdentityRegistry>,
    time_source: Arc<dyn TimeSource>,
    router: Arc<WakeRouter>,
    next_generation: AtomicU64,
}

impl AlarmScheduler {
    /// Create a scheduler that dispatches fired wakes through `dispatcher`.
    pub fn new(
        registry: Arc<IdentityRegistry>,
        dispatcher: Arc<PingDispatcher>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let router = Arc::new(WakeRouter {
            slots: Mutex::new(HashMap::new()),
            registry: registry.clone(),
            dispatcher,
        });
        Self {
            registry,
            time_source,
            router,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Register `client_id` and arm its first wake `interval` from now.
    ///
    /// Starting an already started client replaces its registry entry and
    /// its pending wake.
    pub fn start(
        &self,
        client_id: ClientId,
        connection: &Arc<dyn Connection>,
        host: &Arc<dyn HostContext>,
        interval: Duration,
    ) {
        self.registry.register(client_id.clone(), connection, host);

        let timer = host.timer_service();
        {
            let mut slots = self.router.slots.lock();
            if let Some(mut previous) = slots.insert(
                client_id.clone(),
                ClientSlot {
                    timer,
                    pending: None,
                },
            ) {
                previous.cancel_pending();
            }
        }

        info!(
            "[alarm-ping] Started keep-alive for {} every {:?}",
            client_id, interval
        );
        self.schedule(&client_id, interval);
    }

    /// Cancel the pending wake of `client_id` and forget it.
    ///
    /// A firing that already claimed its wake is not affected and releases
    /// its own guard. Safe to call for unknown clients.
    pub fn stop(&self, client_id: &ClientId) {
        let slot = self.router.slots.lock().remove(client_id);
        self.registry.unregister(client_id);

        match slot {
            Some(mut slot) => {
                slot.cancel_pending();
                info!("[alarm-ping] Stopped keep-alive for {}", client_id);
            }
            None => debug!("[alarm-ping] Stop for {} with nothing scheduled", client_id),
        }
    }

    /// (Re)arm the single wake of `client_id` at `now + delay`.
    ///
    /// Ignored for clients that are not started.
    pub fn schedule(&self, client_id: &ClientId, delay: Duration) {
        let fire_at = self.time_source.now().saturating_add(delay);

        let mut slots = self.router.slots.lock();
        let Some(slot) = slots.get_mut(client_id) else {
            debug!(
                "[alarm-ping] Schedule for {} ignored, client not started",
                client_id
            );
            return;
        };

        slot.cancel_pending();

        let tier = TimerTier::select(slot.timer.capabilities());
        if tier.is_degraded() {
            info!(
                "[alarm-ping] Wake-capable exact timers unavailable, scheduling {} with {} timer",
                client_id, tier
            );
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let event = WakeEvent::for_client(client_id, generation, fire_at);
        let handler: Arc<dyn WakeHandler> = self.router.clone();
        let handle = slot.timer.arm(tier, fire_at, event, handler);

        debug!(
            "[alarm-ping] Next wake for {} at {} ({} timer)",
            client_id, fire_at, tier
        );
        slot.pending = Some(ScheduledWake {
            client_id: client_id.clone(),
            fire_at,
            tier,
            generation,
            handle,
        });
    }

    /// The pending wake of `client_id`, if any.
    pub fn pending(&self, client_id: &ClientId) -> Option<ScheduledWake> {
        self.router
            .slots
            .lock()
            .get(client_id)
            .and_then(|slot| slot.pending.clone())
    }

    /// Number of clients with a pending wake.
    pub fn pending_count(&self) -> usize {
        self.router
            .slots
            .lock()
            .values()
            .filter(|slot| slot.pending.is_some())
            .count()
    }

    /// Whether `client_id` is started (pending wake or not).
    pub fn is_started(&self, client_id: &ClientId) -> bool {
        self.router.slots.lock().contains_key(client_id)
    }
}

#[cfg(test)]
mod tests;
