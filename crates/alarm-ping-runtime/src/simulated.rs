//! Simulated host and connections.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use alarm_ping::{
    AlarmPingSender, CompletionListener, Connection, HostContext, InProcessSuspendService,
    OperationToken, PingError, PingSender, SuspendPreventionService, TimerService,
    TokioTimerService,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;

// ============================================================================
// RuntimeHost
// ============================================================================

/// Host backed by the in-process suspend service and the Tokio timer.
pub struct RuntimeHost {
    suspend: Arc<InProcessSuspendService>,
    timer: Arc<TokioTimerService>,
}

impl RuntimeHost {
    /// Build a host around `timer`.
    pub fn new(timer: TokioTimerService) -> Self {
        Self {
            suspend: Arc::new(InProcessSuspendService::new()),
            timer: Arc::new(timer),
        }
    }

    /// Holds currently preventing suspend.
    pub fn holds(&self) -> usize {
        self.suspend.total_held()
    }

    /// Armed wakes.
    pub fn armed(&self) -> usize {
        self.timer.pending_count()
    }
}

impl HostContext for RuntimeHost {
    fn suspend_prevention(&self) -> Arc<dyn SuspendPreventionService> {
        self.suspend.clone()
    }

    fn timer_service(&self) -> Arc<dyn TimerService> {
        self.timer.clone()
    }
}

// ============================================================================
// SimulatedConnection
// ============================================================================

/// Connection answering keep-alives after a fixed latency.
///
/// Only one keep-alive is ever outstanding; a wake arriving while one is in
/// flight sends nothing. After each round trip the next wake is requested
/// through the attached sender.
pub struct SimulatedConnection {
    client_id: String,
    interval: Duration,
    latency: Duration,
    fail_every: Option<u64>,
    sent: AtomicU64,
    failed: AtomicU64,
    in_flight: Arc<AtomicBool>,
    sender: Mutex<Weak<AlarmPingSender>>,
}

impl SimulatedConnection {
    /// Build from a client entry.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client_id: config.id.clone(),
            interval: Duration::from_secs(config.keep_alive_secs),
            latency: Duration::from_millis(config.latency_ms),
            fail_every: config.fail_every.filter(|n| *n > 0),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            in_flight: Arc::new(AtomicBool::new(false)),
            sender: Mutex::new(Weak::new()),
        }
    }

    /// Attach the sender used to request the next wake.
    pub fn attach(&self, sender: &Arc<AlarmPingSender>) {
        *self.sender.lock() = Arc::downgrade(sender);
    }

    /// Keep-alives sent so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Keep-alives that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

impl Connection for SimulatedConnection {
    fn client_id(&self) -> String {
        self.client_id.clone()
    }

    fn keep_alive_interval(&self) -> Duration {
        self.interval
    }

    fn check_for_activity(&self, listener: CompletionListener) -> Option<OperationToken> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("[alarm-ping] {} keep-alive already in flight", self.client_id);
            return None;
        }

        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let fails = self.fail_every.is_some_and(|every| n % every == 0);
        if fails {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        let latency = self.latency;
        let interval = self.interval;
        let in_flight = self.in_flight.clone();
        let sender = self.sender.lock().clone();
        let client_id = self.client_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            in_flight.store(false, Ordering::SeqCst);
            if fails {
                warn!("[alarm-ping] {} keep-alive #{} timed out", client_id, n);
                listener.on_failure(PingError::Timeout);
            } else {
                listener.on_success();
            }
            if let Some(sender) = sender.upgrade() {
                sender.schedule(interval);
            }
        });

        Some(OperationToken::new(n))
    }
}
