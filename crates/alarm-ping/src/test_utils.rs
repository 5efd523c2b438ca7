//! Test utilities for the keep-alive subsystem.
//!
//! Deterministic stand-ins for the driven ports. Enable with the
//! `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use alarm_ping::test_utils::FixedTimeSource;
//! use alarm_ping::TimeSource;
//!
//! let time_source = FixedTimeSource::new(1000);
//! assert_eq!(time_source.now().as_millis(), 1000);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::adapters::InProcessSuspendService;
use crate::domain::{
    FiringOutcome, OperationToken, PingError, TimerCapabilities, TimerHandle, TimerTier,
    Timestamp, WakeEvent,
};
use crate::ports::{
    CompletionListener, Connection, HostContext, SuspendPreventionService, TimeSource,
    TimerService, WakeHandler,
};

// =============================================================================
// TIME SOURCES
// =============================================================================

/// A time source that always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    millis: u64,
}

impl FixedTimeSource {
    /// Create a fixed time source at `millis` since the epoch.
    pub fn new(millis: u64) -> Self {
        Self { millis }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis)
    }
}

/// Thread-safe time source that tests can advance.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    millis: AtomicU64,
}

impl ControllableTimeSource {
    /// Start the clock at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by_ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// =============================================================================
// MANUAL TIMER
// =============================================================================

struct ArmedTimer {
    tier: TimerTier,
    fire_at: Timestamp,
    event: WakeEvent,
    handler: Arc<dyn WakeHandler>,
}

/// Timer service that only fires when a test tells it to.
pub struct ManualTimerService {
    capabilities: TimerCapabilities,
    next_handle: AtomicU64,
    armed: Mutex<BTreeMap<u64, ArmedTimer>>,
    cancelled: AtomicUsize,
}

impl ManualTimerService {
    /// Manual timer reporting full capability.
    pub fn new() -> Self {
        Self::with_capabilities(TimerCapabilities::full())
    }

    /// Manual timer reporting `capabilities`.
    pub fn with_capabilities(capabilities: TimerCapabilities) -> Self {
        Self {
            capabilities,
            next_handle: AtomicU64::new(1),
            armed: Mutex::new(BTreeMap::new()),
            cancelled: AtomicUsize::new(0),
        }
    }

    /// Number of armed, not yet fired or cancelled, timers.
    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }

    /// `(handle, tier, fire_at)` of every armed timer, oldest first.
    pub fn armed(&self) -> Vec<(TimerHandle, TimerTier, Timestamp)> {
        self.armed
            .lock()
            .iter()
            .map(|(id, t)| (TimerHandle(*id), t.tier, t.fire_at))
            .collect()
    }

    /// Number of `cancel` calls that hit an armed timer.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Remove an armed timer without firing it, returning what it would
    /// have delivered.
    pub fn take(&self, handle: TimerHandle) -> Option<(WakeEvent, Arc<dyn WakeHandler>)> {
        self.armed
            .lock()
            .remove(&handle.0)
            .map(|t| (t.event, t.handler))
    }

    /// Fire one armed timer now.
    ///
    /// Returns `None` if the handle is not armed, otherwise the handler's
    /// result.
    pub async fn fire(&self, handle: TimerHandle) -> Option<Option<FiringOutcome>> {
        let (event, handler) = self.take(handle)?;
        Some(handler.on_wake(event).await)
    }

    /// Fire the oldest armed timer.
    pub async fn fire_next(&self) -> Option<Option<FiringOutcome>> {
        let handle = self.armed.lock().keys().next().copied()?;
        self.fire(TimerHandle(handle)).await
    }
}

impl Default for ManualTimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService for ManualTimerService {
    fn capabilities(&self) -> TimerCapabilities {
        self.capabilities
    }

    fn arm(
        &self,
        tier: TimerTier,
        fire_at: Timestamp,
        event: WakeEvent,
        handler: Arc<dyn WakeHandler>,
    ) -> TimerHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.armed.lock().insert(
            id,
            ArmedTimer {
                tier,
                fire_at,
                event,
                handler,
            },
        );
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if self.armed.lock().remove(&handle.0).is_some() {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// =============================================================================
// MOCK CONNECTION
// =============================================================================

/// How a [`MockConnection`] answers `check_for_activity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockPingBehavior {
    /// Send and immediately report success.
    Succeed,
    /// Send and immediately report failure.
    Fail(PingError),
    /// Send nothing (a keep-alive is already outstanding).
    NothingSent,
    /// Send and keep the listener until the test completes it.
    Hold,
}

/// Scriptable [`Connection`].
pub struct MockConnection {
    client_id: String,
    interval: Duration,
    behavior: Mutex<MockPingBehavior>,
    held: Mutex<Vec<CompletionListener>>,
    checks: AtomicUsize,
    next_op: AtomicU64,
}

impl MockConnection {
    /// Connection with a 60 s keep-alive that succeeds immediately.
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            interval: Duration::from_secs(60),
            behavior: Mutex::new(MockPingBehavior::Succeed),
            held: Mutex::new(Vec::new()),
            checks: AtomicUsize::new(0),
            next_op: AtomicU64::new(1),
        }
    }

    /// Override the keep-alive interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override how pings are answered.
    pub fn with_behavior(self, behavior: MockPingBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Change behaviour for subsequent pings.
    pub fn set_behavior(&self, behavior: MockPingBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of `check_for_activity` calls.
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Listeners held back by [`MockPingBehavior::Hold`].
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Complete the oldest held listener with success.
    pub fn complete_success(&self) -> bool {
        match self.pop_held() {
            Some(listener) => {
                listener.on_success();
                true
            }
            None => false,
        }
    }

    /// Complete the oldest held listener with failure.
    pub fn complete_failure(&self, error: PingError) -> bool {
        match self.pop_held() {
            Some(listener) => {
                listener.on_failure(error);
                true
            }
            None => false,
        }
    }

    /// Drop every held listener without completing it.
    pub fn drop_held(&self) {
        self.held.lock().clear();
    }

    fn pop_held(&self) -> Option<CompletionListener> {
        let mut held = self.held.lock();
        if held.is_empty() {
            None
        } else {
            Some(held.remove(0))
        }
    }
}

impl Connection for MockConnection {
    fn client_id(&self) -> String {
        self.client_id.clone()
    }

    fn keep_alive_interval(&self) -> Duration {
        self.interval
    }

    fn check_for_activity(&self, listener: CompletionListener) -> Option<OperationToken> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        if behavior == MockPingBehavior::NothingSent {
            return None;
        }

        let op = OperationToken::new(self.next_op.fetch_add(1, Ordering::SeqCst));
        match behavior {
            MockPingBehavior::Succeed => listener.on_success(),
            MockPingBehavior::Fail(error) => listener.on_failure(error),
            MockPingBehavior::Hold => self.held.lock().push(listener),
            MockPingBehavior::NothingSent => {}
        }
        Some(op)
    }
}

// =============================================================================
// MOCK HOST
// =============================================================================

/// Host backed by an [`InProcessSuspendService`] and a [`ManualTimerService`].
pub struct MockHost {
    suspend: Arc<InProcessSuspendService>,
    timer: Arc<ManualTimerService>,
}

impl MockHost {
    /// Host with a full-capability manual timer.
    pub fn new() -> Self {
        Self::with_timer(Arc::new(ManualTimerService::new()))
    }

    /// Host using the given manual timer.
    pub fn with_timer(timer: Arc<ManualTimerService>) -> Self {
        Self {
            suspend: Arc::new(InProcessSuspendService::new()),
            timer,
        }
    }

    /// The concrete suspend service, for hold-count assertions.
    pub fn suspend_service(&self) -> &Arc<InProcessSuspendService> {
        &self.suspend
    }

    /// The concrete manual timer.
    pub fn manual_timer(&self) -> &Arc<ManualTimerService> {
        &self.timer
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext for MockHost {
    fn suspend_prevention(&self) -> Arc<dyn SuspendPreventionService> {
        self.suspend.clone()
    }

    fn timer_service(&self) -> Arc<dyn TimerService> {
        self.timer.clone()
    }
}
