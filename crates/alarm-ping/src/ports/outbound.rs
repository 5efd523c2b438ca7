//! # Driven Ports (Outbound SPI)
//!
//! Interfaces this subsystem **requires** from the connection layer and the
//! host environment.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::{
    ClientId, FiringOutcome, HoldId, OperationToken, PingError, SuspendError, TimerCapabilities,
    TimerHandle, TimerTier, Timestamp, WakeEvent,
};

/// The connection whose session is kept alive.
///
/// # Thread Safety
///
/// Wake events fire on their own tasks, so implementations must be
/// `Send + Sync`.
pub trait Connection: Send + Sync {
    /// Identity of this logical connection.
    fn client_id(&self) -> String;

    /// Keep-alive interval negotiated for this connection.
    fn keep_alive_interval(&self) -> Duration;

    /// Send a keep-alive if one is due.
    ///
    /// Returns `None` when nothing was sent (e.g. a keep-alive is already
    /// outstanding). In that case the listener is never completed.
    fn check_for_activity(&self, listener: CompletionListener) -> Option<OperationToken>;
}

/// Host environment services.
pub trait HostContext: Send + Sync {
    /// Process-wide suspend-prevention service.
    fn suspend_prevention(&self) -> Arc<dyn SuspendPreventionService>;

    /// Wake-capable timer service.
    fn timer_service(&self) -> Arc<dyn TimerService>;
}

/// Named, reference-counted suspend-prevention resource.
pub trait SuspendPreventionService: Send + Sync {
    /// Take a hold tagged with `tag`. Must not block on I/O.
    fn acquire(&self, tag: &str) -> HoldId;

    /// Drop a previously granted hold.
    fn release(&self, hold: HoldId) -> Result<(), SuspendError>;
}

/// Wake-capable one-shot timer.
pub trait TimerService: Send + Sync {
    /// What tiers this platform can honour.
    fn capabilities(&self) -> TimerCapabilities;

    /// Arm a one-shot wake. `handler` receives `event` at or after `fire_at`.
    fn arm(
        &self,
        tier: TimerTier,
        fire_at: Timestamp,
        event: WakeEvent,
        handler: Arc<dyn WakeHandler>,
    ) -> TimerHandle;

    /// Cancel an armed wake. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// Receiver of fired wake events.
#[async_trait]
pub trait WakeHandler: Send + Sync {
    /// Handle one firing. Returns `None` when the event was stale and
    /// nothing was dispatched.
    async fn on_wake(&self, event: WakeEvent) -> Option<FiringOutcome>;
}

/// Abstract interface for wall-clock time.
///
/// Enables deterministic testing by injecting controllable time sources.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;
}

/// Two-arm completion handed to [`Connection::check_for_activity`].
///
/// Both arms consume the listener, so at most one outcome is ever reported.
#[derive(Debug)]
pub struct CompletionListener {
    client_id: Option<ClientId>,
    tx: oneshot::Sender<Result<(), PingError>>,
}

impl CompletionListener {
    /// Create a listener and the receiving half that awaits its outcome.
    pub fn channel() -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                client_id: None,
                tx,
            },
            Completion { rx },
        )
    }

    pub(crate) fn for_client(client_id: ClientId) -> (Self, Completion) {
        let (mut listener, completion) = Self::channel();
        listener.client_id = Some(client_id);
        (listener, completion)
    }

    /// Client this listener was created for, if known.
    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    /// The keep-alive round trip completed.
    pub fn on_success(self) {
        // Receiver gone means the dispatcher already gave up on this op.
        let _ = self.tx.send(Ok(()));
    }

    /// The keep-alive failed.
    pub fn on_failure(self, error: PingError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Receiving half of a [`CompletionListener`].
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), PingError>>,
}

impl Completion {
    /// Wait for the listener's outcome.
    ///
    /// A listener dropped without completing yields
    /// [`PingError::ListenerDropped`].
    pub async fn wait(self) -> Result<(), PingError> {
        self.rx.await.unwrap_or(Err(PingError::ListenerDropped))
    }
}
