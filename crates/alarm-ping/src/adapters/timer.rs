//! # Tokio Timer Adapter
//!
//! `TimerService` backed by one Tokio task per armed wake.
//!
//! A Tokio process is never suspended by the runtime itself, so the exact
//! tiers both fire at the requested time. The inexact tier is coalesced:
//! its fire time is rounded up to the next multiple of the configured
//! window so that wakes from many clients batch together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::trace;

use crate::config::KeepAliveConfig;
use crate::domain::{TimerCapabilities, TimerHandle, TimerTier, Timestamp, WakeEvent};
use crate::ports::{TimeSource, TimerService, WakeHandler};

/// Timer service running each wake as a Tokio task.
pub struct TokioTimerService {
    runtime: Handle,
    time_source: Arc<dyn TimeSource>,
    capabilities: TimerCapabilities,
    inexact_window: Duration,
    next_handle: AtomicU64,
    cancels: Arc<Mutex<HashMap<u64, oneshot::Sender<()>>>>,
}

impl TokioTimerService {
    /// Create a timer on the current Tokio runtime with full capability.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self::with_handle(Handle::current(), time_source)
    }

    /// Create a timer spawning onto `runtime`.
    pub fn with_handle(runtime: Handle, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            runtime,
            time_source,
            capabilities: TimerCapabilities::full(),
            inexact_window: Duration::from_secs(1),
            next_handle: AtomicU64::new(1),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a timer on the current Tokio runtime configured by `config`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_config(config: &KeepAliveConfig, time_source: Arc<dyn TimeSource>) -> Self {
        let timer = Self::new(time_source).with_inexact_window(config.inexact_window());
        match config.timer_capabilities {
            Some(capabilities) => timer.with_capabilities(capabilities),
            None => timer,
        }
    }

    /// Report `capabilities` instead of full capability.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: TimerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Batching window for the inexact tier.
    #[must_use]
    pub fn with_inexact_window(mut self, window: Duration) -> Self {
        self.inexact_window = window;
        self
    }

    /// Number of armed wakes that have neither fired nor been cancelled.
    pub fn pending_count(&self) -> usize {
        self.cancels.lock().len()
    }

    fn effective_fire_at(&self, tier: TimerTier, fire_at: Timestamp) -> Timestamp {
        let window_ms = u64::try_from(self.inexact_window.as_millis()).unwrap_or(u64::MAX);
        if tier != TimerTier::Inexact || window_ms == 0 {
            return fire_at;
        }
        let millis = fire_at.as_millis();
        let rounded = millis.div_ceil(window_ms).saturating_mul(window_ms);
        Timestamp::from_millis(rounded)
    }
}

impl TimerService for TokioTimerService {
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
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let fire_at = self.effective_fire_at(tier, fire_at);
        let delay = fire_at.duration_since(self.time_source.now());

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancels.lock().insert(id, cancel_tx);

        let cancels = Arc::clone(&self.cancels);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    cancels.lock().remove(&id);
                    trace!(timer = id, "wake fired");
                    handler.on_wake(event).await;
                }
                _ = cancel_rx => {
                    trace!(timer = id, "wake cancelled");
                }
            }
        });

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        trace!(timer = id, %tier, delay_ms, "wake armed");
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(tx) = self.cancels.lock().remove(&handle.0) {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientId, FiringOutcome};
    use crate::test_utils::FixedTimeSource;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingHandler {
        wakes: AtomicUsize,
    }

    #[async_trait]
    impl WakeHandler for CountingHandler {
        async fn on_wake(&self, _event: WakeEvent) -> Option<FiringOutcome> {
            self.wakes.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn event() -> WakeEvent {
        WakeEvent::for_client(&ClientId::new("c1").unwrap(), 1, Timestamp::from_millis(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_fires_after_delay() {
        let timer = TokioTimerService::new(Arc::new(FixedTimeSource::new(1_000)));
        let handler = Arc::new(CountingHandler::default());

        timer.arm(
            TimerTier::Exact,
            Timestamp::from_millis(61_000),
            event(),
            handler.clone(),
        );
        assert_eq!(timer.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(59_999)).await;
        assert_eq!(handler.wakes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(handler.wakes.load(Ordering::SeqCst), 1);
        assert_eq!(timer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wake_never_fires() {
        let timer = TokioTimerService::new(Arc::new(FixedTimeSource::new(0)));
        let handler = Arc::new(CountingHandler::default());

        let handle = timer.arm(
            TimerTier::ExactAndAllowWhileIdle,
            Timestamp::from_millis(5_000),
            event(),
            handler.clone(),
        );
        timer.cancel(handle);
        assert_eq!(timer.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handler.wakes.load(Ordering::SeqCst), 0);

        // Cancelling again is a no-op.
        timer.cancel(handle);
    }

    #[tokio::test]
    async fn test_inexact_tier_rounds_up_to_window() {
        let timer = TokioTimerService::new(Arc::new(FixedTimeSource::new(0)))
            .with_inexact_window(Duration::from_millis(1_000));

        let rounded = timer.effective_fire_at(TimerTier::Inexact, Timestamp::from_millis(1_001));
        assert_eq!(rounded.as_millis(), 2_000);

        let exact = timer.effective_fire_at(TimerTier::Exact, Timestamp::from_millis(1_001));
        assert_eq!(exact.as_millis(), 1_001);
    }

    #[tokio::test]
    async fn test_from_config_applies_overrides() {
        let config = KeepAliveConfig {
            inexact_window_ms: 500,
            timer_capabilities: Some(TimerCapabilities::inexact_only()),
            ..KeepAliveConfig::default()
        };
        let timer = TokioTimerService::from_config(&config, Arc::new(FixedTimeSource::new(0)));

        assert_eq!(timer.capabilities(), TimerCapabilities::inexact_only());
        let rounded = timer.effective_fire_at(TimerTier::Inexact, Timestamp::from_millis(1_200));
        assert_eq!(rounded.as_millis(), 1_500);
    }
}
