//! # Keep-Alive Service
//!
//! Process-wide owner of the shared registry, guard, dispatcher and
//! scheduler. Hosts build one service and ask it for a ping sender per
//! connection.

use std::sync::Arc;

use super::dispatcher::{DispatchStats, PingDispatcher};
use super::guard::{GuardStats, LivenessGuard};
use super::registry::IdentityRegistry;
use super::scheduler::AlarmScheduler;
use super::sender::AlarmPingSender;
use crate::config::KeepAliveConfig;
use crate::ports::{HostContext, TimeSource};

/// Aggregate snapshot of the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAliveStats {
    /// Guard counters.
    pub guard: GuardStats,
    /// Firing counters.
    pub dispatch: DispatchStats,
    /// Clients with a pending wake.
    pub pending_wakes: usize,
    /// Registry entries (live or expired).
    pub registered: usize,
}

/// Keep-alive service wiring the subsystem together.
///
/// # Example
///
/// ```rust,ignore
/// let service = KeepAliveService::new(KeepAliveConfig::default(), Arc::new(SystemTimeSource));
/// let sender = service.sender(host.clone());
/// sender.init(&connection);
/// sender.start()?;
/// ```
pub struct KeepAliveService {
    config: KeepAliveConfig,
    registry: Arc<IdentityRegistry>,
    guard: Arc<LivenessGuard>,
    dispatcher: Arc<PingDispatcher>,
    scheduler: Arc<AlarmScheduler>,
}

impl KeepAliveService {
    /// Build the service.
    pub fn new(config: KeepAliveConfig, time_source: Arc<dyn TimeSource>) -> Self {
        let registry = Arc::new(IdentityRegistry::new());
        let guard = Arc::new(LivenessGuard::new(config.guard_tag_prefix.clone()));
        let dispatcher = Arc::new(PingDispatcher::new(registry.clone(), guard.clone()));
        let scheduler = Arc::new(AlarmScheduler::new(
            registry.clone(),
            dispatcher.clone(),
            time_source,
        ));

        Self {
            config,
            registry,
            guard,
            dispatcher,
            scheduler,
        }
    }

    /// A new ping sender for a connection living on `host`.
    pub fn sender(&self, host: Arc<dyn HostContext>) -> AlarmPingSender {
        AlarmPingSender::new(self.scheduler.clone(), host)
    }

    /// Configuration the service was built with.
    pub fn config(&self) -> &KeepAliveConfig {
        &self.config
    }

    /// Shared scheduler.
    pub fn scheduler(&self) -> &Arc<AlarmScheduler> {
        &self.scheduler
    }

    /// Shared identity registry.
    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    /// Shared liveness guard.
    pub fn guard(&self) -> &Arc<LivenessGuard> {
        &self.guard
    }

    /// Shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<PingDispatcher> {
        &self.dispatcher
    }

    /// Remove registry entries whose connection or host is gone.
    pub fn prune_expired(&self) -> usize {
        self.registry.prune_expired()
    }

    /// Current counters.
    pub fn stats(&self) -> KeepAliveStats {
        KeepAliveStats {
            guard: self.guard.stats(),
            dispatch: self.dispatcher.stats(),
            pending_wakes: self.scheduler.pending_count(),
            registered: self.registry.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientId, FiringOutcome, OperationToken};
    use crate::ports::{Connection, PingSender};
    use crate::test_utils::{FixedTimeSource, MockConnection, MockHost};

    #[tokio::test]
    async fn test_sender_round_trip_through_service() {
        let service = KeepAliveService::new(
            KeepAliveConfig::for_testing(),
            Arc::new(FixedTimeSource::new(0)),
        );
        let host = Arc::new(MockHost::new());
        let connection: Arc<dyn Connection> = Arc::new(MockConnection::new("c1"));

        let sender = service.sender(host.clone());
        sender.init(&connection);
        sender.start().unwrap();
        assert_eq!(service.stats().pending_wakes, 1);
        assert_eq!(service.stats().registered, 1);

        let outcome = host.manual_timer().fire_next().await.flatten();
        assert_eq!(outcome, Some(FiringOutcome::Succeeded(OperationToken::new(1))));

        let stats = service.stats();
        assert_eq!(stats.pending_wakes, 0);
        assert_eq!(stats.guard.acquired, 1);
        assert_eq!(stats.guard.released, 1);
        assert_eq!(stats.dispatch.succeeded, 1);
        assert_eq!(host.suspend_service().held("test.c1"), 0);
    }

    #[test]
    fn test_prune_after_connection_dropped() {
        let service = KeepAliveService::new(
            KeepAliveConfig::for_testing(),
            Arc::new(FixedTimeSource::new(0)),
        );
        let host: Arc<dyn HostContext> = Arc::new(MockHost::new());
        let connection: Arc<dyn Connection> = Arc::new(MockConnection::new("c1"));
        service.scheduler().start(
            ClientId::new("c1").unwrap(),
            &connection,
            &host,
            std::time::Duration::from_secs(60),
        );

        drop(connection);
        assert_eq!(service.prune_expired(), 1);
        assert_eq!(service.stats().registered, 0);
    }
}
