use super::*;
use crate::application::LivenessGuard;
use crate::domain::{NotFoundReason, OperationToken, TimerCapabilities};
use crate::test_utils::{
    ControllableTimeSource, ManualTimerService, MockConnection, MockHost, MockPingBehavior,
};

struct Fixture {
    scheduler: AlarmScheduler,
    registry: Arc<IdentityRegistry>,
    guard: Arc<LivenessGuard>,
    time: Arc<ControllableTimeSource>,
    host: Arc<MockHost>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_host(MockHost::new())
    }

    fn with_host(host: MockHost) -> Self {
        let registry = Arc::new(IdentityRegistry::new());
        let guard = Arc::new(LivenessGuard::new("test."));
        let dispatcher = Arc::new(PingDispatcher::new(registry.clone(), guard.clone()));
        let time = Arc::new(ControllableTimeSource::new(0));
        Self {
            scheduler: AlarmScheduler::new(registry.clone(), dispatcher, time.clone()),
            registry,
            guard,
            time,
            host: Arc::new(host),
        }
    }

    fn start(&self, connection: &Arc<MockConnection>) -> ClientId {
        let id = ClientId::new(connection.client_id()).unwrap();
        let interval = connection.keep_alive_interval();
        let connection: Arc<dyn Connection> = connection.clone();
        let host: Arc<dyn HostContext> = self.host.clone();
        self.scheduler.start(id.clone(), &connection, &host, interval);
        id
    }

    fn timer(&self) -> &Arc<ManualTimerService> {
        self.host.manual_timer()
    }
}

#[test]
fn test_start_arms_one_wake_an_interval_ahead() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    let wake = fx.scheduler.pending(&id).unwrap();
    assert_eq!(wake.fire_at.as_millis(), 60_000);
    assert_eq!(wake.tier, TimerTier::ExactAndAllowWhileIdle);
    assert!(fx.scheduler.is_started(&id));
    assert!(fx.registry.resolve(&id).is_some());

    let armed = fx.timer().armed();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].0, wake.handle);
    assert_eq!(armed[0].2.as_millis(), 60_000);
}

#[test]
fn test_start_twice_leaves_one_pending() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    fx.start(&connection);
    fx.time.advance(Duration::from_secs(10));
    let id = fx.start(&connection);

    assert_eq!(fx.scheduler.pending_count(), 1);
    assert_eq!(fx.timer().armed_count(), 1);
    assert_eq!(fx.timer().cancelled_count(), 1);
    assert_eq!(fx.scheduler.pending(&id).unwrap().fire_at.as_millis(), 70_000);
}

#[test]
fn test_schedule_replaces_pending_wake() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);
    let first = fx.scheduler.pending(&id).unwrap();

    fx.scheduler.schedule(&id, Duration::from_secs(5));

    let second = fx.scheduler.pending(&id).unwrap();
    assert_eq!(second.fire_at.as_millis(), 5_000);
    assert!(second.generation > first.generation);
    assert_ne!(second.handle, first.handle);
    assert_eq!(fx.timer().armed_count(), 1);
}

#[test]
fn test_stop_cancels_and_unregisters() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    fx.scheduler.stop(&id);

    assert!(!fx.scheduler.is_started(&id));
    assert!(fx.scheduler.pending(&id).is_none());
    assert!(fx.registry.is_empty());
    assert_eq!(fx.timer().armed_count(), 0);
    assert_eq!(fx.timer().cancelled_count(), 1);
}

#[test]
fn test_stop_with_nothing_scheduled_is_noop() {
    let fx = Fixture::new();
    let id = ClientId::new("ghost").unwrap();

    fx.scheduler.stop(&id);
    fx.scheduler.stop(&id);

    assert_eq!(fx.timer().cancelled_count(), 0);
    assert_eq!(fx.scheduler.pending_count(), 0);
}

#[test]
fn test_schedule_for_unstarted_client_is_ignored() {
    let fx = Fixture::new();
    let id = ClientId::new("c1").unwrap();

    fx.scheduler.schedule(&id, Duration::from_secs(1));

    assert_eq!(fx.timer().armed_count(), 0);
    assert!(fx.scheduler.pending(&id).is_none());
}

#[test]
fn test_degraded_tiers_follow_capabilities() {
    let cases = [
        (TimerCapabilities::full(), TimerTier::ExactAndAllowWhileIdle),
        (TimerCapabilities::exact_only(), TimerTier::Exact),
        (TimerCapabilities::inexact_only(), TimerTier::Inexact),
    ];

    for (capabilities, expected) in cases {
        let timer = Arc::new(ManualTimerService::with_capabilities(capabilities));
        let fx = Fixture::with_host(MockHost::with_timer(timer));
        let id = fx.start(&Arc::new(MockConnection::new("c1")));

        assert_eq!(fx.scheduler.pending(&id).unwrap().tier, expected);
        assert_eq!(fx.timer().armed()[0].1, expected);
    }
}

#[tokio::test]
async fn test_fired_wake_dispatches_and_clears_slot() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    let outcome = fx.timer().fire_next().await.flatten();

    assert_eq!(outcome, Some(FiringOutcome::Succeeded(OperationToken::new(1))));
    assert_eq!(connection.check_count(), 1);
    assert!(fx.scheduler.pending(&id).is_none());
    assert!(fx.scheduler.is_started(&id));
    assert_eq!(fx.guard.stats().outstanding, 0);
}

#[tokio::test]
async fn test_wake_after_stop_is_stale() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    // Simulate a timer that fires despite being cancelled.
    let handle = fx.scheduler.pending(&id).unwrap().handle;
    let (event, handler) = fx.timer().take(handle).unwrap();
    fx.scheduler.stop(&id);

    assert_eq!(handler.on_wake(event).await, None);
    assert_eq!(connection.check_count(), 0);
    assert_eq!(fx.guard.stats().acquired, 0);
}

#[tokio::test]
async fn test_superseded_wake_is_stale() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    let handle = fx.scheduler.pending(&id).unwrap().handle;
    let (event, handler) = fx.timer().take(handle).unwrap();
    fx.scheduler.schedule(&id, Duration::from_secs(30));

    assert_eq!(handler.on_wake(event).await, None);
    assert_eq!(connection.check_count(), 0);

    // The replacement still fires normally.
    assert!(fx.timer().fire_next().await.flatten().is_some());
    assert_eq!(connection.check_count(), 1);
}

#[tokio::test]
async fn test_wake_after_restart_is_stale() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    let handle = fx.scheduler.pending(&id).unwrap().handle;
    let (event, handler) = fx.timer().take(handle).unwrap();
    fx.scheduler.stop(&id);
    fx.start(&connection);

    assert_eq!(handler.on_wake(event).await, None);
    assert_eq!(fx.scheduler.pending_count(), 1);
}

#[tokio::test]
async fn test_firing_claimed_before_stop_still_releases_guard() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1").with_behavior(MockPingBehavior::Hold));
    let id = fx.start(&connection);

    let handle = fx.scheduler.pending(&id).unwrap().handle;
    let (event, handler) = fx.timer().take(handle).unwrap();
    let task = tokio::spawn(async move { handler.on_wake(event).await });

    for _ in 0..100 {
        if connection.held_count() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(connection.held_count(), 1);
    assert_eq!(fx.guard.held_count(&id), 1);

    fx.scheduler.stop(&id);
    assert!(connection.complete_success());

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, Some(FiringOutcome::Succeeded(_))));
    assert_eq!(fx.guard.held_count(&id), 0);
    assert_eq!(fx.host.suspend_service().held("test.c1"), 0);
}

#[tokio::test]
async fn test_at_most_one_pending_across_lifecycle() {
    let fx = Fixture::new();
    let connection = Arc::new(MockConnection::new("c1"));
    let id = fx.start(&connection);

    for step in 0..5u64 {
        fx.scheduler.schedule(&id, Duration::from_secs(step + 1));
        assert!(fx.timer().armed_count() <= 1);
        if step % 2 == 0 {
            fx.scheduler.stop(&id);
            assert_eq!(fx.timer().armed_count(), 0);
            fx.start(&connection);
        }
        assert_eq!(fx.timer().armed_count(), 1);
        assert_eq!(fx.scheduler.pending_count(), 1);
    }

    fx.timer().fire_next().await;
    assert_eq!(fx.timer().armed_count(), 0);
    assert_eq!(connection.check_count(), 1);
}

#[tokio::test]
async fn test_clients_are_independent() {
    let fx = Fixture::new();
    let c1 = Arc::new(MockConnection::new("c1"));
    let c2 = Arc::new(MockConnection::new("c2").with_interval(Duration::from_secs(30)));
    let id1 = fx.start(&c1);
    let id2 = fx.start(&c2);

    fx.scheduler.stop(&id1);

    assert!(fx.scheduler.pending(&id1).is_none());
    assert_eq!(fx.scheduler.pending(&id2).unwrap().fire_at.as_millis(), 30_000);
    fx.timer().fire_next().await;
    assert_eq!(c1.check_count(), 0);
    assert_eq!(c2.check_count(), 1);
}

#[tokio::test]
async fn test_unresolved_firing_forgets_client() {
    let fx = Fixture::new();
    let ids: Vec<ClientId> = ["c1", "c2", "c3"]
        .iter()
        .map(|id| fx.start(&Arc::new(MockConnection::new(id))))
        .collect();
    assert_eq!(fx.registry.len(), 3);

    for _ in 0..ids.len() {
        let outcome = fx.timer().fire_next().await.flatten();
        assert_eq!(
            outcome,
            Some(FiringOutcome::NotFound(NotFoundReason::Unresolved))
        );
    }

    for id in &ids {
        assert!(!fx.scheduler.is_started(id));
    }
    assert!(fx.registry.is_empty());
    assert_eq!(fx.scheduler.pending_count(), 0);
    assert_eq!(fx.guard.stats().acquired, 0);
}

#[tokio::test]
async fn test_unresolved_firing_keeps_restarted_client() {
    let fx = Fixture::new();
    let id = fx.start(&Arc::new(MockConnection::new("c1")));

    // Claim the dead connection's wake, then restart with a live one before
    // the firing finishes.
    let handle = fx.scheduler.pending(&id).unwrap().handle;
    let (event, _handler) = fx.timer().take(handle).unwrap();
    assert!(fx.scheduler.router.claim(&id, event.generation()));
    let live = Arc::new(MockConnection::new("c1"));
    fx.start(&live);

    fx.scheduler.router.forget_unresolved(&id);

    assert!(fx.scheduler.is_started(&id));
    assert!(fx.registry.resolve(&id).is_some());
    assert_eq!(fx.scheduler.pending_count(), 1);
}
