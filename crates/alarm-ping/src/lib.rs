//! # Alarm Ping
//!
//! Alarm-driven keep-alive sender for long-lived client connections on a
//! host that may suspend itself.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Purpose
//!
//! A connection must send a keep-alive every interval. The host may be
//! asleep when that interval elapses, so each ping is driven by a
//! wake-capable one-shot timer and held awake with a suspend-prevention
//! guard until the round trip completes.
//!
//! ## Guarantees
//!
//! | Property | Description |
//! |----------|-------------|
//! | One pending wake | Each started client has at most one armed timer |
//! | Balanced guards | Every acquired guard is released exactly once |
//! | Weak identity | The registry never keeps a connection or host alive |
//! | Silent stop | No wake armed before `stop()` returns ever pings |
//!
//! ## Module Structure
//!
//! ```text
//! alarm-ping/
//! ├── domain/          # ClientId, WakeEvent, GuardToken, FiringOutcome, errors
//! ├── ports/           # PingSender (inbound) + Connection/Host/Timer/Suspend (outbound)
//! ├── application/     # Registry, guard, scheduler, dispatcher, sender, service
//! ├── adapters/        # Tokio timer, in-process suspend service, system clock
//! └── config.rs        # KeepAliveConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
#[cfg(feature = "tokio-timer")]
pub use adapters::TokioTimerService;
pub use adapters::{InProcessSuspendService, SystemTimeSource};
pub use application::{
    AlarmPingSender, AlarmScheduler, DispatchStats, GuardHold, GuardStats, IdentityRegistry,
    KeepAliveService, KeepAliveStats, LivenessGuard, PingDispatcher, ResolvedClient,
};
pub use config::{ConfigError, KeepAliveConfig, DEFAULT_GUARD_TAG_PREFIX};
pub use domain::{
    ClientId, FiringOutcome, GuardToken, HoldId, KeepAliveError, NotFoundReason, OperationToken,
    PingError, ScheduledWake, SuspendError, TimerCapabilities, TimerHandle, TimerTier, Timestamp,
    WakeEvent, CLIENT_ID_KEY,
};
pub use ports::{
    Completion, CompletionListener, Connection, HostContext, PingSender,
    SuspendPreventionService, TimeSource, TimerService, WakeHandler,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
