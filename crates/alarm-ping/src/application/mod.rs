//! # Application Layer
//!
//! The four keep-alive components and the facades that wire them:
//!
//! - `registry` - client id → weak (connection, host)
//! - `guard` - suspend-prevention token ledger
//! - `scheduler` - one pending wake per client
//! - `dispatcher` - resolve, guard, ping, release
//! - `sender` / `service` - per-connection lifecycle and process-wide owner

mod dispatcher;
mod guard;
mod registry;
mod scheduler;
mod sender;
mod service;

pub use dispatcher::{DispatchStats, PingDispatcher};
pub use guard::{GuardHold, GuardStats, LivenessGuard};
pub use registry::{IdentityRegistry, ResolvedClient};
pub use scheduler::AlarmScheduler;
pub use sender::AlarmPingSender;
pub use service::{KeepAliveService, KeepAliveStats};
