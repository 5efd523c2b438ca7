//! # Driving Ports (Inbound API)
//!
//! The lifecycle the connection layer drives on its keep-alive sender.

use std::sync::Arc;
use std::time::Duration;

use super::outbound::Connection;
use crate::domain::KeepAliveError;

/// Keep-alive sender bound to one connection.
///
/// The connection layer calls `init` once, `start` when the session is
/// established, `schedule` after each keep-alive round trip and `stop` on
/// disconnect.
///
/// # Example
///
/// ```rust,ignore
/// sender.init(&connection);
/// sender.start()?;
/// // ... after each PINGRESP:
/// sender.schedule(connection.keep_alive_interval());
/// // ... on disconnect:
/// sender.stop();
/// ```
pub trait PingSender: Send + Sync {
    /// Bind the sender to its connection.
    fn init(&self, connection: &Arc<dyn Connection>);

    /// Register the connection and schedule the first wake one keep-alive
    /// interval from now.
    fn start(&self) -> Result<(), KeepAliveError>;

    /// Cancel the pending wake. A no-op if the sender never started.
    fn stop(&self);

    /// Re-arm the single pending wake `delay` from now.
    fn schedule(&self, delay: Duration);
}
