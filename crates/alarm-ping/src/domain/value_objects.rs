//! Value Objects for the keep-alive subsystem
//!
//! Small immutable types shared by every component: client identity,
//! wall-clock timestamps, opaque handles and the timer capability tiers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque, process-unique identifier of one logical connection.
///
/// Immutable once assigned. An empty identifier is never valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client identity.
    ///
    /// Returns `None` if `id` is empty. Any other string is accepted as is.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            return None;
        }
        Some(Self(id))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Wall-clock timestamp in milliseconds since the Unix epoch.
///
/// Wake events are scheduled against the real-time clock so they keep their
/// meaning across process suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// `self + delay`, saturating at `u64::MAX`.
    pub fn saturating_add(&self, delay: Duration) -> Self {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(delay_ms))
    }

    /// Time remaining from `now` until `self` (zero if already passed).
    pub fn duration_since(&self, now: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(now.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Token returned by the connection layer when a keep-alive was actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationToken(u64);

impl OperationToken {
    /// Wrap a connection-layer operation id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw operation id.
    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Identifier of one hold granted by a suspend-prevention service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldId(pub u64);

/// Identifier of one armed timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Precision tier of a wake-capable timer, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerTier {
    /// Exact fire time, delivered even while the host is idle/dozing.
    ExactAndAllowWhileIdle,
    /// Exact fire time; may be deferred while the host is idle.
    Exact,
    /// The platform may batch or delay the wake.
    Inexact,
}

impl TimerTier {
    /// Pick the most precise tier the platform supports.
    ///
    /// Selection is driven purely by reported capability; callers never
    /// probe a tier and fall back on failure.
    pub fn select(capabilities: TimerCapabilities) -> Self {
        match (capabilities.exact, capabilities.allow_while_idle) {
            (true, true) => Self::ExactAndAllowWhileIdle,
            (true, false) => Self::Exact,
            (false, _) => Self::Inexact,
        }
    }

    /// Whether this tier is below the best available one.
    pub fn is_degraded(&self) -> bool {
        *self != Self::ExactAndAllowWhileIdle
    }
}

impl fmt::Display for TimerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactAndAllowWhileIdle => write!(f, "exact-and-allow-while-idle"),
            Self::Exact => write!(f, "exact"),
            Self::Inexact => write!(f, "inexact"),
        }
    }
}

/// What a platform timer service can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerCapabilities {
    /// Fires at the exact requested time.
    pub exact: bool,
    /// Fires even while the host is in its idle/suspended power state.
    pub allow_while_idle: bool,
}

impl TimerCapabilities {
    /// Full capability: exact and idle-exempt.
    pub const fn full() -> Self {
        Self {
            exact: true,
            allow_while_idle: true,
        }
    }

    /// Exact timers without idle exemption.
    pub const fn exact_only() -> Self {
        Self {
            exact: true,
            allow_while_idle: false,
        }
    }

    /// Only inexact (batched) timers.
    pub const fn inexact_only() -> Self {
        Self {
            exact: false,
            allow_while_idle: false,
        }
    }
}

impl Default for TimerCapabilities {
    fn default() -> Self {
        Self::full()
    }
}
