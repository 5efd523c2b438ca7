//! Domain Entities for the keep-alive subsystem
//!
//! Wake events, scheduled wakes, guard tokens and the terminal outcome of a
//! single firing.

use std::collections::BTreeMap;

use super::errors::PingError;
use super::value_objects::{ClientId, OperationToken, Timestamp, TimerHandle, TimerTier};

/// Payload key carrying the client identity inside a wake event.
pub const CLIENT_ID_KEY: &str = "clientId";

/// Payload delivered by the timer service when a wake fires.
///
/// The payload is a flat string map (the client id lives under
/// [`CLIENT_ID_KEY`]) plus the generation of the schedule that armed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeEvent {
    extras: BTreeMap<String, String>,
    generation: u64,
    fire_at: Timestamp,
}

impl WakeEvent {
    /// Build the event armed for `client_id`.
    pub fn for_client(client_id: &ClientId, generation: u64, fire_at: Timestamp) -> Self {
        let mut extras = BTreeMap::new();
        extras.insert(CLIENT_ID_KEY.to_string(), client_id.as_str().to_string());
        Self {
            extras,
            generation,
            fire_at,
        }
    }

    /// Build an event from a raw payload (e.g. delivered by a foreign timer).
    pub fn from_extras(extras: BTreeMap<String, String>, generation: u64, fire_at: Timestamp) -> Self {
        Self {
            extras,
            generation,
            fire_at,
        }
    }

    /// The client identity carried by the payload.
    ///
    /// `None` when the key is missing or the value is empty.
    pub fn client_id(&self) -> Option<ClientId> {
        self.extras
            .get(CLIENT_ID_KEY)
            .and_then(|raw| ClientId::new(raw.as_str()))
    }

    /// Look up an arbitrary payload entry.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    /// Schedule generation that produced this event.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time the event was scheduled to fire.
    pub fn fire_at(&self) -> Timestamp {
        self.fire_at
    }
}

/// The single pending wake for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledWake {
    /// Client this wake belongs to.
    pub client_id: ClientId,
    /// Requested fire time.
    pub fire_at: Timestamp,
    /// Timer tier the wake was armed with.
    pub tier: TimerTier,
    /// Per-client schedule generation.
    pub generation: u64,
    /// Handle used to cancel the armed timer.
    pub handle: TimerHandle,
}

/// "Operation in flight, do not suspend" for one client.
///
/// Deliberately not `Clone`: each token is owned by the code path that
/// acquired it until that path releases it.
#[derive(Debug, PartialEq, Eq)]
pub struct GuardToken {
    pub(crate) id: u64,
    pub(crate) client_id: ClientId,
    pub(crate) tag: String,
}

impl GuardToken {
    /// Ledger id of this token.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Client the token was acquired for.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Human-diagnosable hold name.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// Why a firing ended without touching the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Payload had no usable client id.
    MissingClientId,
    /// Registry had no live entry for the client.
    Unresolved,
}

/// Terminal state of one wake firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiringOutcome {
    /// Identity missing or unresolved; no guard was acquired.
    NotFound(NotFoundReason),
    /// The connection sent nothing; guard released immediately.
    StartFailed,
    /// Keep-alive completed successfully; guard released.
    Succeeded(OperationToken),
    /// Keep-alive failed in the connection layer; guard released.
    Failed {
        /// Operation that failed.
        operation: OperationToken,
        /// Error reported by the connection layer.
        error: PingError,
    },
}

impl FiringOutcome {
    /// Whether this firing acquired (and therefore released) a guard.
    pub fn acquired_guard(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}
