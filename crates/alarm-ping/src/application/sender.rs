//! Alarm Ping Sender
//!
//! The per-connection object the connection layer drives through the
//! [`PingSender`] lifecycle. It keeps only a weak handle on its connection:
//! connections usually own their sender, and a strong back-reference would
//! keep both alive forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use super::scheduler::AlarmScheduler;
use crate::domain::{ClientId, KeepAliveError};
use crate::ports::{Connection, HostContext, PingSender};

/// [`PingSender`] backed by the alarm scheduler.
pub struct AlarmPingSender {
    scheduler: Arc<AlarmScheduler>,
    host: Arc<dyn HostContext>,
    connection: RwLock<Option<Weak<dyn Connection>>>,
    client_id: RwLock<Option<ClientId>>,
    has_started: AtomicBool,
}

impl AlarmPingSender {
    /// Create a sender for connections living on `host`.
    pub fn new(scheduler: Arc<AlarmScheduler>, host: Arc<dyn HostContext>) -> Self {
        Self {
            scheduler,
            host,
            connection: RwLock::new(None),
            client_id: RwLock::new(None),
            has_started: AtomicBool::new(false),
        }
    }

    /// Whether `start` succeeded and `stop` has not been called since.
    pub fn has_started(&self) -> bool {
        self.has_started.load(Ordering::SeqCst)
    }

    /// Client id captured at `start`.
    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id.read().clone()
    }
}

impl PingSender for AlarmPingSender {
    fn init(&self, connection: &Arc<dyn Connection>) {
        *self.connection.write() = Some(Arc::downgrade(connection));
    }

    fn start(&self) -> Result<(), KeepAliveError> {
        let weak = self
            .connection
            .read()
            .clone()
            .ok_or(KeepAliveError::NotInitialized)?;
        let connection = weak.upgrade().ok_or(KeepAliveError::ConnectionGone)?;
        let client_id =
            ClientId::new(connection.client_id()).ok_or(KeepAliveError::InvalidClientId)?;

        self.scheduler.start(
            client_id.clone(),
            &connection,
            &self.host,
            connection.keep_alive_interval(),
        );
        *self.client_id.write() = Some(client_id);
        self.has_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if !self.has_started.swap(false, Ordering::SeqCst) {
            debug!("[alarm-ping] Stop before start, nothing to cancel");
            return;
        }
        if let Some(client_id) = self.client_id.read().clone() {
            self.scheduler.stop(&client_id);
        }
    }

    fn schedule(&self, delay: Duration) {
        match self.client_id.read().clone() {
            Some(client_id) => self.scheduler.schedule(&client_id, delay),
            None => debug!("[alarm-ping] Schedule before start ignored"),
        }
    }
}
