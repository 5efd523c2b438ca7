//! # Alarm Ping Node
//!
//! Runs the keep-alive service against simulated connections.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (first CLI argument, else `ALARM_PING_CONFIG`,
//!    else built-in defaults)
//! 2. Initialize logging (`RUST_LOG`, else `log_level` from the config)
//! 3. Build the host (in-process suspend service + Tokio timer)
//! 4. Start one ping sender per configured client
//! 5. Run until Ctrl+C, then stop every sender

mod config;
mod simulated;

use std::sync::Arc;
use std::time::Duration;

use alarm_ping::{
    AlarmPingSender, Connection, KeepAliveService, PingSender, SystemTimeSource, TimeSource,
    TokioTimerService,
};
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{config_path, RuntimeConfig, CONFIG_ENV};
use crate::simulated::{RuntimeHost, SimulatedConnection};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

struct Client {
    connection: Arc<SimulatedConnection>,
    sender: Arc<AlarmPingSender>,
}

/// Keep-alive service plus the simulated clients it drives.
pub struct AlarmPingNode {
    service: KeepAliveService,
    host: Arc<RuntimeHost>,
    clients: Vec<Client>,
}

impl AlarmPingNode {
    /// Build the node. Must be called inside a Tokio runtime.
    pub fn new(config: &RuntimeConfig, time_source: Arc<dyn TimeSource>) -> Self {
        let timer = TokioTimerService::from_config(&config.keepalive, time_source.clone());
        let host = Arc::new(RuntimeHost::new(timer));
        let service = KeepAliveService::new(config.keepalive.clone(), time_source);

        let clients = config
            .clients
            .iter()
            .map(|client| {
                let connection = Arc::new(SimulatedConnection::new(client));
                let sender = Arc::new(service.sender(host.clone()));
                connection.attach(&sender);
                Client { connection, sender }
            })
            .collect();

        Self {
            service,
            host,
            clients,
        }
    }

    /// Start every client's ping sender.
    pub fn start(&self) -> Result<()> {
        for client in &self.clients {
            let connection: Arc<dyn Connection> = client.connection.clone();
            client.sender.init(&connection);
            client
                .sender
                .start()
                .with_context(|| format!("failed to start client {:?}", connection.client_id()))?;
        }
        info!("[alarm-ping] Started {} client(s)", self.clients.len());
        Ok(())
    }

    /// Stop every client's ping sender.
    pub fn shutdown(&self) {
        info!("[alarm-ping] Stopping {} client(s)", self.clients.len());
        for client in &self.clients {
            client.sender.stop();
        }
        let pruned = self.service.prune_expired();
        if pruned > 0 {
            info!("[alarm-ping] Pruned {} expired registry entries", pruned);
        }
    }

    /// Log service and per-client counters.
    pub fn log_stats(&self) {
        let stats = self.service.stats();
        info!(
            "[alarm-ping] fired={} succeeded={} failed={} start_failed={} not_found={} guards_outstanding={} holds={} armed={}",
            stats.dispatch.fired,
            stats.dispatch.succeeded,
            stats.dispatch.failed,
            stats.dispatch.start_failed,
            stats.dispatch.not_found,
            stats.guard.outstanding,
            self.host.holds(),
            self.host.armed(),
        );
        for client in &self.clients {
            info!(
                "[alarm-ping] {} sent={} failed={}",
                client.connection.client_id(),
                client.connection.sent(),
                client.connection.failed()
            );
        }
        if stats.guard.ignored_releases > 0 {
            warn!(
                "[alarm-ping] {} guard releases were ignored",
                stats.guard.ignored_releases
            );
        }
    }
}

fn load_config() -> Result<RuntimeConfig> {
    match config_path(std::env::args().skip(1), std::env::var(CONFIG_ENV).ok()) {
        Some(path) => RuntimeConfig::load(&path),
        None => Ok(RuntimeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Alarm Ping Node v{}", alarm_ping::VERSION);
    info!("===========================================");

    let node = AlarmPingNode::new(&config, Arc::new(SystemTimeSource::new()));
    node.start()?;

    info!("Node is running. Press Ctrl+C to stop.");
    let mut stats = tokio::time::interval(STATS_INTERVAL);
    stats.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                break;
            }
            _ = stats.tick() => node.log_stats(),
        }
    }

    node.shutdown();
    node.log_stats();
    Ok(())
}
