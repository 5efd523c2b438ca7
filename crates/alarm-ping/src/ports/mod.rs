//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** the ping sender lifecycle exposed to the
//!   connection layer
//! - **Driven Ports (Outbound):** connection, host, suspend-prevention,
//!   timer and time interfaces this subsystem consumes

pub mod inbound;
pub mod outbound;

pub use inbound::PingSender;
pub use outbound::{
    Completion, CompletionListener, Connection, HostContext, SuspendPreventionService,
    TimeSource, TimerService, WakeHandler,
};
