//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations of the driven ports.
//!
//! - `SystemTimeSource` - wall clock
//! - `InProcessSuspendService` - reference-counted named holds
//! - `TokioTimerService` - wake timers on the Tokio runtime (`tokio-timer`)

mod suspend;
mod time;

#[cfg(feature = "tokio-timer")]
mod timer;

pub use suspend::InProcessSuspendService;
pub use time::SystemTimeSource;

#[cfg(feature = "tokio-timer")]
pub use timer::TokioTimerService;
