//! # Domain Module
//!
//! Core types for the keep-alive subsystem.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
