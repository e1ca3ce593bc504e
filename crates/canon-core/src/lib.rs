//! Core types, traits, errors, config, events, tracing, and locking for canon.
//!
//! Everything the analysis and storage crates share lives here so that
//! neither depends on the other.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod lock;
pub mod tracing;
pub mod traits;
pub mod types;
