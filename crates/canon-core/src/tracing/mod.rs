//! Tracing setup and span helpers.

pub mod setup;
pub mod spans;

pub use setup::{init_tracing, init_tracing_with};
