//! Runtime glue: session configuration and tracing setup.

pub mod config;
pub mod telemetry;
