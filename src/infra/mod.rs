//! Infrastructure adapters and runtime bootstrap.

pub mod artifact;
pub mod error;
pub mod http;
pub mod telemetry;
