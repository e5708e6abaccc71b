//! Telemetry module
//!
//! Structured logging through `tracing`.

mod init;

pub use init::init_telemetry;
