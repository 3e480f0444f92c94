//! # Reel Core
//!
//! Shared error definitions and tracing setup used by every crate of the
//! Reel GPU job scheduler.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
pub use telemetry::{init_telemetry, TelemetryConfig};
