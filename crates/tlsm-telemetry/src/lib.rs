//! TLSM Telemetry - Logging setup for the TLSM decision engine.
//!
//! Every TLSM crate logs through `tracing` with structured fields. This
//! crate installs the subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use tlsm_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tlsm_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tlsm_approval=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("engine starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
