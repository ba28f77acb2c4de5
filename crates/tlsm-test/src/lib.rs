//! TLSM Test - Shared test utilities for the TLSM crates.
//!
//! This crate provides mock collaborators and fixtures used across the
//! TLSM crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tlsm-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use tlsm_test::{MockIdentity, test_request};
//! use tlsm_core::{Operation, TaskId};
//!
//! let identity = MockIdentity::new().with_task(TaskId(1), "/bin/cat", 1000);
//! let request = test_request(Operation::FileOpen, "/etc/shadow");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test-friendly tracing subscriber.
///
/// Honours `RUST_LOG`; safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
