// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Spyglass crates.
#![forbid(unsafe_code)]
//!
//! This crate provides commonly used test utilities to reduce duplication
//! across the Spyglass test suite.
//!
//! # Modules
//!
//! - [`clock`] - Manually driven wall clock
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`harness`] - Runtime + engine fixture wired together
//! - [`producers`] - Fake producers with configurable identity, kind and tag
//! - [`recording`] - Hook that records every call it receives
//! - [`runtime`] - Scripted runtime that dispatches nested lifecycle events

pub mod clock;
pub mod config;
pub mod harness;
pub mod producers;
pub mod recording;
pub mod runtime;

// Re-export commonly used items at crate root for convenience
pub use clock::ManualClock;
pub use config::InMemoryConfigStore;
pub use harness::Harness;
pub use producers::FakeProducer;
pub use recording::{Phase, RecordedCall, RecordingHook};
pub use runtime::ScriptedRuntime;

/// Installs a test-friendly `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
