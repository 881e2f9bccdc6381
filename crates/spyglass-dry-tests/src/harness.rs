// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime + engine fixture wired together.

use crate::clock::ManualClock;
use crate::runtime::ScriptedRuntime;
use spyglass_core::{Snapshot, SnapshotConfig, SnapshotEngine, SnapshotHandle, SnapshotOptions};

/// A [`ScriptedRuntime`] with a [`SnapshotEngine`] registered as its first
/// listener, sharing the runtime's tick counter and a [`ManualClock`].
///
/// # Example
///
/// ```
/// use spyglass_dry_tests::{FakeProducer, Harness};
///
/// let mut h = Harness::new();
/// let p = FakeProducer::new(1);
/// let s = h.runtime.subscriber();
/// h.runtime.subscribe(&p, s);
/// assert_eq!(h.snapshot().len(), 1);
/// ```
#[derive(Debug)]
pub struct Harness {
    /// Event dispatcher.
    pub runtime: ScriptedRuntime,
    /// Shared handle to the registered engine.
    pub engine: SnapshotHandle,
    /// Wall clock used for value timestamps.
    pub clock: ManualClock,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Fixture with the default engine configuration.
    pub fn new() -> Self {
        Self::with_config(SnapshotConfig::default())
    }

    /// Fixture with a custom engine configuration.
    pub fn with_config(config: SnapshotConfig) -> Self {
        Self::with_engine(config, |engine| engine)
    }

    /// Fixture whose engine is adjusted by `customize` before registration,
    /// e.g. to install a tag resolver.
    pub fn with_engine(
        config: SnapshotConfig,
        customize: impl FnOnce(SnapshotEngine) -> SnapshotEngine,
    ) -> Self {
        crate::init_tracing();
        let mut runtime = ScriptedRuntime::new();
        let clock = ManualClock::new(0);
        let engine = SnapshotHandle::new(customize(
            SnapshotEngine::new(config, runtime.ticks()).with_clock(clock.clone()),
        ));
        runtime.add_hook(engine.clone());
        Self {
            runtime,
            engine,
            clock,
        }
    }

    /// Unfiltered snapshot of the engine.
    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot(SnapshotOptions::default())
    }
}
