// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Logical tick source and wall clock.
//!
//! The tick is a logical clock used only to order snapshots and compute
//! incremental diffs. It is owned by whoever dispatches lifecycle events and
//! injected into the engine, so tests can drive it deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current logical tick.
///
/// # Invariants
/// - Successive calls to [`TickSource::current`] never decrease.
pub trait TickSource {
    /// Returns the current tick value.
    fn current(&self) -> u64;
}

/// Shared, monotonically increasing tick counter.
///
/// Clones share the same underlying counter: the dispatcher advances it and
/// the engine reads it.
#[derive(Debug, Clone, Default)]
pub struct TickCounter {
    inner: Arc<AtomicU64>,
}

impl TickCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter starting at `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Increments the counter and returns the new value.
    ///
    /// Saturates at `u64::MAX` rather than wrapping, preserving monotonicity.
    pub fn advance(&self) -> u64 {
        let prev = self
            .inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some(t.saturating_add(1))
            })
            .unwrap_or_else(|t| t);
        prev.saturating_add(1)
    }
}

impl TickSource for TickCounter {
    fn current(&self) -> u64 {
        self.inner.load(Ordering::Acquire)
    }
}

/// Wall-clock source for value timestamps (milliseconds since the Unix epoch).
pub trait Clock {
    /// Returns the current time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`]. Falls back to 0 on clock errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}
