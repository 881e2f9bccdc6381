// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded, most-recent-last value history.
use std::collections::VecDeque;

use crate::ident::Payload;

/// A value together with the wall-clock time it was observed.
#[derive(Debug, Clone)]
pub struct TimedValue {
    /// Observation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Observed value.
    pub value: Payload,
}

/// Ordered value history with an eviction count.
///
/// Values are appended at the back. [`ValueHistory::trim`] evicts from the
/// front and accumulates the number evicted in `flushed`; evicted values are
/// not retrievable.
#[derive(Debug, Clone, Default)]
pub struct ValueHistory {
    values: VecDeque<TimedValue>,
    flushed: u64,
}

impl ValueHistory {
    /// Appends a value observed at `timestamp`.
    pub fn push(&mut self, timestamp: u64, value: Payload) {
        self.values.push_back(TimedValue { timestamp, value });
    }

    /// Keeps only the last `keep` values and returns how many were evicted.
    pub fn trim(&mut self, keep: usize) -> usize {
        let excess = self.values.len().saturating_sub(keep);
        if excess > 0 {
            self.values.drain(..excess);
            self.flushed = self
                .flushed
                .saturating_add(u64::try_from(excess).unwrap_or(u64::MAX));
        }
        excess
    }

    /// Number of retained values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no value is retained.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total number of values evicted by [`ValueHistory::trim`].
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    /// Retained values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TimedValue> {
        self.values.iter()
    }

    /// Most recently appended value.
    pub fn last(&self) -> Option<&TimedValue> {
        self.values.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(history: &ValueHistory) -> Vec<i32> {
        history
            .iter()
            .filter_map(|v| v.value.downcast_ref::<i32>().copied())
            .collect()
    }

    #[test]
    fn trim_keeps_most_recent_and_counts_evictions() {
        let mut history = ValueHistory::default();
        for (ts, v) in (1_u64..).zip(1..=5) {
            history.push(ts, Payload::new(v));
        }
        assert_eq!(history.trim(2), 3);
        assert_eq!(ints(&history), vec![4, 5]);
        assert_eq!(history.flushed(), 3);

        assert_eq!(history.trim(2), 0);
        assert_eq!(history.flushed(), 3);
    }

    #[test]
    fn trim_to_zero_empties_history() {
        let mut history = ValueHistory::default();
        history.push(0, Payload::new(1));
        history.push(1, Payload::new(2));
        assert_eq!(history.trim(0), 2);
        assert!(history.is_empty());
        assert!(history.last().is_none());
    }
}
