// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Non-fatal engine diagnostics.
//!
//! Hooks never return errors. Anything that goes wrong while processing one
//! event is recorded here (and logged through `tracing`) and processing of
//! subsequent events continues unaffected.

use std::collections::VecDeque;
use std::fmt;

use crate::hook::EventKind;
use crate::ident::{ProducerId, SubscriberId};

/// Why a lifecycle event could not be attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The producer was never observed being subscribed to.
    UnknownProducer,
    /// The producer is tracked but has no subscription for the consumer.
    UnknownSubscription,
}

/// A condition worth surfacing to a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// A hook fired for a producer or subscription the engine has no record
    /// of, typically because instrumentation started after the subscribe.
    TrackingMiss {
        /// Event being processed.
        kind: EventKind,
        /// Producer the event concerned.
        producer: ProducerId,
        /// Consumer the event concerned.
        subscriber: SubscriberId,
        /// What was missing.
        reason: MissReason,
    },
    /// An `after_*` hook fired with an empty context stack.
    StackUnderflow {
        /// Kind of the after-hook.
        kind: EventKind,
    },
    /// An `after_*` hook popped a frame pushed for a different kind.
    FrameMismatch {
        /// Kind of the after-hook.
        expected: EventKind,
        /// Kind recorded on the popped frame.
        found: EventKind,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TrackingMiss {
                kind,
                producer,
                subscriber,
                reason: MissReason::UnknownProducer,
            } => write!(
                f,
                "{kind} on untracked {producer} ({subscriber}); subscriptions made before instrumentation are not snapshotted"
            ),
            Diagnostic::TrackingMiss {
                kind,
                producer,
                subscriber,
                reason: MissReason::UnknownSubscription,
            } => write!(f, "{kind} on {producer} for untracked {subscriber}"),
            Diagnostic::StackUnderflow { kind } => {
                write!(f, "after-{kind} with an empty context stack")
            }
            Diagnostic::FrameMismatch { expected, found } => {
                write!(f, "after-{expected} popped a {found} frame")
            }
        }
    }
}

/// Fixed-capacity ring of recent diagnostics; the oldest entry is dropped
/// once the ring is full. A capacity of zero retains nothing.
#[derive(Debug, Clone)]
pub(crate) struct DiagnosticRing {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    dropped: u64,
}

impl DiagnosticRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        if self.capacity == 0 {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.entries.push_back(diagnostic);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub(crate) fn drain(&mut self) -> Vec<Diagnostic> {
        self.entries.drain(..).collect()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}
