// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hook that records every call it receives.

use spyglass_core::{EventKind, Hook, Payload, Producer, ProducerId, SubscriberId};
use std::cell::RefCell;
use std::rc::Rc;

/// Which half of an event a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `before_*` call.
    Before,
    /// `after_*` call.
    After,
}

/// One recorded hook call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Half of the event.
    pub phase: Phase,
    /// Event kind.
    pub kind: EventKind,
    /// Producer passed to the hook.
    pub producer: ProducerId,
    /// Subscriber passed to the hook.
    pub subscriber: SubscriberId,
    /// Value or failure, for `next`/`error`.
    pub payload: Option<Payload>,
}

impl RecordedCall {
    /// Compact `"before:next"` style label, handy for order assertions.
    pub fn label(&self) -> String {
        let phase = match self.phase {
            Phase::Before => "before",
            Phase::After => "after",
        };
        format!("{phase}:{}", self.kind)
    }
}

/// [`Hook`] that appends every call to a shared log.
///
/// Clones share the log: register one clone and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingHook {
    calls: Rc<RefCell<Vec<RecordedCall>>>,
}

impl RecordingHook {
    /// Create a hook with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every call recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Labels of every call recorded so far.
    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(RecordedCall::label).collect()
    }

    /// Forget all recorded calls.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(
        &self,
        phase: Phase,
        kind: EventKind,
        producer: &dyn Producer,
        subscriber: SubscriberId,
        payload: Option<&Payload>,
    ) {
        self.calls.borrow_mut().push(RecordedCall {
            phase,
            kind,
            producer: producer.id(),
            subscriber,
            payload: payload.cloned(),
        });
    }
}

impl Hook for RecordingHook {
    fn before_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::Before, EventKind::Subscribe, producer, subscriber, None);
    }

    fn after_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::After, EventKind::Subscribe, producer, subscriber, None);
    }

    fn before_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::Before, EventKind::Unsubscribe, producer, subscriber, None);
    }

    fn after_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::After, EventKind::Unsubscribe, producer, subscriber, None);
    }

    fn before_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        self.record(Phase::Before, EventKind::Next, producer, subscriber, Some(value));
    }

    fn after_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        self.record(Phase::After, EventKind::Next, producer, subscriber, Some(value));
    }

    fn before_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        self.record(Phase::Before, EventKind::Error, producer, subscriber, Some(error));
    }

    fn after_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        self.record(Phase::After, EventKind::Error, producer, subscriber, Some(error));
    }

    fn before_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::Before, EventKind::Complete, producer, subscriber, None);
    }

    fn after_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.record(Phase::After, EventKind::Complete, producer, subscriber, None);
    }
}
