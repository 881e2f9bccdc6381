// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted runtime that dispatches nested lifecycle events.
//!
//! Tests describe a reactive program as nested closures: whatever a body
//! dispatches happens between the enclosing event's `before_*` and
//! `after_*` calls, exactly as an operator subscribing to its source inside
//! its own subscribe would.

use spyglass_core::{
    Event, Hook, HookSet, Payload, Producer, SubscriberId, TickCounter, TickSource,
};
use std::any::Any;
use std::fmt;

/// Minimal stand-in for an instrumented reactive runtime.
#[derive(Debug)]
pub struct ScriptedRuntime {
    hooks: HookSet,
    ticks: TickCounter,
    next_subscriber: u64,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRuntime {
    /// Create a runtime with no listeners and a fresh tick counter.
    pub fn new() -> Self {
        let ticks = TickCounter::new();
        Self {
            hooks: HookSet::with_ticks(ticks.clone()),
            ticks,
            next_subscriber: 0,
        }
    }

    /// Register a listener after all previously registered ones.
    pub fn add_hook(&mut self, hook: impl Hook + 'static) {
        self.hooks.add(hook);
    }

    /// Shared tick counter advanced once per dispatched event.
    pub fn ticks(&self) -> TickCounter {
        self.ticks.clone()
    }

    /// Current tick.
    pub fn tick(&self) -> u64 {
        self.ticks.current()
    }

    /// Allocate a fresh subscriber identity.
    pub fn subscriber(&mut self) -> SubscriberId {
        self.next_subscriber += 1;
        SubscriberId::from_raw(self.next_subscriber)
    }

    /// Dispatch `event`, running `body` between its two halves.
    pub fn dispatch<R>(&mut self, event: &Event<'_>, body: impl FnOnce(&mut Self) -> R) -> R {
        self.hooks.dispatch_before(event);
        let out = body(self);
        self.hooks.dispatch_after(event);
        out
    }

    /// Subscribe `subscriber` to `producer`, running `body` inside the subscribe.
    pub fn subscribe_with(
        &mut self,
        producer: &dyn Producer,
        subscriber: SubscriberId,
        body: impl FnOnce(&mut Self),
    ) {
        let event = Event::Subscribe {
            producer,
            subscriber,
        };
        self.dispatch(&event, body);
    }

    /// Subscribe `subscriber` to `producer` with nothing nested.
    pub fn subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.subscribe_with(producer, subscriber, |_| {});
    }

    /// Unsubscribe `subscriber` from `producer`.
    pub fn unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        let event = Event::Unsubscribe {
            producer,
            subscriber,
        };
        self.dispatch(&event, |_| {});
    }

    /// Deliver `value` from `producer` to `subscriber`, running `body` inside
    /// the emission.
    pub fn next_with<T>(
        &mut self,
        producer: &dyn Producer,
        subscriber: SubscriberId,
        value: T,
        body: impl FnOnce(&mut Self),
    ) where
        T: Any + fmt::Debug + Send + Sync,
    {
        let value = Payload::new(value);
        let event = Event::Next {
            producer,
            subscriber,
            value: &value,
        };
        self.dispatch(&event, body);
    }

    /// Deliver `value` from `producer` to `subscriber`.
    pub fn next<T>(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: T)
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        self.next_with(producer, subscriber, value, |_| {});
    }

    /// Deliver the failure `error` from `producer` to `subscriber`.
    pub fn error<T>(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: T)
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        let error = Payload::new(error);
        let event = Event::Error {
            producer,
            subscriber,
            error: &error,
        };
        self.dispatch(&event, |_| {});
    }

    /// Signal completion from `producer` to `subscriber`.
    pub fn complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        let event = Event::Complete {
            producer,
            subscriber,
        };
        self.dispatch(&event, |_| {});
    }
}
