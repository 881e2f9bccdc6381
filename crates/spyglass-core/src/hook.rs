// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lifecycle hook interface and ordered listener fan-out.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::clock::TickCounter;
use crate::ident::{Payload, Producer, SubscriberId};

/// Lifecycle event kinds observed on a producer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EventKind {
    /// A consumer subscribed to the producer.
    Subscribe,
    /// A consumer unsubscribed from the producer.
    Unsubscribe,
    /// The producer emitted a value.
    Next,
    /// The producer terminated with a failure.
    Error,
    /// The producer terminated successfully.
    Complete,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Subscribe,
        EventKind::Unsubscribe,
        EventKind::Next,
        EventKind::Error,
        EventKind::Complete,
    ];

    /// Lowercase name used in logs and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Subscribe => "subscribe",
            EventKind::Unsubscribe => "unsubscribe",
            EventKind::Next => "next",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            EventKind::Subscribe => 1 << 0,
            EventKind::Unsubscribe => 1 << 1,
            EventKind::Next => 1 << 2,
            EventKind::Error => 1 << 3,
            EventKind::Complete => 1 << 4,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind: {0}")]
pub struct ParseEventKindError(pub String);

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseEventKindError(s.to_owned()))
    }
}

/// Compact set of [`EventKind`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct EventKindSet(u8);

impl EventKindSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing every kind.
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    /// Set containing exactly `kinds`.
    #[must_use]
    pub fn of(kinds: &[EventKind]) -> Self {
        kinds.iter().copied().collect()
    }

    /// Adds `kind` to the set.
    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    /// Returns `true` when `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns `true` when no kind is in the set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the member kinds in declaration order.
    pub fn iter(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<EventKind> for EventKindSet {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Instrumentation listener.
///
/// The runtime calls the `before_*` method immediately before it performs a
/// lifecycle action on a producer and the matching `after_*` method
/// immediately after. Every method defaults to a no-op, so listeners override
/// only what they need.
///
/// Implementations must not panic during normal operation and must not
/// mutate the producer or consumer they are handed.
#[allow(unused_variables)]
pub trait Hook {
    /// Called before `subscriber` subscribes to `producer`.
    fn before_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
    /// Called after `subscriber` subscribed to `producer`.
    fn after_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
    /// Called before `subscriber` unsubscribes from `producer`.
    fn before_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
    /// Called after `subscriber` unsubscribed from `producer`.
    fn after_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
    /// Called before `producer` delivers `value` to `subscriber`.
    fn before_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
    }
    /// Called after `producer` delivered `value` to `subscriber`.
    fn after_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {}
    /// Called before `producer` delivers the failure `error` to `subscriber`.
    fn before_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
    }
    /// Called after `producer` delivered the failure `error` to `subscriber`.
    fn after_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {}
    /// Called before `producer` signals completion to `subscriber`.
    fn before_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
    /// Called after `producer` signalled completion to `subscriber`.
    fn after_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {}
}

/// One lifecycle event, as a tagged union over the five kinds.
#[derive(Clone, Copy)]
pub enum Event<'a> {
    /// See [`EventKind::Subscribe`].
    Subscribe {
        /// Producer being subscribed to.
        producer: &'a dyn Producer,
        /// Consumer subscribing.
        subscriber: SubscriberId,
    },
    /// See [`EventKind::Unsubscribe`].
    Unsubscribe {
        /// Producer being unsubscribed from.
        producer: &'a dyn Producer,
        /// Consumer unsubscribing.
        subscriber: SubscriberId,
    },
    /// See [`EventKind::Next`].
    Next {
        /// Emitting producer.
        producer: &'a dyn Producer,
        /// Receiving consumer.
        subscriber: SubscriberId,
        /// Emitted value.
        value: &'a Payload,
    },
    /// See [`EventKind::Error`].
    Error {
        /// Failing producer.
        producer: &'a dyn Producer,
        /// Receiving consumer.
        subscriber: SubscriberId,
        /// Failure payload.
        error: &'a Payload,
    },
    /// See [`EventKind::Complete`].
    Complete {
        /// Completing producer.
        producer: &'a dyn Producer,
        /// Receiving consumer.
        subscriber: SubscriberId,
    },
}

impl<'a> Event<'a> {
    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::Subscribe { .. } => EventKind::Subscribe,
            Event::Unsubscribe { .. } => EventKind::Unsubscribe,
            Event::Next { .. } => EventKind::Next,
            Event::Error { .. } => EventKind::Error,
            Event::Complete { .. } => EventKind::Complete,
        }
    }

    /// Producer the event concerns.
    #[must_use]
    pub fn producer(&self) -> &'a dyn Producer {
        match *self {
            Event::Subscribe { producer, .. }
            | Event::Unsubscribe { producer, .. }
            | Event::Next { producer, .. }
            | Event::Error { producer, .. }
            | Event::Complete { producer, .. } => producer,
        }
    }

    /// Consumer the event concerns.
    #[must_use]
    pub const fn subscriber(&self) -> SubscriberId {
        match *self {
            Event::Subscribe { subscriber, .. }
            | Event::Unsubscribe { subscriber, .. }
            | Event::Next { subscriber, .. }
            | Event::Error { subscriber, .. }
            | Event::Complete { subscriber, .. } => subscriber,
        }
    }

    /// Value for `next`, failure for `error`, `None` otherwise.
    #[must_use]
    pub fn payload(&self) -> Option<&'a Payload> {
        match *self {
            Event::Next { value, .. } => Some(value),
            Event::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Invokes the `before_*` method of `hook` matching this event.
    pub fn before(&self, hook: &mut dyn Hook) {
        match *self {
            Event::Subscribe {
                producer,
                subscriber,
            } => hook.before_subscribe(producer, subscriber),
            Event::Unsubscribe {
                producer,
                subscriber,
            } => hook.before_unsubscribe(producer, subscriber),
            Event::Next {
                producer,
                subscriber,
                value,
            } => hook.before_next(producer, subscriber, value),
            Event::Error {
                producer,
                subscriber,
                error,
            } => hook.before_error(producer, subscriber, error),
            Event::Complete {
                producer,
                subscriber,
            } => hook.before_complete(producer, subscriber),
        }
    }

    /// Invokes the `after_*` method of `hook` matching this event.
    pub fn after(&self, hook: &mut dyn Hook) {
        match *self {
            Event::Subscribe {
                producer,
                subscriber,
            } => hook.after_subscribe(producer, subscriber),
            Event::Unsubscribe {
                producer,
                subscriber,
            } => hook.after_unsubscribe(producer, subscriber),
            Event::Next {
                producer,
                subscriber,
                value,
            } => hook.after_next(producer, subscriber, value),
            Event::Error {
                producer,
                subscriber,
                error,
            } => hook.after_error(producer, subscriber, error),
            Event::Complete {
                producer,
                subscriber,
            } => hook.after_complete(producer, subscriber),
        }
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind())
            .field("producer", &self.producer().id())
            .field("subscriber", &self.subscriber())
            .field("payload", &self.payload())
            .finish()
    }
}

/// Ordered set of registered listeners.
///
/// Every event is delivered to every listener in registration order. When
/// built with [`HookSet::with_ticks`], the shared tick counter is advanced
/// once per event before any `before_*` listener runs.
#[derive(Default)]
pub struct HookSet {
    hooks: Vec<Box<dyn Hook>>,
    ticks: Option<TickCounter>,
}

impl HookSet {
    /// Creates an empty set that does not drive a tick counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set that advances `ticks` on every event.
    pub fn with_ticks(ticks: TickCounter) -> Self {
        Self {
            hooks: Vec::new(),
            ticks: Some(ticks),
        }
    }

    /// Registers `hook` after all previously registered listeners.
    pub fn add<H: Hook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Delivers the `before_*` half of `event` to every listener.
    pub fn dispatch_before(&mut self, event: &Event<'_>) {
        if let Some(ticks) = &self.ticks {
            ticks.advance();
        }
        for hook in &mut self.hooks {
            event.before(hook.as_mut());
        }
    }

    /// Delivers the `after_*` half of `event` to every listener.
    pub fn dispatch_after(&mut self, event: &Event<'_>) {
        for hook in &mut self.hooks {
            event.after(hook.as_mut());
        }
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("hooks", &self.hooks.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::ProducerId;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Source;

    impl Producer for Source {
        fn id(&self) -> ProducerId {
            ProducerId::from_raw(1)
        }
    }

    struct Log {
        name: &'static str,
        out: Rc<RefCell<Vec<String>>>,
    }

    impl Hook for Log {
        fn before_next(&mut self, _: &dyn Producer, _: SubscriberId, value: &Payload) {
            self.out
                .borrow_mut()
                .push(format!("{}:before:{value:?}", self.name));
        }

        fn after_next(&mut self, _: &dyn Producer, _: SubscriberId, value: &Payload) {
            self.out
                .borrow_mut()
                .push(format!("{}:after:{value:?}", self.name));
        }
    }

    #[test]
    fn event_kind_parses_its_own_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!("teardown".parse::<EventKind>().is_err());
    }

    #[test]
    fn kind_set_membership() {
        let set = EventKindSet::of(&[EventKind::Next, EventKind::Error]);
        assert!(set.contains(EventKind::Next));
        assert!(set.contains(EventKind::Error));
        assert!(!set.contains(EventKind::Subscribe));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![EventKind::Next, EventKind::Error]
        );
        assert!(EventKind::ALL
            .into_iter()
            .all(|k| EventKindSet::all().contains(k)));
        assert!(EventKindSet::empty().is_empty());
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let out = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookSet::new();
        hooks.add(Log {
            name: "a",
            out: Rc::clone(&out),
        });
        hooks.add(Log {
            name: "b",
            out: Rc::clone(&out),
        });

        let value = Payload::new(7);
        let event = Event::Next {
            producer: &Source,
            subscriber: SubscriberId::from_raw(9),
            value: &value,
        };
        hooks.dispatch_before(&event);
        hooks.dispatch_after(&event);

        assert_eq!(
            *out.borrow(),
            vec!["a:before:7", "b:before:7", "a:after:7", "b:after:7"]
        );
    }

    #[test]
    fn tick_advances_once_per_event() {
        let ticks = TickCounter::new();
        let mut hooks = HookSet::with_ticks(ticks.clone());
        let event = Event::Subscribe {
            producer: &Source,
            subscriber: SubscriberId::from_raw(1),
        };
        hooks.dispatch_before(&event);
        hooks.dispatch_before(&event);
        hooks.dispatch_after(&event);
        hooks.dispatch_after(&event);
        assert_eq!(crate::clock::TickSource::current(&ticks), 2);
    }
}
