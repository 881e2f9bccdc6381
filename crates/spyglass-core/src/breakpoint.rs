// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Conditional breakpoints on producer lifecycle events.
//!
//! A [`Breakpoint`] is a [`Hook`] that watches `before_*` calls. When the
//! event kind is selected and the producer matches, it resolves the
//! producer's current node through a [`SnapshotHandle`] (if one was supplied)
//! and hands everything to a [`BreakHandler`]. What "suspend" means is up to
//! the handler: block on a debugger channel, park the thread, or just log.
//! Suspension is synchronous; nothing is retried and there is no timeout.

use std::fmt;
use std::rc::Rc;

use tracing::{info, warn};

use crate::engine::{SnapshotEngine, SnapshotHandle};
use crate::hook::{EventKind, EventKindSet, Hook};
use crate::ident::{Payload, Producer, ProducerId, SubscriberId};
use crate::snapshot::{Snapshot, SnapshotNode, SnapshotOptions};
use crate::tag::{Match, ProducerTag, TagResolver};

/// Everything exposed to the developer when a breakpoint fires.
#[derive(Debug, Clone)]
pub struct BreakpointHit {
    /// Event about to be performed.
    pub kind: EventKind,
    /// Producer the event concerns.
    pub producer: ProducerId,
    /// Consumer the event concerns.
    pub subscriber: SubscriberId,
    /// Resolved tag of the producer.
    pub tag: Option<String>,
    /// Value for `next`, failure for `error`.
    pub payload: Option<Payload>,
    /// Snapshot taken at the break, when the breakpoint has an engine.
    pub snapshot: Option<Snapshot>,
}

impl BreakpointHit {
    /// The producer's node in [`BreakpointHit::snapshot`], or `None` when the
    /// breakpoint has no engine or the producer is untracked.
    pub fn node(&self) -> Option<&SnapshotNode> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.node(self.producer))
    }
}

/// Host-specific suspension.
pub trait BreakHandler {
    /// Called synchronously when a breakpoint fires. Execution of the
    /// runtime resumes when this returns.
    fn on_break(&mut self, hit: &BreakpointHit);
}

impl<F> BreakHandler for F
where
    F: FnMut(&BreakpointHit),
{
    fn on_break(&mut self, hit: &BreakpointHit) {
        self(hit);
    }
}

/// [`BreakHandler`] that logs the hit and continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBreak;

impl BreakHandler for LogBreak {
    fn on_break(&mut self, hit: &BreakpointHit) {
        let node = hit.node();
        warn!(
            event = %hit.kind,
            producer = %hit.producer,
            subscriber = %hit.subscriber,
            tag = hit.tag.as_deref().unwrap_or("-"),
            tracked = node.is_some(),
            values = node.map_or(0, |n| n.values.len()),
            subscriptions = node.map_or(0, |n| n.subscriptions.len()),
            "breakpoint hit"
        );
    }
}

/// Hook that suspends when a matching producer reaches a selected event.
pub struct Breakpoint {
    matcher: Match,
    events: EventKindSet,
    snapshots: Option<SnapshotHandle>,
    tags: Rc<dyn TagResolver>,
    handler: Box<dyn BreakHandler>,
    hits: u64,
}

impl Breakpoint {
    /// Creates a breakpoint on `events` of producers selected by `matcher`.
    ///
    /// With `snapshots`, tags are resolved by the engine's resolver so the
    /// breakpoint matches the tags the snapshot reports. Without it, tags
    /// come from [`ProducerTag`] and hits carry no snapshot.
    pub fn new(
        matcher: Match,
        events: EventKindSet,
        snapshots: Option<SnapshotHandle>,
        handler: impl BreakHandler + 'static,
    ) -> Self {
        let tags: Rc<dyn TagResolver> = match &snapshots {
            Some(engine) => engine.with(SnapshotEngine::tags),
            None => Rc::new(ProducerTag),
        };
        Self {
            matcher,
            events,
            snapshots,
            tags,
            handler: Box::new(handler),
            hits: 0,
        }
    }

    /// Replaces the tag resolver used for matching.
    pub fn with_tags(mut self, tags: impl TagResolver + 'static) -> Self {
        self.tags = Rc::new(tags);
        self
    }

    /// Number of times the breakpoint fired.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    fn check(
        &mut self,
        kind: EventKind,
        producer: &dyn Producer,
        subscriber: SubscriberId,
        payload: Option<&Payload>,
    ) {
        if !self.events.contains(kind) {
            return;
        }
        let tag = self.tags.resolve(producer);
        if !self.matcher.matches(producer, tag.as_deref()) {
            return;
        }

        let snapshot = self
            .snapshots
            .as_ref()
            .map(|engine| engine.snapshot(SnapshotOptions::default()));
        let hit = BreakpointHit {
            kind,
            producer: producer.id(),
            subscriber,
            tag,
            payload: payload.cloned(),
            snapshot,
        };
        self.hits = self.hits.saturating_add(1);
        info!(event = %kind, producer = %hit.producer, "breakpoint suspended");
        self.handler.on_break(&hit);
    }
}

impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakpoint")
            .field("matcher", &self.matcher)
            .field("events", &self.events)
            .field("has_snapshots", &self.snapshots.is_some())
            .field("hits", &self.hits)
            .finish_non_exhaustive()
    }
}

impl Hook for Breakpoint {
    fn before_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.check(EventKind::Subscribe, producer, subscriber, None);
    }

    fn before_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.check(EventKind::Unsubscribe, producer, subscriber, None);
    }

    fn before_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        self.check(EventKind::Next, producer, subscriber, Some(value));
    }

    fn before_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        self.check(EventKind::Error, producer, subscriber, Some(error));
    }

    fn before_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.check(EventKind::Complete, producer, subscriber, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Tagged(u64, &'static str);

    impl Producer for Tagged {
        fn id(&self) -> ProducerId {
            ProducerId::from_raw(self.0)
        }

        fn tag(&self) -> Option<&str> {
            Some(self.1)
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<BreakpointHit>>>, impl FnMut(&BreakpointHit)) {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&hits);
        (hits, move |hit: &BreakpointHit| {
            sink.borrow_mut().push(hit.clone());
        })
    }

    #[test]
    fn fires_only_for_selected_kinds_and_matching_producers() {
        let (hits, handler) = recorder();
        let mut bp = Breakpoint::new(
            Match::from("clicks"),
            EventKindSet::of(&[EventKind::Next]),
            None,
            handler,
        );
        let value = Payload::new(1);
        let s = SubscriberId::from_raw(1);

        bp.before_subscribe(&Tagged(1, "clicks"), s);
        bp.before_next(&Tagged(2, "keys"), s, &value);
        bp.before_next(&Tagged(1, "clicks"), s, &value);
        bp.after_next(&Tagged(1, "clicks"), s, &value);

        assert_eq!(bp.hits(), 1);
        let hits = hits.borrow();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, EventKind::Next);
        assert_eq!(hits[0].tag.as_deref(), Some("clicks"));
        assert!(hits[0].payload.is_some());
        assert!(hits[0].snapshot.is_none());
        assert!(hits[0].node().is_none());
    }

    struct Fixed(&'static str);

    impl TagResolver for Fixed {
        fn resolve(&self, _producer: &dyn Producer) -> Option<String> {
            Some(self.0.to_owned())
        }
    }

    #[test]
    fn custom_resolver_replaces_producer_tag() {
        let (hits, handler) = recorder();
        let mut bp = Breakpoint::new(
            Match::from("renamed"),
            EventKindSet::of(&[EventKind::Subscribe]),
            None,
            handler,
        )
        .with_tags(Fixed("renamed"));

        bp.before_subscribe(&Tagged(1, "clicks"), SubscriberId::from_raw(1));

        assert_eq!(bp.hits(), 1);
        assert_eq!(hits.borrow()[0].tag.as_deref(), Some("renamed"));
    }

    #[test]
    fn log_break_continues() {
        let mut bp = Breakpoint::new(Match::Any, EventKindSet::all(), None, LogBreak);
        bp.before_complete(&Tagged(3, "t"), SubscriberId::from_raw(1));
        assert_eq!(bp.hits(), 1);
    }
}
