// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Breakpoints wired after a snapshot engine.

use std::cell::RefCell;
use std::rc::Rc;

use spyglass_core::{
    Breakpoint, BreakpointHit, EventKind, EventKindSet, Match, Producer, ProducerId,
    SnapshotConfig, TagResolver,
};
use spyglass_dry_tests::{FakeProducer, Harness};

#[derive(Debug, Clone)]
struct Seen {
    kind: EventKind,
    tracked: bool,
    last_value: Option<i32>,
    subscriptions: usize,
}

fn recorder() -> (Rc<RefCell<Vec<Seen>>>, impl FnMut(&BreakpointHit)) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let handler = move |hit: &BreakpointHit| {
        let node = hit.node();
        sink.borrow_mut().push(Seen {
            kind: hit.kind,
            tracked: node.is_some(),
            last_value: node
                .and_then(|n| n.values.last())
                .and_then(|v| v.value.downcast_ref::<i32>().copied()),
            subscriptions: node.map_or(0, |n| n.subscriptions.len()),
        });
    };
    (seen, handler)
}

#[test]
fn hit_exposes_the_node_as_updated_by_the_engine() {
    let mut h = Harness::new();
    let (seen, handler) = recorder();
    h.runtime.add_hook(Breakpoint::new(
        Match::from("ticks"),
        EventKindSet::of(&[EventKind::Next]),
        Some(h.engine.clone()),
        handler,
    ));

    let ticks = FakeProducer::new(1).tagged("ticks");
    let other = FakeProducer::new(2).tagged("other");
    let s1 = h.runtime.subscriber();
    let s2 = h.runtime.subscriber();
    h.runtime.subscribe(&ticks, s1);
    h.runtime.subscribe(&other, s2);
    h.runtime.next(&other, s2, 0_i32);
    h.runtime.next(&ticks, s1, 7_i32);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, EventKind::Next);
    assert!(seen[0].tracked);
    assert_eq!(seen[0].last_value, Some(7));
    assert_eq!(seen[0].subscriptions, 1);
}

#[test]
fn untracked_producer_yields_no_node() {
    let mut h = Harness::new();
    let (seen, handler) = recorder();
    let target = ProducerId::from_raw(9);
    h.runtime.add_hook(Breakpoint::new(
        Match::Producer(target),
        EventKindSet::of(&[EventKind::Complete]),
        Some(h.engine.clone()),
        handler,
    ));

    let ghost = FakeProducer::new(9);
    let s = h.runtime.subscriber();
    h.runtime.complete(&ghost, s);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].tracked);
    assert_eq!(h.engine.with(|e| e.stack_depth()), 0);
}

#[test]
fn predicate_match_sees_type_and_tag() {
    let mut h = Harness::new();
    let (seen, handler) = recorder();
    h.runtime.add_hook(Breakpoint::new(
        Match::predicate(|p, tag| p.type_name() == "Http" && tag.is_none()),
        EventKindSet::all(),
        None,
        handler,
    ));

    let http = FakeProducer::new(1).kind("Http");
    let tagged = FakeProducer::new(2).kind("Http").tagged("api");
    let (s1, s2) = (h.runtime.subscriber(), h.runtime.subscriber());
    h.runtime.subscribe(&http, s1);
    h.runtime.subscribe(&tagged, s2);
    h.runtime.error(&http, s1, "timeout");

    let kinds: Vec<_> = seen.borrow().iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![EventKind::Subscribe, EventKind::Error]);
    assert!(seen.borrow().iter().all(|s| !s.tracked));
    assert!(h.snapshot().node(http.id()).unwrap().error.is_some());
}

/// Tags kept outside the producers, keyed by identity.
struct Registry;

impl TagResolver for Registry {
    fn resolve(&self, producer: &dyn Producer) -> Option<String> {
        (producer.id().value() == 1).then(|| "clicks".to_owned())
    }
}

#[test]
fn breakpoint_matches_tags_from_the_engine_resolver() {
    let mut h = Harness::with_engine(SnapshotConfig::default(), |e| e.with_tags(Registry));
    let (seen, handler) = recorder();
    h.runtime.add_hook(Breakpoint::new(
        Match::from("clicks"),
        EventKindSet::all(),
        Some(h.engine.clone()),
        handler,
    ));

    let untagged = FakeProducer::new(1);
    let s = h.runtime.subscriber();
    h.runtime.subscribe(&untagged, s);
    h.runtime.next(&untagged, s, 3_i32);

    assert_eq!(
        h.snapshot().node(untagged.id()).unwrap().tag.as_deref(),
        Some("clicks")
    );
    let kinds: Vec<_> = seen.borrow().iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![EventKind::Subscribe, EventKind::Next]);
    assert_eq!(seen.borrow()[1].last_value, Some(3));
}
