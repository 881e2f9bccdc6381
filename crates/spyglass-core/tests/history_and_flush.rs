// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Bounded value history and terminal eviction.

use spyglass_core::{FlushOptions, Producer, SnapshotConfig, TimedValue};
use spyglass_dry_tests::{FakeProducer, Harness};

fn ints(values: &[TimedValue]) -> Vec<i32> {
    values
        .iter()
        .filter_map(|v| v.value.downcast_ref::<i32>().copied())
        .collect()
}

fn harness(kept_values: usize) -> Harness {
    Harness::with_config(SnapshotConfig {
        kept_values,
        ..SnapshotConfig::default()
    })
}

#[test]
fn flush_keeps_the_last_values_and_counts_the_rest() {
    let mut h = harness(2);
    let p = FakeProducer::new(1);
    let s = h.runtime.subscriber();
    h.runtime.subscribe(&p, s);
    for v in 1..=5_i32 {
        h.clock.advance(10);
        h.runtime.next(&p, s, v);
    }

    let before = h.snapshot();
    assert_eq!(ints(&before.node(p.id()).unwrap().values), vec![1, 2, 3, 4, 5]);

    h.engine.flush(FlushOptions::default());

    let snap = h.snapshot();
    let node = snap.node(p.id()).unwrap();
    assert_eq!(ints(&node.values), vec![4, 5]);
    assert_eq!(node.values_flushed, 3);
    let stamps: Vec<_> = node.values.iter().map(|v| v.timestamp).collect();
    assert_eq!(stamps, vec![40, 50]);

    let sub = &node.subscriptions[0];
    assert_eq!(ints(&sub.values), vec![4, 5]);
    assert_eq!(sub.values_flushed, 3);
    assert_eq!(sub.timestamp, 50);
}

#[test]
fn repeated_flushes_accumulate_flushed_counts() {
    let mut h = harness(1);
    let p = FakeProducer::new(1);
    let s = h.runtime.subscriber();
    h.runtime.subscribe(&p, s);
    h.runtime.next(&p, s, 1_i32);
    h.runtime.next(&p, s, 2_i32);
    h.engine.flush(FlushOptions::default());
    h.runtime.next(&p, s, 3_i32);
    h.runtime.next(&p, s, 4_i32);
    h.engine.flush(FlushOptions::default());

    let snap = h.snapshot();
    let node = snap.node(p.id()).unwrap();
    assert_eq!(ints(&node.values), vec![4]);
    assert_eq!(node.values_flushed, 3);
}

#[test]
fn history_bound_can_change_between_flushes() {
    let mut h = harness(4);
    let p = FakeProducer::new(1);
    let s = h.runtime.subscriber();
    h.runtime.subscribe(&p, s);
    for v in 1..=4_i32 {
        h.runtime.next(&p, s, v);
    }
    h.engine.flush(FlushOptions::default());
    assert_eq!(h.snapshot().node(p.id()).unwrap().values_flushed, 0);

    h.engine.with_mut(|e| e.set_kept_values(1));
    h.engine.flush(FlushOptions::default());
    let snap = h.snapshot();
    assert_eq!(ints(&snap.node(p.id()).unwrap().values), vec![4]);
    assert_eq!(snap.node(p.id()).unwrap().values_flushed, 3);
}

#[test]
fn terminal_signals_clear_subscriptions() {
    let mut h = Harness::new();
    let ok = FakeProducer::new(1);
    let bad = FakeProducer::new(2);
    let s1 = h.runtime.subscriber();
    let s2 = h.runtime.subscriber();
    h.runtime.subscribe(&ok, s1);
    h.runtime.subscribe(&bad, s2);
    h.runtime.complete(&ok, s1);
    h.runtime.error(&bad, s2, "boom");

    let snap = h.snapshot();
    let n_ok = snap.node(ok.id()).unwrap();
    let n_bad = snap.node(bad.id()).unwrap();
    assert!(n_ok.complete);
    assert!(n_ok.error.is_none());
    assert!(n_ok.subscriptions.is_empty());
    assert!(!n_bad.complete);
    assert_eq!(
        n_bad.error.as_ref().and_then(|e| e.downcast_ref::<&str>()),
        Some(&"boom")
    );
    assert!(n_bad.subscriptions.is_empty());
}

#[test]
fn flush_evicts_only_selected_terminal_states() {
    let mut h = Harness::new();
    let done = FakeProducer::new(1);
    let failed = FakeProducer::new(2);
    let live = FakeProducer::new(3);
    let (s1, s2, s3) = (
        h.runtime.subscriber(),
        h.runtime.subscriber(),
        h.runtime.subscriber(),
    );
    h.runtime.subscribe(&done, s1);
    h.runtime.subscribe(&failed, s2);
    h.runtime.subscribe(&live, s3);
    h.runtime.complete(&done, s1);
    h.runtime.error(&failed, s2, 500_u16);

    h.engine.flush(FlushOptions::trim_only());
    assert_eq!(h.engine.with(|e| e.node_count()), 3);

    h.engine.flush(FlushOptions {
        completed: true,
        errored: false,
    });
    let snap = h.snapshot();
    assert!(snap.node(done.id()).is_none());
    assert!(snap.node(failed.id()).is_some());
    assert!(snap.node(live.id()).is_some());

    h.engine.flush(FlushOptions::default());
    let snap = h.snapshot();
    assert!(snap.node(failed.id()).is_none());
    assert!(snap.node(live.id()).is_some());
    assert_eq!(snap.len(), 1);
}

#[test]
fn unsubscribe_removes_only_the_matching_subscription() {
    let mut h = Harness::new();
    let p = FakeProducer::new(1);
    let s1 = h.runtime.subscriber();
    let s2 = h.runtime.subscriber();
    h.runtime.subscribe(&p, s1);
    h.runtime.subscribe(&p, s2);
    h.runtime.unsubscribe(&p, s1);

    let snap = h.snapshot();
    let subs: Vec<_> = snap
        .node(p.id())
        .unwrap()
        .subscriptions
        .iter()
        .map(|s| s.subscriber)
        .collect();
    assert_eq!(subs, vec![s2]);
    h.engine.flush(FlushOptions::default());
    assert!(h.snapshot().node(p.id()).is_some());
}

mod bounded {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn flush_bounds_history_and_accounts_for_every_eviction(
            count in 0_i32..40,
            keep in 0_usize..8,
        ) {
            let mut h = harness(keep);
            let p = FakeProducer::new(1);
            let s = h.runtime.subscriber();
            h.runtime.subscribe(&p, s);
            for v in 0..count {
                h.runtime.next(&p, s, v);
            }
            h.engine.flush(FlushOptions::default());

            let total = usize::try_from(count).unwrap_or_default();
            let kept = total.min(keep);
            let snap = h.snapshot();
            let node = snap.node(p.id()).unwrap();
            prop_assert_eq!(node.values.len(), kept);
            prop_assert_eq!(node.values_flushed, u64::try_from(total - kept).unwrap_or_default());
            prop_assert_eq!(node.subscriptions[0].values.len(), kept);
            let expected: Vec<i32> = (count - i32::try_from(kept).unwrap_or_default()..count).collect();
            prop_assert_eq!(ints(&node.values), expected);
        }
    }
}
