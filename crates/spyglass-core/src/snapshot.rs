// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Immutable point-in-time views of the tracked graph.
//!
//! A [`Snapshot`] owns deep copies of every node that was live when it was
//! taken. Edges are stored as producer identities and resolved against the
//! snapshot's own copies, never against the live registry, so later engine
//! mutation cannot be observed through a snapshot. Edge resolution sees every
//! copied node, including nodes excluded from [`Snapshot::nodes`] by a filter
//! or a `since` cut.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::history::TimedValue;
use crate::ident::{Payload, ProducerId, SubscriberId};

/// Copy of one tracked subscription.
#[derive(Debug, Clone)]
pub struct SnapshotSubscription {
    /// Consumer identity.
    pub subscriber: SubscriberId,
    /// `true` when the subscription was not induced by an enclosing
    /// subscribe or next (a root, user-initiated subscription).
    pub explicit: bool,
    /// Last activity time: creation, then each value received.
    pub timestamp: u64,
    /// Retained values delivered on this subscription, oldest first.
    pub values: Vec<TimedValue>,
    /// Number of values evicted from `values` by flushes.
    pub values_flushed: u64,
}

/// Copy of one tracked producer.
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    /// Producer identity.
    pub producer: ProducerId,
    /// Developer-assigned label.
    pub tag: Option<String>,
    /// Human-readable producer kind.
    pub type_name: String,
    /// Terminal-success flag.
    pub complete: bool,
    /// Terminal-failure payload.
    pub error: Option<Payload>,
    /// Producers subscribed to while this one was being subscribed to.
    pub dependencies: Vec<ProducerId>,
    /// Producers that subscribed to this one while being subscribed to.
    pub dependents: Vec<ProducerId>,
    /// Producers subscribed to during one of this producer's emissions.
    pub merges: Vec<ProducerId>,
    /// Active subscriptions, in creation order.
    pub subscriptions: Vec<SnapshotSubscription>,
    /// Retained emitted values, oldest first.
    pub values: Vec<TimedValue>,
    /// Number of values evicted from `values` by flushes.
    pub values_flushed: u64,
    /// Tick of the node's last state change.
    pub tick: u64,
}

/// Immutable, isolated view of the tracked graph.
#[derive(Clone)]
pub struct Snapshot {
    tick: u64,
    all: Vec<SnapshotNode>,
    index: FxHashMap<ProducerId, usize>,
    retained: Vec<usize>,
}

impl Snapshot {
    pub(crate) fn assemble(
        tick: u64,
        all: Vec<SnapshotNode>,
        options: &SnapshotOptions<'_>,
    ) -> Self {
        let index = all
            .iter()
            .enumerate()
            .map(|(i, n)| (n.producer, i))
            .collect();
        let retained = all
            .iter()
            .enumerate()
            .filter(|(_, n)| options.retains(n))
            .map(|(i, _)| i)
            .collect();
        Self {
            tick,
            all,
            index,
            retained,
        }
    }

    /// Tick at which the snapshot was taken.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Retained nodes, in the order producers were first tracked.
    pub fn nodes(&self) -> impl Iterator<Item = &SnapshotNode> {
        self.retained.iter().filter_map(|&i| self.all.get(i))
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// Returns `true` when no node was retained.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Retained node for `producer`.
    pub fn node(&self, producer: ProducerId) -> Option<&SnapshotNode> {
        self.nodes().find(|n| n.producer == producer)
    }

    /// First retained node carrying `tag`.
    pub fn find_by_tag(&self, tag: &str) -> Option<&SnapshotNode> {
        self.nodes().find(|n| n.tag.as_deref() == Some(tag))
    }

    /// Copied node for `producer`, whether or not it was retained.
    pub fn resolve(&self, producer: ProducerId) -> Option<&SnapshotNode> {
        self.index.get(&producer).and_then(|&i| self.all.get(i))
    }

    /// `node`'s dependencies, resolved to copies in this snapshot.
    pub fn dependencies<'s>(
        &'s self,
        node: &'s SnapshotNode,
    ) -> impl Iterator<Item = &'s SnapshotNode> + 's {
        node.dependencies.iter().filter_map(|&p| self.resolve(p))
    }

    /// `node`'s dependents, resolved to copies in this snapshot.
    pub fn dependents<'s>(
        &'s self,
        node: &'s SnapshotNode,
    ) -> impl Iterator<Item = &'s SnapshotNode> + 's {
        node.dependents.iter().filter_map(|&p| self.resolve(p))
    }

    /// `node`'s merges, resolved to copies in this snapshot.
    pub fn merges<'s>(
        &'s self,
        node: &'s SnapshotNode,
    ) -> impl Iterator<Item = &'s SnapshotNode> + 's {
        node.merges.iter().filter_map(|&p| self.resolve(p))
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("tick", &self.tick)
            .field("nodes", &self.nodes().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

type NodeFilter<'a> = dyn Fn(&SnapshotNode) -> bool + 'a;

/// Options for [`crate::SnapshotEngine::snapshot`].
#[derive(Default)]
pub struct SnapshotOptions<'a> {
    filter: Option<Box<NodeFilter<'a>>>,
    since: Option<u64>,
}

impl<'a> SnapshotOptions<'a> {
    /// Retain only nodes accepted by `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&SnapshotNode) -> bool + 'a,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Retain only nodes changed after `previous` was taken.
    pub fn since(mut self, previous: &Snapshot) -> Self {
        self.since = Some(previous.tick());
        self
    }

    /// Retain only nodes whose tick exceeds `tick`.
    pub fn since_tick(mut self, tick: u64) -> Self {
        self.since = Some(tick);
        self
    }

    fn retains(&self, node: &SnapshotNode) -> bool {
        self.filter.as_ref().is_none_or(|f| f(node))
            && self.since.is_none_or(|tick| node.tick > tick)
    }
}

impl fmt::Debug for SnapshotOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotOptions")
            .field("filter", &self.filter.is_some())
            .field("since", &self.since)
            .finish()
    }
}

/// Options for [`crate::SnapshotEngine::flush`].
///
/// Defaults to evicting both completed and errored nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    /// Remove nodes that completed.
    pub completed: bool,
    /// Remove nodes that errored.
    pub errored: bool,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            completed: true,
            errored: true,
        }
    }
}

impl FlushOptions {
    /// Trim history only; keep terminated nodes.
    pub const fn trim_only() -> Self {
        Self {
            completed: false,
            errored: false,
        }
    }
}
