// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live subscription-graph registry and snapshot extraction.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, trace, warn};

use crate::clock::{Clock, SystemClock, TickSource};
use crate::diagnostics::{Diagnostic, DiagnosticRing, MissReason};
use crate::history::ValueHistory;
use crate::hook::{EventKind, Hook};
use crate::ident::{Payload, Producer, ProducerId, SubscriberId};
use crate::snapshot::{
    FlushOptions, Snapshot, SnapshotNode, SnapshotOptions, SnapshotSubscription,
};
use crate::tag::{ProducerTag, TagResolver};

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SnapshotConfig {
    /// Values kept per node and per subscription when [`SnapshotEngine::flush`] trims history.
    pub kept_values: usize,
    /// Diagnostics retained for [`SnapshotEngine::diagnostics`]. Zero retains
    /// none; diagnostics are still logged.
    pub diagnostics_capacity: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            kept_values: 4,
            diagnostics_capacity: 64,
        }
    }
}

/// Stable arena address of a node. Never reused, so ascending order is
/// creation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
struct NodeHandle(u64);

#[derive(Debug)]
struct SubscriptionRecord {
    subscriber: SubscriberId,
    explicit: bool,
    timestamp: u64,
    history: ValueHistory,
}

#[derive(Debug)]
struct NodeRecord {
    producer: ProducerId,
    tag: Option<String>,
    type_name: String,
    complete: bool,
    error: Option<Payload>,
    dependencies: Vec<NodeHandle>,
    dependents: Vec<NodeHandle>,
    merges: Vec<NodeHandle>,
    subscriptions: Vec<SubscriptionRecord>,
    history: ValueHistory,
    tick: u64,
}

impl NodeRecord {
    fn is_terminated_for(&self, options: FlushOptions) -> bool {
        (options.completed && self.complete) || (options.errored && self.error.is_some())
    }
}

/// Context frame pushed by a before-hook and popped by its after-hook.
///
/// `node` is `None` for events on untracked producers; the frame is still
/// pushed so that every after-hook pops exactly the frame its before-hook
/// pushed.
#[derive(Clone, Copy, Debug)]
struct Frame {
    kind: EventKind,
    node: Option<NodeHandle>,
}

/// Structural position of a new subscription, inferred from the stack.
enum Origin {
    Root,
    Merge(NodeHandle),
    Dependency(NodeHandle),
}

fn add_once(list: &mut Vec<NodeHandle>, handle: NodeHandle) {
    if !list.contains(&handle) {
        list.push(handle);
    }
}

/// Tracks every instrumented producer and its active consumers.
///
/// The engine is a [`Hook`]: register it (usually through a
/// [`SnapshotHandle`]) with the runtime's dispatcher. Parent/child and merge
/// edges are inferred purely from how hook calls nest:
///
/// - a subscribe made while the innermost tracked frame is a `next` is a
///   *merge* of the emitting producer;
/// - otherwise, a subscribe made inside another producer's subscribe makes
///   the new producer a *dependency* of the nearest enclosing subscriber;
/// - otherwise the subscription is *explicit* (a root subscription).
pub struct SnapshotEngine {
    config: SnapshotConfig,
    nodes: BTreeMap<NodeHandle, NodeRecord>,
    index: FxHashMap<ProducerId, NodeHandle>,
    next_handle: u64,
    stack: Vec<Frame>,
    ticks: Box<dyn TickSource>,
    clock: Box<dyn Clock>,
    tags: Rc<dyn TagResolver>,
    diagnostics: DiagnosticRing,
}

impl SnapshotEngine {
    /// Creates an empty engine reading logical time from `ticks`.
    ///
    /// Timestamps come from [`SystemClock`] and tags from [`ProducerTag`];
    /// override them with [`SnapshotEngine::with_clock`] and
    /// [`SnapshotEngine::with_tags`].
    pub fn new(config: SnapshotConfig, ticks: impl TickSource + 'static) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            index: FxHashMap::default(),
            next_handle: 0,
            stack: Vec::new(),
            ticks: Box::new(ticks),
            clock: Box::new(SystemClock),
            tags: Rc::new(ProducerTag),
            diagnostics: DiagnosticRing::new(config.diagnostics_capacity),
        }
    }

    /// Replaces the wall clock used for value timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the tag resolver consulted when a producer is first tracked.
    pub fn with_tags(self, tags: impl TagResolver + 'static) -> Self {
        self.with_shared_tags(Rc::new(tags))
    }

    /// Replaces the tag resolver with one shared with other collaborators.
    pub fn with_shared_tags(mut self, tags: Rc<dyn TagResolver>) -> Self {
        self.tags = tags;
        self
    }

    /// The tag resolver in use. Breakpoints built on this engine match
    /// against the same tags the snapshot reports.
    pub fn tags(&self) -> Rc<dyn TagResolver> {
        Rc::clone(&self.tags)
    }

    /// Active configuration.
    pub fn config(&self) -> SnapshotConfig {
        self.config
    }

    /// Changes the history bound applied by later flushes.
    pub fn set_kept_values(&mut self, kept_values: usize) {
        self.config.kept_values = kept_values;
    }

    /// Number of tracked producers.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when `producer` is tracked.
    pub fn contains(&self, producer: ProducerId) -> bool {
        self.index.contains_key(&producer)
    }

    /// Current depth of the event context stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Retained diagnostics, oldest first.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Removes and returns the retained diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// Diagnostics discarded because the ring was full.
    pub fn diagnostics_dropped(&self) -> u64 {
        self.diagnostics.dropped()
    }

    /// Tears down the registry and the context stack.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.stack.clear();
    }

    /// Evicts terminated nodes and trims value history.
    ///
    /// A node that completed (when `options.completed`) or errored (when
    /// `options.errored`) is removed together with every edge pointing at
    /// it. Every other node keeps only its last `kept_values` values, and so
    /// does each of its subscriptions; evictions are added to the
    /// corresponding `values_flushed` count.
    pub fn flush(&mut self, options: FlushOptions) {
        let keep = self.config.kept_values;
        let mut evicted = FxHashSet::default();
        let mut trimmed = 0_usize;

        for (&handle, node) in &mut self.nodes {
            if node.is_terminated_for(options) {
                evicted.insert(handle);
                continue;
            }
            trimmed += node.history.trim(keep);
            for sub in &mut node.subscriptions {
                trimmed += sub.history.trim(keep);
            }
        }

        for handle in &evicted {
            if let Some(node) = self.nodes.remove(handle) {
                self.index.remove(&node.producer);
            }
        }
        if !evicted.is_empty() {
            for node in self.nodes.values_mut() {
                node.dependencies.retain(|h| !evicted.contains(h));
                node.dependents.retain(|h| !evicted.contains(h));
                node.merges.retain(|h| !evicted.contains(h));
            }
        }

        debug!(
            evicted = evicted.len(),
            trimmed,
            remaining = self.nodes.len(),
            "flushed snapshot registry"
        );
    }

    /// Copies the registry into an isolated [`Snapshot`].
    ///
    /// All live nodes are copied first and edges are re-resolved against the
    /// copies; `options` then decide which copies are retained.
    pub fn snapshot(&self, options: SnapshotOptions<'_>) -> Snapshot {
        let all: Vec<SnapshotNode> = self.nodes.values().map(|n| self.copy_node(n)).collect();
        let snapshot = Snapshot::assemble(self.ticks.current(), all, &options);
        trace!(
            tick = snapshot.tick(),
            retained = snapshot.len(),
            total = self.nodes.len(),
            "took snapshot"
        );
        snapshot
    }

    fn copy_node(&self, node: &NodeRecord) -> SnapshotNode {
        let resolve = |handles: &[NodeHandle]| -> Vec<ProducerId> {
            handles
                .iter()
                .filter_map(|h| self.nodes.get(h).map(|n| n.producer))
                .collect()
        };
        SnapshotNode {
            producer: node.producer,
            tag: node.tag.clone(),
            type_name: node.type_name.clone(),
            complete: node.complete,
            error: node.error.clone(),
            dependencies: resolve(&node.dependencies),
            dependents: resolve(&node.dependents),
            merges: resolve(&node.merges),
            subscriptions: node
                .subscriptions
                .iter()
                .map(|s| SnapshotSubscription {
                    subscriber: s.subscriber,
                    explicit: s.explicit,
                    timestamp: s.timestamp,
                    values: s.history.iter().cloned().collect(),
                    values_flushed: s.history.flushed(),
                })
                .collect(),
            values: node.history.iter().cloned().collect(),
            values_flushed: node.history.flushed(),
            tick: node.tick,
        }
    }

    fn track(&mut self, producer: &dyn Producer, tick: u64) -> NodeHandle {
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        let record = NodeRecord {
            producer: producer.id(),
            tag: self.tags.resolve(producer),
            type_name: producer.type_name().to_owned(),
            complete: false,
            error: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            merges: Vec::new(),
            subscriptions: Vec::new(),
            history: ValueHistory::default(),
            tick,
        };
        self.nodes.insert(handle, record);
        self.index.insert(producer.id(), handle);
        handle
    }

    fn origin(&self) -> Origin {
        let mut tracked = self
            .stack
            .iter()
            .rev()
            .filter_map(|f| f.node.map(|n| (f.kind, n)));
        match tracked.next() {
            None => Origin::Root,
            Some((EventKind::Next, source)) => Origin::Merge(source),
            Some((EventKind::Subscribe, parent)) => Origin::Dependency(parent),
            Some(_) => tracked
                .find(|(kind, _)| *kind == EventKind::Subscribe)
                .map_or(Origin::Root, |(_, parent)| Origin::Dependency(parent)),
        }
    }

    /// Pushes the frame for a non-subscribe before-hook. Returns the node
    /// handle, or records a tracking-miss and pushes an untracked frame.
    fn enter(
        &mut self,
        kind: EventKind,
        producer: &dyn Producer,
        subscriber: SubscriberId,
    ) -> Option<NodeHandle> {
        let node = self.index.get(&producer.id()).copied();
        self.stack.push(Frame { kind, node });
        if node.is_none() {
            self.miss(kind, producer.id(), subscriber, MissReason::UnknownProducer);
        }
        node
    }

    fn leave(&mut self, kind: EventKind) {
        match self.stack.pop() {
            Some(frame) if frame.kind == kind => {}
            Some(frame) => {
                warn!(expected = %kind, found = %frame.kind, "context frame mismatch");
                self.diagnostics.push(Diagnostic::FrameMismatch {
                    expected: kind,
                    found: frame.kind,
                });
            }
            None => {
                error!(event = %kind, "context stack underflow");
                self.diagnostics.push(Diagnostic::StackUnderflow { kind });
            }
        }
    }

    fn miss(
        &mut self,
        kind: EventKind,
        producer: ProducerId,
        subscriber: SubscriberId,
        reason: MissReason,
    ) {
        let diagnostic = Diagnostic::TrackingMiss {
            kind,
            producer,
            subscriber,
            reason,
        };
        warn!(event = %kind, %producer, %subscriber, "{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Marks a node terminated and drops its subscriptions.
    fn terminate(&mut self, handle: NodeHandle, error: Option<&Payload>) {
        let tick = self.ticks.current();
        if let Some(node) = self.nodes.get_mut(&handle) {
            match error {
                Some(error) => node.error = Some(error.clone()),
                None => node.complete = true,
            }
            node.subscriptions.clear();
            node.tick = tick;
        }
    }
}

impl Hook for SnapshotEngine {
    fn before_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        let tick = self.ticks.current();
        let handle = match self.index.get(&producer.id()).copied() {
            Some(handle) => {
                if let Some(node) = self.nodes.get_mut(&handle) {
                    node.tick = tick;
                }
                handle
            }
            None => self.track(producer, tick),
        };

        let explicit = match self.origin() {
            Origin::Root => true,
            Origin::Merge(source) => {
                if let Some(source) = self.nodes.get_mut(&source) {
                    add_once(&mut source.merges, handle);
                }
                false
            }
            Origin::Dependency(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    add_once(&mut parent_node.dependencies, handle);
                }
                if let Some(node) = self.nodes.get_mut(&handle) {
                    add_once(&mut node.dependents, parent);
                }
                false
            }
        };

        self.stack.push(Frame {
            kind: EventKind::Subscribe,
            node: Some(handle),
        });

        let timestamp = self.clock.now_millis();
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.subscriptions.push(SubscriptionRecord {
                subscriber,
                explicit,
                timestamp,
                history: ValueHistory::default(),
            });
        }
    }

    fn after_subscribe(&mut self, _producer: &dyn Producer, _subscriber: SubscriberId) {
        self.leave(EventKind::Subscribe);
    }

    fn before_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        let Some(handle) = self.enter(EventKind::Unsubscribe, producer, subscriber) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.subscriptions.retain(|s| s.subscriber != subscriber);
        }
    }

    fn after_unsubscribe(&mut self, _producer: &dyn Producer, _subscriber: SubscriberId) {
        self.leave(EventKind::Unsubscribe);
    }

    fn before_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        let Some(handle) = self.enter(EventKind::Next, producer, subscriber) else {
            return;
        };
        let tick = self.ticks.current();
        let now = self.clock.now_millis();

        let recorded = match self.nodes.get_mut(&handle) {
            Some(node) => match node
                .subscriptions
                .iter_mut()
                .find(|s| s.subscriber == subscriber)
            {
                Some(sub) => {
                    sub.timestamp = now;
                    sub.history.push(now, value.clone());
                    node.tick = tick;
                    node.history.push(now, value.clone());
                    true
                }
                None => false,
            },
            None => false,
        };
        if !recorded {
            self.miss(
                EventKind::Next,
                producer.id(),
                subscriber,
                MissReason::UnknownSubscription,
            );
        }
    }

    fn after_next(&mut self, _producer: &dyn Producer, _subscriber: SubscriberId, _value: &Payload) {
        self.leave(EventKind::Next);
    }

    fn before_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        if let Some(handle) = self.enter(EventKind::Error, producer, subscriber) {
            self.terminate(handle, Some(error));
        }
    }

    fn after_error(&mut self, _producer: &dyn Producer, _subscriber: SubscriberId, _error: &Payload) {
        self.leave(EventKind::Error);
    }

    fn before_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        if let Some(handle) = self.enter(EventKind::Complete, producer, subscriber) {
            self.terminate(handle, None);
        }
    }

    fn after_complete(&mut self, _producer: &dyn Producer, _subscriber: SubscriberId) {
        self.leave(EventKind::Complete);
    }
}

impl fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("stack_depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a [`SnapshotEngine`].
///
/// Clones refer to the same engine. Register one clone with the runtime's
/// [`crate::HookSet`] and hand others to breakpoints or presentation code.
///
/// # Panics
/// The engine lives in a `RefCell`. Calling back into the handle from inside
/// one of the engine's own collaborators (its clock or tag resolver) while a
/// hook is running panics on the conflicting borrow.
#[derive(Clone)]
pub struct SnapshotHandle(Rc<RefCell<SnapshotEngine>>);

impl SnapshotHandle {
    /// Wraps `engine` in a shared handle.
    pub fn new(engine: SnapshotEngine) -> Self {
        Self(Rc::new(RefCell::new(engine)))
    }

    /// See [`SnapshotEngine::snapshot`].
    pub fn snapshot(&self, options: SnapshotOptions<'_>) -> Snapshot {
        self.0.borrow().snapshot(options)
    }

    /// See [`SnapshotEngine::flush`].
    pub fn flush(&self, options: FlushOptions) {
        self.0.borrow_mut().flush(options);
    }

    /// Runs `f` with shared access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&SnapshotEngine) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut SnapshotEngine) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotHandle").field(&self.0).finish()
    }
}

impl Hook for SnapshotHandle {
    fn before_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().before_subscribe(producer, subscriber);
    }

    fn after_subscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().after_subscribe(producer, subscriber);
    }

    fn before_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().before_unsubscribe(producer, subscriber);
    }

    fn after_unsubscribe(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().after_unsubscribe(producer, subscriber);
    }

    fn before_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        self.0.borrow_mut().before_next(producer, subscriber, value);
    }

    fn after_next(&mut self, producer: &dyn Producer, subscriber: SubscriberId, value: &Payload) {
        self.0.borrow_mut().after_next(producer, subscriber, value);
    }

    fn before_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        self.0.borrow_mut().before_error(producer, subscriber, error);
    }

    fn after_error(&mut self, producer: &dyn Producer, subscriber: SubscriberId, error: &Payload) {
        self.0.borrow_mut().after_error(producer, subscriber, error);
    }

    fn before_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().before_complete(producer, subscriber);
    }

    fn after_complete(&mut self, producer: &dyn Producer, subscriber: SubscriberId) {
        self.0.borrow_mut().after_complete(producer, subscriber);
    }
}
