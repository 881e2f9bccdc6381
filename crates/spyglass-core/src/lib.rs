// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! spyglass-core: live structure and history of reactive subscription graphs.
//!
//! The reactive runtime calls `before_*`/`after_*` hooks around every lifecycle
//! action it performs on an instrumented producer. [`SnapshotEngine`] listens to
//! those calls, infers parent/child and merge edges from the nesting order of
//! the hooks, keeps a bounded value history per producer and per subscription,
//! and hands out isolated [`Snapshot`] copies on demand. [`Breakpoint`] builds
//! on top of the engine to pause when a chosen producer reaches a chosen event.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::use_self
)]

mod breakpoint;
mod clock;
mod diagnostics;
mod engine;
mod history;
mod hook;
mod ident;
mod snapshot;
mod tag;

/// Breakpoint trigger and pluggable suspension handlers.
pub use breakpoint::{BreakHandler, Breakpoint, BreakpointHit, LogBreak};
/// Injected logical tick source and wall clock.
pub use clock::{Clock, SystemClock, TickCounter, TickSource};
/// Diagnostics channel for tracking-misses and stack discipline faults.
pub use diagnostics::{Diagnostic, MissReason};
/// Snapshot engine, its configuration, and the shared handle registered as a hook.
pub use engine::{SnapshotConfig, SnapshotEngine, SnapshotHandle};
/// Bounded value history.
pub use history::{TimedValue, ValueHistory};
/// Hook interface, event kinds, and listener fan-out.
pub use hook::{Event, EventKind, EventKindSet, Hook, HookSet, ParseEventKindError};
/// Opaque producer/subscriber identities and type-erased payloads.
pub use ident::{Payload, Producer, ProducerId, SubscriberId};
/// Immutable snapshot views.
pub use snapshot::{FlushOptions, Snapshot, SnapshotNode, SnapshotOptions, SnapshotSubscription};
/// Tagging and matching collaborator seams.
pub use tag::{Match, ProducerTag, TagResolver};
