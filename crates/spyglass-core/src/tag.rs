// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tag resolution and producer matching seams.
use std::fmt;

use crate::ident::{Producer, ProducerId};

/// Resolves the developer-assigned tag of a producer.
pub trait TagResolver {
    /// Returns the producer's tag, if any.
    fn resolve(&self, producer: &dyn Producer) -> Option<String>;
}

/// [`TagResolver`] that reads the tag the producer carries itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProducerTag;

impl TagResolver for ProducerTag {
    fn resolve(&self, producer: &dyn Producer) -> Option<String> {
        producer.tag().map(str::to_owned)
    }
}

type MatchFn = dyn Fn(&dyn Producer, Option<&str>) -> bool;

/// Selects producers by identity, tag, or predicate.
pub enum Match {
    /// Matches every producer.
    Any,
    /// Matches producers whose resolved tag equals the string exactly.
    Tag(String),
    /// Matches one producer by identity.
    Producer(ProducerId),
    /// Matches when the predicate accepts `(producer, resolved tag)`.
    Predicate(Box<MatchFn>),
}

impl Match {
    /// Builds a [`Match::Predicate`] from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&dyn Producer, Option<&str>) -> bool + 'static,
    {
        Self::Predicate(Box::new(f))
    }

    /// Returns `true` when `producer` (with resolved `tag`) is selected.
    pub fn matches(&self, producer: &dyn Producer, tag: Option<&str>) -> bool {
        match self {
            Match::Any => true,
            Match::Tag(want) => tag == Some(want.as_str()),
            Match::Producer(id) => producer.id() == *id,
            Match::Predicate(f) => f(producer, tag),
        }
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Match::Any => f.write_str("Any"),
            Match::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Match::Producer(id) => f.debug_tuple("Producer").field(id).finish(),
            Match::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Match {
    fn from(tag: &str) -> Self {
        Match::Tag(tag.to_owned())
    }
}

impl From<ProducerId> for Match {
    fn from(id: ProducerId) -> Self {
        Match::Producer(id)
    }
}
