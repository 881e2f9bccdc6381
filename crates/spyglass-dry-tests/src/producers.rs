// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fake producers for driving hooks without a reactive runtime.

use spyglass_core::{Producer, ProducerId};

/// Producer with a fixed identity and optional kind/tag.
///
/// # Example
///
/// ```
/// use spyglass_core::Producer;
/// use spyglass_dry_tests::FakeProducer;
///
/// let ticks = FakeProducer::new(1).kind("Interval").tagged("ticks");
/// assert_eq!(ticks.type_name(), "Interval");
/// assert_eq!(ticks.tag(), Some("ticks"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeProducer {
    id: ProducerId,
    kind: String,
    tag: Option<String>,
}

impl FakeProducer {
    /// Create an untagged producer of kind `"Object"`.
    pub fn new(id: u64) -> Self {
        Self {
            id: ProducerId::from_raw(id),
            kind: "Object".to_owned(),
            tag: None,
        }
    }

    /// Set the producer kind reported by [`Producer::type_name`].
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the tag reported by [`Producer::tag`].
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Producer for FakeProducer {
    fn id(&self) -> ProducerId {
        self.id
    }

    fn type_name(&self) -> &str {
        &self.kind
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}
