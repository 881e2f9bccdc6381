// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Producer/subscriber identities and type-erased payloads.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of an instrumented producer.
///
/// The engine only compares and hashes identities; it never interprets the raw
/// value. Two producers with equal values but different identities are tracked
/// as distinct nodes.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProducerId(u64);

impl ProducerId {
    /// Constructs a `ProducerId` from a raw value chosen by the runtime.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "producer#{}", self.0)
    }
}

/// Opaque identity of a consumer attached to a producer.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Constructs a `SubscriberId` from a raw value chosen by the runtime.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// A producer as seen from the instrumentation boundary.
///
/// Runtimes implement this for whatever object represents a stream. Only
/// [`Producer::id`] is required; the kind and tag feed human-readable fields
/// of the snapshot.
pub trait Producer {
    /// Identity used for all registry lookups.
    fn id(&self) -> ProducerId;

    /// Human-readable producer kind (e.g. `"MapObservable"`).
    fn type_name(&self) -> &str {
        "Object"
    }

    /// Developer-assigned label, if the runtime carries one on the producer.
    fn tag(&self) -> Option<&str> {
        None
    }
}

trait ErasedValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T> ErasedValue for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Immutable, type-erased value carried by `next` and `error` events.
///
/// Cloning is a reference-count bump. Payloads cannot be mutated after
/// construction, so sharing them between the live registry and a snapshot
/// does not break snapshot isolation.
#[derive(Clone)]
pub struct Payload(Arc<dyn ErasedValue>);

impl Payload {
    /// Wraps `value` as a payload.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Self(Arc::new(value))
    }

    /// Returns the wrapped value when it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let inner: &dyn ErasedValue = &*self.0;
        inner.as_any().downcast_ref::<T>()
    }

    /// Returns `true` when both payloads share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_downcasts_to_original_type() {
        let payload = Payload::new(42_i32);
        assert_eq!(payload.downcast_ref::<i32>(), Some(&42));
        assert!(payload.downcast_ref::<String>().is_none());
    }

    #[test]
    fn payload_debug_delegates_to_inner_value() {
        let payload = Payload::new("boom");
        assert_eq!(format!("{payload:?}"), "\"boom\"");
    }

    #[test]
    fn payload_clone_shares_allocation() {
        let a = Payload::new(vec![1_u8, 2, 3]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Payload::new(vec![1_u8, 2, 3])));
    }
}
