//! Sequence and collection capabilities.
//!
//! Every concrete collection degrades into a [`List`] when it is traversed, so the
//! "rest" of any sequence is always a list.

use super::{List, Value};

/// Ordered traversal.
///
/// Implementations never mutate the receiver: `more`, `next` and `cons` return new
/// sequences, sharing structure with the receiver where they can.
pub trait Seq: Send + Sync {
    /// The head element, or `nil` when the sequence is exhausted.
    fn first(&self) -> Value;

    /// Everything after the head; the canonical empty list at exhaustion.
    fn more(&self) -> List;

    fn next(&self) -> List {
        self.more()
    }

    /// A new sequence with `value` in front of this one.
    fn cons(&self, value: Value) -> List;

    /// The whole sequence as a list.
    fn seq(&self) -> List;
}

/// Countable aggregate.
pub trait Collection: Send + Sync {
    fn raw_count(&self) -> usize;

    fn count(&self) -> Value {
        Value::Int(i64::try_from(self.raw_count()).unwrap_or(i64::MAX))
    }

    /// The canonical empty instance for this kind of collection.
    fn empty(&self) -> Value;
}

/// Random access by integer key.
pub trait Indexed: Send + Sync {
    /// Element at `key`, or `default` when the key is nil, not an integer, or out of
    /// bounds.
    fn value_at_or(&self, key: &Value, default: Value) -> Value;

    fn value_at(&self, key: &Value) -> Value {
        self.value_at_or(key, Value::Nil)
    }
}
