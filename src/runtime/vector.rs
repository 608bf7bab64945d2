use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use super::{Collection, Indexed, List, Seq, Value};

lazy_static! {
    static ref EMPTY_VECTOR: ArrayVector = ArrayVector(Arc::from(Vec::new()));
}

/// Dense, 0-indexed vector with O(1) random access.
///
/// Traversal degrades into a [`List`]: every `more`/`cons` builds a list from the
/// remaining elements.
#[derive(Clone)]
pub struct ArrayVector(Arc<[Value]>);

impl ArrayVector {
    /// Copies `values`, so later changes to the caller's buffer are not observed.
    pub fn new(values: &[Value]) -> Self {
        if values.is_empty() {
            return EMPTY_VECTOR.clone();
        }
        ArrayVector(Arc::from(values))
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        if values.is_empty() {
            return EMPTY_VECTOR.clone();
        }
        ArrayVector(Arc::from(values))
    }

    /// The shared empty vector.
    pub fn empty_vector() -> Self {
        EMPTY_VECTOR.clone()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn ptr_eq(&self, other: &ArrayVector) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Seq for ArrayVector {
    fn first(&self) -> Value {
        self.0.first().cloned().unwrap_or(Value::Nil)
    }

    fn more(&self) -> List {
        if self.0.len() <= 1 {
            return List::EMPTY;
        }
        List::from_values(&self.0[1..])
    }

    fn cons(&self, value: Value) -> List {
        self.seq().prepend(value)
    }

    fn seq(&self) -> List {
        List::from_values(&self.0)
    }
}

impl Collection for ArrayVector {
    fn raw_count(&self) -> usize {
        self.0.len()
    }

    fn empty(&self) -> Value {
        Value::Vector(EMPTY_VECTOR.clone())
    }
}

impl Indexed for ArrayVector {
    fn value_at_or(&self, key: &Value, default: Value) -> Value {
        key.as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.0.get(i))
            .cloned()
            .unwrap_or(default)
    }
}

impl fmt::Display for ArrayVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for ArrayVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
