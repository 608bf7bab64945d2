use std::fmt;
use std::sync::Arc;

use super::{Collection, Seq, Value};

/// Persistent singly linked list.
///
/// Nodes are immutable and shared: consing onto a list allocates exactly one node and
/// points it at the existing list.
#[derive(Clone, Default)]
pub struct List {
    head: Option<Arc<Node>>,
}

struct Node {
    first: Value,
    rest: List,
    count: usize,
}

impl List {
    /// The empty list that terminates every list.
    pub const EMPTY: List = List { head: None };

    pub fn new() -> Self {
        List::EMPTY
    }

    pub fn from_values(values: &[Value]) -> Self {
        values.iter().cloned().collect()
    }

    pub fn prepend(&self, value: Value) -> List {
        List {
            head: Some(Arc::new(Node {
                first: value,
                rest: self.clone(),
                count: self.len() + 1,
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.count)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// True when both lists are the very same nodes (or both empty).
    pub fn ptr_eq(&self, other: &List) -> bool {
        match (&self.head, &other.head) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }
}

// Unlinks uniquely owned nodes one at a time so long lists don't recurse on drop.
impl Drop for List {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.rest.head.take(),
                Err(_) => break,
            }
        }
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let items: Vec<Value> = iter.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(List::EMPTY, |list, value| list.prepend(value))
    }
}

pub struct Iter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.rest.head.as_deref();
            &node.first
        })
    }
}

impl Seq for List {
    fn first(&self) -> Value {
        self.head
            .as_ref()
            .map_or(Value::Nil, |node| node.first.clone())
    }

    fn more(&self) -> List {
        self.head
            .as_ref()
            .map_or(List::EMPTY, |node| node.rest.clone())
    }

    fn cons(&self, value: Value) -> List {
        self.prepend(value)
    }

    fn seq(&self) -> List {
        self.clone()
    }
}

impl Collection for List {
    fn raw_count(&self) -> usize {
        self.len()
    }

    fn empty(&self) -> Value {
        Value::List(List::EMPTY)
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> List {
        values.iter().map(|i| Value::Int(*i)).collect()
    }

    #[test]
    fn cons_shares_the_tail() {
        let tail = ints(&[2, 3]);
        let list = tail.cons(Value::Int(1));
        assert!(list.next().ptr_eq(&tail));
        assert!(list.more().ptr_eq(&tail));
        assert_eq!(tail.len(), 2);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn builds_front_to_back() {
        let list = List::from_values(&[Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.first(), Value::Int(1));
        assert_eq!(list.to_string(), "(1 2 3)");
        assert_eq!(List::EMPTY.to_string(), "()");
    }

    #[test]
    fn exhausted_list_stays_empty() {
        let one = ints(&[7]);
        let rest = one.more();
        assert!(rest.ptr_eq(&List::EMPTY));
        assert!(rest.more().ptr_eq(&List::EMPTY));
        assert_eq!(rest.first(), Value::Nil);
    }

    #[test]
    fn long_lists_drop_without_recursion() {
        let list: List = (0..200_000).map(Value::Int).collect();
        assert_eq!(list.raw_count(), 200_000);
        drop(list);
    }

    #[test]
    fn dropping_a_prefix_keeps_shared_tail() {
        let tail = ints(&[2, 3]);
        let list = tail.prepend(Value::Int(1));
        drop(list);
        assert_eq!(tail.to_string(), "(2 3)");
    }
}
