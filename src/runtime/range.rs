use std::fmt;

use tracing::trace;

use super::{Collection, Indexed, List, Seq, Value};

/// Lazy arithmetic progression `start, start+step, ...` below `end`.
///
/// Only ascending ranges exist: [`Range::new`] collapses every other combination to the
/// empty list. Traversal materializes the remaining elements into a [`List`]; indexed
/// access is computed without materializing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    start: i64,
    end: i64,
    step: i64,
}

impl Range {
    pub fn new(start: i64, end: i64, step: i64) -> Value {
        // FIXME: descending ranges (negative step) are read as empty.
        if end > start && step > 0 {
            Value::Range(Range { start, end, step })
        } else {
            Value::List(List::EMPTY)
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    // Number of elements traversal yields: ceil((end - start) / step).
    fn len_i128(&self) -> i128 {
        let span = self.end as i128 - self.start as i128;
        let step = self.step as i128;
        (span + step - 1) / step
    }

    /// Builds the whole range as a list, consing from the top element down so the
    /// result is ascending.
    pub fn materialize(&self) -> List {
        let len = self.len_i128();
        trace!(start = self.start, end = self.end, step = self.step, len = %len, "materializing range");
        let mut list = List::EMPTY;
        for i in (0..len).rev() {
            let value = self.start as i128 + i * self.step as i128;
            list = list.prepend(Value::Int(value as i64));
        }
        list
    }
}

impl Seq for Range {
    fn first(&self) -> Value {
        Value::Int(self.start)
    }

    fn more(&self) -> List {
        self.materialize().more()
    }

    fn cons(&self, value: Value) -> List {
        self.materialize().prepend(value)
    }

    fn seq(&self) -> List {
        self.materialize()
    }
}

impl Collection for Range {
    fn raw_count(&self) -> usize {
        usize::try_from(self.len_i128()).unwrap_or(usize::MAX)
    }

    fn empty(&self) -> Value {
        Value::List(List::EMPTY)
    }
}

impl Indexed for Range {
    fn value_at_or(&self, key: &Value, default: Value) -> Value {
        let Some(index) = key.as_int() else {
            return default;
        };
        match index
            .checked_mul(self.step)
            .and_then(|offset| self.start.checked_add(offset))
        {
            Some(nth) if nth >= self.start && nth <= self.end => Value::Int(nth),
            _ => default,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.materialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: i64, end: i64, step: i64) -> Range {
        match Range::new(start, end, step) {
            Value::Range(r) => r,
            other => panic!("expected a range, got {other}"),
        }
    }

    #[test]
    fn degenerate_parameters_yield_the_empty_list() {
        for (start, end, step) in [(5, 5, 1), (5, 3, 1), (0, 10, -1), (0, 10, 0)] {
            match Range::new(start, end, step) {
                Value::List(list) => assert!(list.ptr_eq(&List::EMPTY)),
                other => panic!("({start}, {end}, {step}) gave {other}"),
            }
        }
    }

    #[test]
    fn count_matches_traversal() {
        assert_eq!(range(0, 10, 1).raw_count(), 10);
        assert_eq!(range(0, 10, 3).raw_count(), 4);
        assert_eq!(range(0, 9, 3).raw_count(), 3);
        assert_eq!(range(1, 2, 5).raw_count(), 1);
        assert_eq!(range(0, 10, 3).seq().len(), 4);
        assert_eq!(range(0, 10, 3).count(), Value::Int(4));
    }

    #[test]
    fn materializes_ascending() {
        assert_eq!(range(0, 10, 3).to_string(), "(0 3 6 9)");
        assert_eq!(range(-2, 2, 1).to_string(), "(-2 -1 0 1)");
    }

    #[test]
    fn traversal_after_first_step_is_a_list() {
        let r = range(0, 4, 1);
        assert_eq!(r.first(), Value::Int(0));
        let rest = r.next();
        assert_eq!(rest.to_string(), "(1 2 3)");
        assert_eq!(r.cons(Value::Int(-1)).to_string(), "(-1 0 1 2 3)");
        assert!(range(0, 1, 1).more().ptr_eq(&List::EMPTY));
    }

    #[test]
    fn value_at_is_arithmetic() {
        let r = range(10, 20, 5);
        assert_eq!(r.value_at(&Value::Int(0)), Value::Int(10));
        assert_eq!(r.value_at(&Value::Int(1)), Value::Int(15));
        assert_eq!(r.value_at(&Value::Int(2)), Value::Int(20));
        assert_eq!(r.value_at(&Value::Int(3)), Value::Nil);
        assert_eq!(r.value_at(&Value::Int(-1)), Value::Nil);
        assert_eq!(r.value_at_or(&Value::Nil, Value::Int(-1)), Value::Int(-1));
        assert_eq!(r.value_at_or(&Value::from("x"), Value::Int(-1)), Value::Int(-1));
        assert_eq!(r.value_at(&Value::Int(i64::MAX)), Value::Nil);
    }

    #[test]
    fn huge_ranges_count_without_overflow() {
        let r = range(i64::MIN, i64::MAX, i64::MAX);
        assert_eq!(r.raw_count(), 3);
        assert_eq!(r.value_at(&Value::Int(1)), Value::Int(-1));
    }
}
