//! Single-slot equivalence memoization.
//!
//! [`EquivalenceMemo`] is the primitive every selector is built on. It keeps
//! exactly one (inputs, output) pair and compares by *value*, never by
//! reference, at two stages:
//!
//! 1. **Input stage**: if every new input is value-equal to the previous
//!    tuple, the previous output `Rc` is returned without recomputing and
//!    without touching the counter.
//! 2. **Output stage**: if the computation ran but produced a value equal to
//!    the previous output, the previous `Rc` is returned anyway so that
//!    downstream reference checks stay stable. The run still counts as a
//!    recomputation.
//!
//! Collection-producing selectors can opt into set-style comparison via
//! [`Equivalence::Collection`] so that reorderings with identical contents
//! do not propagate downstream.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use denorm_core::Value;

/// Input tuple passed through a memo. Most selectors have four or fewer.
pub type Inputs = SmallVec<[Rc<Value>; 4]>;

/// How a hydrated collection is compared for downstream stability.
///
/// `Unordered` treats two lists as equal when they have the same contents
/// regardless of order or duplication; `Ordered` is plain list equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionPolicy {
    #[default]
    Unordered,
    Ordered,
}

/// The comparison discipline for one memo stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equivalence {
    /// Deep structural equality.
    Value,
    /// Deep equality, except lists compare per the policy.
    Collection(CollectionPolicy),
}

impl Equivalence {
    /// Compares two shared values. Reference identity short-circuits: the
    /// same `Rc` is always equal to itself.
    pub fn eval(self, a: &Rc<Value>, b: &Rc<Value>) -> bool {
        if Rc::ptr_eq(a, b) {
            return true;
        }
        match self {
            Equivalence::Value | Equivalence::Collection(CollectionPolicy::Ordered) => a == b,
            Equivalence::Collection(CollectionPolicy::Unordered) => match (&**a, &**b) {
                (Value::List(x), Value::List(y)) => set_eq(x, y),
                _ => a == b,
            },
        }
    }
}

/// Set-style equality: every element of each side has a value-equal element
/// on the other side. Duplicates and ordering are ignored.
///
/// Quadratic, but hydrated collections are compared by value anyway and are
/// small relative to the table scans that produce them.
pub fn set_eq(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|y| a.contains(y))
}

#[derive(Debug)]
struct Slot {
    inputs: Inputs,
    output: Rc<Value>,
}

/// A single-slot memo over N upstream inputs.
#[derive(Debug)]
pub struct EquivalenceMemo {
    input_eq: SmallVec<[Equivalence; 4]>,
    output_eq: Equivalence,
    slot: RefCell<Option<Slot>>,
    recomputations: Cell<u64>,
}

impl EquivalenceMemo {
    /// Creates a memo with one [`Equivalence`] per expected input. Inputs
    /// beyond the declared list fall back to [`Equivalence::Value`].
    pub fn new(input_eq: SmallVec<[Equivalence; 4]>, output_eq: Equivalence) -> Self {
        EquivalenceMemo {
            input_eq,
            output_eq,
            slot: RefCell::new(None),
            recomputations: Cell::new(0),
        }
    }

    /// Monotonically non-decreasing count of computation invocations.
    pub fn recomputations(&self) -> u64 {
        self.recomputations.get()
    }

    /// Runs one memoized call: compare `inputs` against the previous tuple,
    /// recompute via `compute` only on a mismatch, stabilize the output
    /// reference on value-equal results.
    pub fn call(&self, inputs: Inputs, compute: impl FnOnce(&[Rc<Value>]) -> Rc<Value>) -> Rc<Value> {
        {
            let slot = self.slot.borrow();
            if let Some(slot) = slot.as_ref() {
                let unchanged = slot.inputs.len() == inputs.len()
                    && inputs
                        .iter()
                        .zip(slot.inputs.iter())
                        .enumerate()
                        .all(|(i, (new, old))| self.input_equivalence(i).eval(new, old));
                if unchanged {
                    return slot.output.clone();
                }
            }
        }

        let computed = compute(&inputs);
        self.recomputations.set(self.recomputations.get() + 1);

        let mut slot = self.slot.borrow_mut();
        let output = match slot.take() {
            Some(prev) if self.output_eq.eval(&computed, &prev.output) => prev.output,
            _ => computed,
        };
        *slot = Some(Slot {
            inputs,
            output: output.clone(),
        });
        output
    }

    fn input_equivalence(&self, index: usize) -> Equivalence {
        self.input_eq
            .get(index)
            .copied()
            .unwrap_or(Equivalence::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    fn ints(values: &[i64]) -> Inputs {
        values.iter().map(|n| Rc::new(Value::Int(*n))).collect()
    }

    #[test]
    fn equal_inputs_skip_recomputation() {
        let memo = EquivalenceMemo::new(smallvec![Equivalence::Value], Equivalence::Value);
        let first = memo.call(ints(&[1]), |_| Rc::new(Value::Int(10)));
        let second = memo.call(ints(&[1]), |_| Rc::new(Value::Int(999)));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(memo.recomputations(), 1);
    }

    #[test]
    fn changed_inputs_recompute() {
        let memo = EquivalenceMemo::new(smallvec![Equivalence::Value], Equivalence::Value);
        let first = memo.call(ints(&[1]), |_| Rc::new(Value::Int(10)));
        let second = memo.call(ints(&[2]), |_| Rc::new(Value::Int(20)));
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(*second, Value::Int(20));
        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn value_equal_output_keeps_previous_reference() {
        let memo = EquivalenceMemo::new(smallvec![Equivalence::Value], Equivalence::Value);
        let first = memo.call(ints(&[1]), |_| Rc::new(Value::Int(10)));
        // Inputs changed, recomputation happens, but the result is equal:
        // the old reference must come back and the counter must advance.
        let second = memo.call(ints(&[2]), |_| Rc::new(Value::Int(10)));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn zero_input_memo_computes_once() {
        let memo = EquivalenceMemo::new(smallvec![], Equivalence::Value);
        let first = memo.call(Inputs::new(), |_| Rc::new(Value::Int(5)));
        let second = memo.call(Inputs::new(), |_| Rc::new(Value::Int(5)));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(memo.recomputations(), 1);
    }

    #[test]
    fn unordered_collection_equivalence_ignores_order() {
        let policy = Equivalence::Collection(CollectionPolicy::Unordered);
        let a = Rc::new(Value::List(vec![Value::Int(1), Value::Int(2)]));
        let b = Rc::new(Value::List(vec![Value::Int(2), Value::Int(1), Value::Int(2)]));
        let c = Rc::new(Value::List(vec![Value::Int(1), Value::Int(3)]));
        assert!(policy.eval(&a, &b));
        assert!(!policy.eval(&a, &c));

        let ordered = Equivalence::Collection(CollectionPolicy::Ordered);
        assert!(!ordered.eval(&a, &b));
    }

    #[test]
    fn collection_equivalence_on_non_lists_is_deep() {
        let policy = Equivalence::Collection(CollectionPolicy::Unordered);
        let a = Rc::new(Value::Int(1));
        let b = Rc::new(Value::Int(1));
        assert!(policy.eval(&a, &b));
    }

    proptest! {
        #[test]
        fn set_eq_is_permutation_invariant(mut xs in proptest::collection::vec(-50i64..50, 0..8)) {
            let original: Vec<Value> = xs.iter().map(|n| Value::Int(*n)).collect();
            xs.reverse();
            let reversed: Vec<Value> = xs.iter().map(|n| Value::Int(*n)).collect();
            prop_assert!(set_eq(&original, &reversed));
        }

        #[test]
        fn set_eq_detects_membership_change(xs in proptest::collection::vec(-50i64..50, 0..8), extra in 100i64..200) {
            let original: Vec<Value> = xs.iter().map(|n| Value::Int(*n)).collect();
            let mut grown = original.clone();
            grown.push(Value::Int(extra));
            prop_assert!(!set_eq(&original, &grown));
        }
    }
}
