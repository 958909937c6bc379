//! Operator rewrite rules.
//!
//! Each rule is a local [`Transformer`](crate::rule::Transformer) meant to
//! run under a post-order [`Walk`](crate::walk::Walk), repeated to a fixed
//! point. Rules only look at a node and its immediate operands; longer
//! chains are handled by matching the left-nested form `op(op(rest, x), y)`
//! that [`ProperOrder`] establishes.

mod algebra;
mod coefficients;
mod distribute;
mod order;

use std::sync::Arc;

use opal_ir::{Ladder, Operator};

pub use algebra::{GatherPauli, NormalOrder, PauliAlgebra, PruneIdentity};
pub use coefficients::Coefficients;
pub use distribute::{GatherMathExpr, OperatorDistribute};
pub use order::{ProperOrder, ScaleTerms, SortedOrder};

/// Register or mode factor of a tensor-product chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Register,
    Mode,
}

/// Slot kind of a factor, read off its leftmost terminal.
pub(crate) fn slot(op: &Operator) -> Option<Slot> {
    let mut current = op;
    loop {
        match current {
            Operator::Pauli(_) => return Some(Slot::Register),
            Operator::Ladder(_) => return Some(Slot::Mode),
            Operator::Mul(a, _) | Operator::ScalarMul(a, _) => current = a,
            Operator::Add(..) | Operator::Sub(..) | Operator::Kron(..) => return None,
        }
    }
}

pub(crate) fn is_ladder(op: &Operator, ladder: Ladder) -> bool {
    matches!(op, Operator::Ladder(l) if *l == ladder)
}

/// Flatten a tensor-product chain of any nesting into its factors.
pub(crate) fn kron_factors(op: &Arc<Operator>, out: &mut Vec<Arc<Operator>>) {
    let mut pending = vec![op];
    while let Some(node) = pending.pop() {
        match node.as_ref() {
            Operator::Kron(a, b) => {
                pending.push(b);
                pending.push(a);
            }
            _ => out.push(Arc::clone(node)),
        }
    }
}

/// Left-nest operands with the given binary constructor.
pub(crate) fn left_nest(
    operands: impl IntoIterator<Item = Arc<Operator>>,
    join: impl Fn(Arc<Operator>, Arc<Operator>) -> Operator,
) -> Option<Operator> {
    let mut operands = operands.into_iter();
    let first = operands.next()?;
    let nested = operands.fold(first, |acc, next| Arc::new(join(acc, next)));
    Some(Arc::unwrap_or_clone(nested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot() {
        assert_eq!(slot(&Operator::pauli_x()), Some(Slot::Register));
        assert_eq!(
            slot(&(Operator::creation() * Operator::annihilation())),
            Some(Slot::Mode)
        );
        assert_eq!(slot(&Operator::pauli_x().kron(Operator::pauli_y())), None);
    }

    #[test]
    fn test_flatten_and_nest() {
        let op = Arc::new(
            Operator::pauli_x().kron(Operator::pauli_y().kron(Operator::pauli_z())),
        );
        let mut factors = Vec::new();
        kron_factors(&op, &mut factors);
        assert_eq!(factors.len(), 3);
        let nested = left_nest(factors, Operator::Kron).unwrap();
        assert_eq!(
            nested,
            Operator::pauli_x()
                .kron(Operator::pauli_y())
                .kron(Operator::pauli_z())
        );
    }
}
