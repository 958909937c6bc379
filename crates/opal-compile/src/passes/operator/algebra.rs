//! Pauli algebra, slot gathering and ladder normal ordering.

use std::sync::Arc;

use opal_ir::{Ladder, MathExpr, Operator, Pauli};

use crate::error::CompileResult;
use crate::rule::Transformer;

use super::{Slot, is_ladder, slot};

/// Collapses products of two Pauli generators.
///
/// `I` absorbs, `p·p = I`, `XY = iZ`, `YZ = iX`, `ZX = iY`. The reversed
/// products become `-1·(q·p)` and are reduced on the next application.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauliAlgebra;

impl PauliAlgebra {
    /// Product of two Pauli generators.
    pub fn product(p: Pauli, q: Pauli) -> Operator {
        let cyclic = |r: Pauli| Operator::ScalarMul(Arc::new(Operator::Pauli(r)), MathExpr::Imag);
        match (p, q) {
            (Pauli::I, _) => Operator::Pauli(q),
            (_, Pauli::I) => Operator::Pauli(p),
            _ if p == q => Operator::Pauli(Pauli::I),
            (Pauli::X, Pauli::Y) => cyclic(Pauli::Z),
            (Pauli::Y, Pauli::Z) => cyclic(Pauli::X),
            (Pauli::Z, Pauli::X) => cyclic(Pauli::Y),
            _ => Operator::ScalarMul(
                Arc::new(Operator::Mul(
                    Arc::new(Operator::Pauli(q)),
                    Arc::new(Operator::Pauli(p)),
                )),
                MathExpr::Num(-1.0),
            ),
        }
    }
}

impl Transformer<Operator> for PauliAlgebra {
    fn name(&self) -> &str {
        "pauli_algebra"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        let Operator::Mul(a, b) = node else {
            return Ok(None);
        };
        let Operator::Pauli(q) = b.as_ref() else {
            return Ok(None);
        };
        Ok(match a.as_ref() {
            Operator::Pauli(p) => Some(Self::product(*p, *q)),
            Operator::Mul(rest, last) => match last.as_ref() {
                Operator::Pauli(p) => Some(Operator::Mul(
                    Arc::clone(rest),
                    Arc::new(Self::product(*p, *q)),
                )),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Moves Pauli factors of a tensor-product chain ahead of ladder factors.
///
/// Only adjacent (ladder, Pauli) pairs are swapped, so the relative order
/// within each group is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherPauli;

impl Transformer<Operator> for GatherPauli {
    fn name(&self) -> &str {
        "gather_pauli"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        let Operator::Kron(a, b) = node else {
            return Ok(None);
        };
        if slot(b) != Some(Slot::Register) {
            return Ok(None);
        }
        Ok(match a.as_ref() {
            Operator::Kron(rest, last) if slot(last) == Some(Slot::Mode) => Some(Operator::Kron(
                Arc::new(Operator::Kron(Arc::clone(rest), Arc::clone(b))),
                Arc::clone(last),
            )),
            _ if slot(a) == Some(Slot::Mode) => {
                Some(Operator::Kron(Arc::clone(b), Arc::clone(a)))
            }
            _ => None,
        })
    }
}

/// Moves creations left of annihilations within a ladder product.
///
/// `a·a† = a†·a + 1`; a ladder identity in front of a creation is moved
/// behind it so that pruning cannot leave an annihilation in front.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalOrder;

impl Transformer<Operator> for NormalOrder {
    fn name(&self) -> &str {
        "normal_order"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        let Operator::Mul(a, b) = node else {
            return Ok(None);
        };
        if !is_ladder(b, Ladder::Creation) {
            return Ok(None);
        }
        let (rest, last) = match a.as_ref() {
            Operator::Mul(rest, last) => (Some(rest), last),
            _ => (None, a),
        };
        let with_rest = |op: Operator| match rest {
            Some(rest) => Operator::Mul(Arc::clone(rest), Arc::new(op)),
            None => op,
        };
        // rest·C·x, left-nested.
        let swapped = |x: &Arc<Operator>| {
            Operator::Mul(Arc::new(with_rest(Operator::creation())), Arc::clone(x))
        };

        Ok(if is_ladder(last, Ladder::Annihilation) {
            let remainder = match rest {
                Some(rest) => Arc::clone(rest),
                None => Arc::new(Operator::identity()),
            };
            Some(Operator::Add(Arc::new(swapped(last)), remainder))
        } else if is_ladder(last, Ladder::Identity) {
            Some(swapped(last))
        } else {
            None
        })
    }
}

/// Removes ladder identities from products.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneIdentity;

impl Transformer<Operator> for PruneIdentity {
    fn name(&self) -> &str {
        "prune_identity"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        Ok(match node {
            Operator::Mul(a, b) if is_ladder(b, Ladder::Identity) => Some(a.as_ref().clone()),
            Operator::Mul(a, b) if is_ladder(a, Ladder::Identity) => Some(b.as_ref().clone()),
            _ => None,
        })
    }
}
