//! Distribution and scalar gathering.

use std::sync::Arc;

use opal_ir::{MathExpr, Operator};

use crate::analysis::hilbert_space_dims;
use crate::error::CompileResult;
use crate::rule::Transformer;

use super::{Slot, kron_factors, left_nest, slot};

/// Pushes products and scalar multiples through sums.
///
/// - `a - b` becomes `a + (-1)·b`
/// - `(a + b)·c`, `c·(a + b)` and the tensor-product forms expand
/// - `k·(a + b)` becomes `k·a + k·b`
/// - `(a ⊗ b)·(c ⊗ d)` becomes `(a·c) ⊗ (b·d)` when the factors pair up
///   slot by slot
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorDistribute;

impl OperatorDistribute {
    fn paired(left: &[Arc<Operator>], right: &[Arc<Operator>]) -> CompileResult<bool> {
        for (l, r) in left.iter().zip(right) {
            if hilbert_space_dims(l)? != hilbert_space_dims(r)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Pairwise product of two tensor-product chains with matching factors.
    ///
    /// Chains whose factors only pair up once registers are moved ahead of
    /// modes are gathered first; this keeps the operator, since registers
    /// always precede modes in the represented space.
    fn split_product(a: &Arc<Operator>, b: &Arc<Operator>) -> CompileResult<Option<Operator>> {
        let (mut left, mut right) = (Vec::new(), Vec::new());
        kron_factors(a, &mut left);
        kron_factors(b, &mut right);
        if left.len() < 2 || left.len() != right.len() {
            return Ok(None);
        }
        if !Self::paired(&left, &right)? {
            left.sort_by_key(|f| slot(f) == Some(Slot::Mode));
            right.sort_by_key(|f| slot(f) == Some(Slot::Mode));
            if !Self::paired(&left, &right)? {
                return Ok(None);
            }
        }
        let products = left
            .into_iter()
            .zip(right)
            .map(|(l, r)| Arc::new(Operator::Mul(l, r)));
        Ok(left_nest(products, Operator::Kron))
    }
}

impl Transformer<Operator> for OperatorDistribute {
    fn name(&self) -> &str {
        "operator_distribute"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        match node {
            Operator::Sub(a, b) => Ok(Some(Operator::Add(
                Arc::clone(a),
                Arc::new(Operator::ScalarMul(Arc::clone(b), MathExpr::Num(-1.0))),
            ))),
            Operator::Mul(a, b) | Operator::Kron(a, b) => {
                let join = |x: &Arc<Operator>, y: &Arc<Operator>| {
                    Arc::new(match node {
                        Operator::Mul(..) => Operator::Mul(Arc::clone(x), Arc::clone(y)),
                        _ => Operator::Kron(Arc::clone(x), Arc::clone(y)),
                    })
                };
                if let Operator::Add(l, r) = a.as_ref() {
                    return Ok(Some(Operator::Add(join(l, b), join(r, b))));
                }
                if let Operator::Add(l, r) = b.as_ref() {
                    return Ok(Some(Operator::Add(join(a, l), join(a, r))));
                }
                if matches!(node, Operator::Mul(..))
                    && matches!(a.as_ref(), Operator::Kron(..))
                    && matches!(b.as_ref(), Operator::Kron(..))
                {
                    return Self::split_product(a, b);
                }
                Ok(None)
            }
            Operator::ScalarMul(op, coeff) => match op.as_ref() {
                Operator::Add(l, r) => Ok(Some(Operator::Add(
                    Arc::new(Operator::ScalarMul(Arc::clone(l), coeff.clone())),
                    Arc::new(Operator::ScalarMul(Arc::clone(r), coeff.clone())),
                ))),
                _ => Ok(None),
            },
            Operator::Pauli(_) | Operator::Ladder(_) | Operator::Add(..) => Ok(None),
        }
    }
}

/// Pulls scalar multiples out of products and merges nested ones.
///
/// - `(k·a)·b` and `a·(k·b)` become `k·(a·b)`, likewise for tensor products
/// - `k2·(k1·a)` becomes `(k1·k2)·a`
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherMathExpr;

impl Transformer<Operator> for GatherMathExpr {
    fn name(&self) -> &str {
        "gather_math_expr"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        Ok(match node {
            Operator::Mul(a, b) | Operator::Kron(a, b) => {
                let join = |x: Arc<Operator>, y: Arc<Operator>| match node {
                    Operator::Mul(..) => Operator::Mul(x, y),
                    _ => Operator::Kron(x, y),
                };
                match (a.as_ref(), b.as_ref()) {
                    (Operator::ScalarMul(x, k), _) => Some(Operator::ScalarMul(
                        Arc::new(join(Arc::clone(x), Arc::clone(b))),
                        k.clone(),
                    )),
                    (_, Operator::ScalarMul(y, k)) => Some(Operator::ScalarMul(
                        Arc::new(join(Arc::clone(a), Arc::clone(y))),
                        k.clone(),
                    )),
                    _ => None,
                }
            }
            Operator::ScalarMul(inner, outer) => match inner.as_ref() {
                Operator::ScalarMul(op, k) => Some(Operator::ScalarMul(
                    Arc::clone(op),
                    k.clone() * outer.clone(),
                )),
                _ => None,
            },
            _ => None,
        })
    }
}
