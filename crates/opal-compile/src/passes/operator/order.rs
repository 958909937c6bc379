//! Association, term scaling and term ordering.

use std::sync::Arc;

use opal_ir::{MathExpr, Operator};

use crate::analysis::{TermIndex, hilbert_space_dims, term_index, terms};
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::rule::Transformer;

use super::left_nest;

/// Re-associates sums and products to the left: `a ∘ (b ∘ c)` becomes
/// `(a ∘ b) ∘ c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProperOrder;

impl Transformer<Operator> for ProperOrder {
    fn name(&self) -> &str {
        "proper_order"
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        Ok(match node {
            Operator::Add(a, b) => match b.as_ref() {
                Operator::Add(x, y) => Some(Operator::Add(
                    Arc::new(Operator::Add(Arc::clone(a), Arc::clone(x))),
                    Arc::clone(y),
                )),
                _ => None,
            },
            Operator::Mul(a, b) => match b.as_ref() {
                Operator::Mul(x, y) => Some(Operator::Mul(
                    Arc::new(Operator::Mul(Arc::clone(a), Arc::clone(x))),
                    Arc::clone(y),
                )),
                _ => None,
            },
            Operator::Kron(a, b) => match b.as_ref() {
                Operator::Kron(x, y) => Some(Operator::Kron(
                    Arc::new(Operator::Kron(Arc::clone(a), Arc::clone(x))),
                    Arc::clone(y),
                )),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Gives every top-level term an explicit coefficient, defaulting to 1.
///
/// Works on the spine of a left-nested sum, so it is a whole-tree pass
/// rather than a local rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleTerms;

impl Pass<Operator> for ScaleTerms {
    fn name(&self) -> &str {
        "scale_terms"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, tree: &Operator) -> CompileResult<Operator> {
        let terms = terms(tree);
        if terms.iter().all(|t| matches!(t, Operator::ScalarMul(..))) {
            return Ok(tree.clone());
        }
        let scaled = terms.into_iter().map(|term| {
            Arc::new(match term {
                Operator::ScalarMul(..) => term.clone(),
                _ => Operator::ScalarMul(Arc::new(term.clone()), MathExpr::one()),
            })
        });
        Ok(left_nest(scaled, Operator::Add).unwrap_or_else(|| tree.clone()))
    }
}

/// Orders the terms of a sum by [`TermIndex`](crate::analysis::TermIndex).
///
/// The terms are sorted in one stable pass; terms with equal keys are
/// merged into the first of them by adding their coefficients in input
/// order. Equal keys on differently shaped terms are a
/// [`CompileError::HilbertSpaceMismatch`]. A sum that is already strictly
/// ordered is returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedOrder;

impl SortedOrder {
    fn split(term: &Operator) -> (Arc<Operator>, MathExpr) {
        match term {
            Operator::ScalarMul(op, coeff) => (Arc::clone(op), coeff.clone()),
            _ => (Arc::new(term.clone()), MathExpr::one()),
        }
    }

    fn merge(group: &[(TermIndex, &Operator)]) -> CompileResult<Arc<Operator>> {
        let [(_, first), rest @ ..] = group else {
            return Err(CompileError::InvalidFlow("empty term group".to_string()));
        };
        if rest.is_empty() {
            return Ok(Arc::new((*first).clone()));
        }
        let (op, coeff) = Self::split(first);
        let left = hilbert_space_dims(&op)?;
        let mut sum = coeff;
        for (_, term) in rest {
            let (other, coeff) = Self::split(term);
            let right = hilbert_space_dims(&other)?;
            if left != right {
                return Err(CompileError::HilbertSpaceMismatch {
                    context: "SortedOrder",
                    left,
                    right,
                });
            }
            sum = sum + coeff;
        }
        Ok(Arc::new(Operator::ScalarMul(op, sum)))
    }
}

impl Pass<Operator> for SortedOrder {
    fn name(&self) -> &str {
        "sorted_order"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, tree: &Operator) -> CompileResult<Operator> {
        let mut keyed = terms(tree)
            .into_iter()
            .map(|term| Ok((term_index(term)?, term)))
            .collect::<CompileResult<Vec<_>>>()?;
        if keyed.windows(2).all(|pair| pair[0].0 < pair[1].0) {
            return Ok(tree.clone());
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let merged = keyed
            .chunk_by(|a, b| a.0 == b.0)
            .map(Self::merge)
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(left_nest(merged, Operator::Add).unwrap_or_else(|| tree.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::FixedPoint;
    use crate::walk::Walk;

    #[test]
    fn test_left_nesting() {
        let op = Operator::pauli_x() + (Operator::pauli_y() + Operator::pauli_z());
        let out = FixedPoint::new(Walk::post(ProperOrder), 10).run(&op).unwrap();
        assert_eq!(out, Operator::pauli_x() + Operator::pauli_y() + Operator::pauli_z());
    }

    #[test]
    fn test_scale_terms() {
        let op = Operator::pauli_x() + Operator::pauli_y().scale(2.0);
        let out = ScaleTerms.run(&op).unwrap();
        assert_eq!(
            out,
            Operator::pauli_x().scale(1.0) + Operator::pauli_y().scale(2.0)
        );
        assert_eq!(ScaleTerms.run(&out).unwrap(), out);
    }

    #[test]
    fn test_sort_swaps_terms() {
        let op = Operator::pauli_z().scale(1.0) + Operator::pauli_x().scale(2.0);
        let out = SortedOrder.run(&op).unwrap();
        assert_eq!(
            out,
            Operator::pauli_x().scale(2.0) + Operator::pauli_z().scale(1.0)
        );
    }

    #[test]
    fn test_sort_merges_duplicates() {
        let op = Operator::pauli_y().scale(1.0)
            + Operator::pauli_x().scale(1.0)
            + Operator::pauli_y().scale(MathExpr::var("g"));
        let out = SortedOrder.run(&op).unwrap();
        assert_eq!(
            out,
            Operator::pauli_x().scale(1.0)
                + Operator::pauli_y().scale(MathExpr::one() + MathExpr::var("g"))
        );
        assert_eq!(SortedOrder.run(&out).unwrap(), out);
    }

    #[test]
    fn test_sort_reversed_sum_in_one_pass() {
        let paulis = [
            Operator::pauli_z(),
            Operator::pauli_y(),
            Operator::pauli_x(),
            Operator::pauli_i(),
        ];
        let two_registers = |i: usize| {
            paulis[i / 4]
                .clone()
                .kron(paulis[i % 4].clone())
                .scale(MathExpr::var(format!("c{i}")))
        };
        let reversed = (1..16).fold(two_registers(0), |acc, i| acc + two_registers(i));
        let out = SortedOrder.run(&reversed).unwrap();
        let keys = crate::analysis::term_indices(&out).unwrap();
        assert_eq!(keys.len(), 16);
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(terms(&out)[0], &two_registers(15));
    }

    #[test]
    fn test_merge_rejects_mismatched_shapes() {
        // X and a† never share a key, so the group is built by hand.
        let group = [
            (TermIndex(vec![]), &Operator::pauli_x()),
            (TermIndex(vec![]), &Operator::creation()),
        ];
        assert!(matches!(
            SortedOrder::merge(&group),
            Err(CompileError::HilbertSpaceMismatch { context: "SortedOrder", .. })
        ));
    }
}
