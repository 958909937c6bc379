//! Hilbert-space shape analyses.
//!
//! [`HilbertSpaceDims`] computes the (registers, modes) shape of any operator
//! bottom-up and rejects sums and products whose operands disagree.
//! [`RegisterInformation`] is the running-accumulator variant: walked in
//! order over a distributed sum, it reports the shape of every additive
//! term, which the canonical-form verifier compares.

use serde::{Deserialize, Serialize};
use std::fmt;

use opal_ir::Operator;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::rule::{ConversionRule, Operands, Visitor, convert};
use crate::walk::Walk;

/// Number of qubit registers and bosonic modes an operator acts on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct HilbertSpace {
    pub n_qreg: usize,
    pub n_qmode: usize,
}

impl HilbertSpace {
    pub fn new(n_qreg: usize, n_qmode: usize) -> Self {
        Self { n_qreg, n_qmode }
    }

    /// Combined space of a tensor product.
    #[must_use]
    pub fn kron(self, other: HilbertSpace) -> Self {
        Self::new(self.n_qreg + other.n_qreg, self.n_qmode + other.n_qmode)
    }
}

impl fmt::Display for HilbertSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} qreg, {} qmode", self.n_qreg, self.n_qmode)
    }
}

/// Bottom-up shape computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HilbertSpaceDims;

impl ConversionRule<Operator> for HilbertSpaceDims {
    type Output = HilbertSpace;

    fn name(&self) -> &str {
        "hilbert_space_dims"
    }

    fn convert(
        &self,
        node: &Operator,
        mut operands: Operands<'_, HilbertSpace>,
    ) -> CompileResult<HilbertSpace> {
        match node {
            Operator::Pauli(_) => Ok(HilbertSpace::new(1, 0)),
            Operator::Ladder(_) => Ok(HilbertSpace::new(0, 1)),
            Operator::ScalarMul(..) => operands.take("op"),
            Operator::Kron(..) => {
                let (left, right) = operands.take_pair("op1", "op2")?;
                Ok(left.kron(right))
            }
            Operator::Add(..) | Operator::Sub(..) | Operator::Mul(..) => {
                let (left, right) = operands.take_pair("op1", "op2")?;
                if left != right {
                    return Err(CompileError::HilbertSpaceMismatch {
                        context: match node {
                            Operator::Add(..) => "Add",
                            Operator::Sub(..) => "Sub",
                            _ => "Mul",
                        },
                        left,
                        right,
                    });
                }
                Ok(left)
            }
        }
    }
}

/// Shape of an operator, failing on inconsistent operands.
pub fn hilbert_space_dims(op: &Operator) -> CompileResult<HilbertSpace> {
    convert(&HilbertSpaceDims, op)
}

/// Analysis pass that rejects dimensionally inconsistent operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyHilbertSpace;

impl Pass<Operator> for VerifyHilbertSpace {
    fn name(&self) -> &str {
        "verify_hilbert_space"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, tree: &Operator) -> CompileResult<Operator> {
        hilbert_space_dims(tree)?;
        Ok(tree.clone())
    }
}

/// Slot type of the factor being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Register,
    Mode,
}

/// Running state of [`RegisterInformation`].
#[derive(Debug, Clone, Default)]
pub struct RegisterState {
    terms: Vec<HilbertSpace>,
    current: HilbertSpace,
    factor: Option<Slot>,
    leaves: usize,
}

impl RegisterState {
    /// Shapes of all additive terms, in order.
    pub fn into_terms(mut self) -> Vec<HilbertSpace> {
        if self.leaves > 0 {
            self.terms.push(self.current);
        }
        self.terms
    }
}

/// In-order visitor recording the shape of each additive term.
///
/// Assumes a distributed tree: sums only above products, tensor products
/// only above operator products. A `Mul` continues the current factor, a
/// `Kron` starts a new one, and an `Add` or `Sub` closes the term.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterInformation;

impl Visitor<Operator> for RegisterInformation {
    type State = RegisterState;

    fn name(&self) -> &str {
        "register_information"
    }

    fn visit(&self, node: &Operator, state: &mut RegisterState) -> CompileResult<()> {
        let slot = match node {
            Operator::Pauli(_) => Slot::Register,
            Operator::Ladder(_) => Slot::Mode,
            Operator::Kron(..) => {
                state.factor = None;
                return Ok(());
            }
            Operator::Add(..) | Operator::Sub(..) => {
                let current = std::mem::take(&mut state.current);
                state.terms.push(current);
                state.factor = None;
                state.leaves = 0;
                return Ok(());
            }
            Operator::Mul(..) | Operator::ScalarMul(..) => return Ok(()),
        };
        state.leaves += 1;
        if state.factor.is_none() {
            match slot {
                Slot::Register => state.current.n_qreg += 1,
                Slot::Mode => state.current.n_qmode += 1,
            }
            state.factor = Some(slot);
        }
        Ok(())
    }
}

/// Shapes of the additive terms of a distributed operator.
pub fn term_shapes(op: &Operator) -> CompileResult<Vec<HilbertSpace>> {
    Ok(Walk::in_order(RegisterInformation).visit(op)?.into_terms())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_dims() {
        assert_eq!(
            hilbert_space_dims(&Operator::pauli_x()).unwrap(),
            HilbertSpace::new(1, 0)
        );
        assert_eq!(
            hilbert_space_dims(&Operator::identity()).unwrap(),
            HilbertSpace::new(0, 1)
        );
    }

    #[test]
    fn test_nested_dims() {
        // X ⊗ (Y + Z) ⊗ a†a
        let op = Operator::pauli_x()
            .kron(Operator::pauli_y() + Operator::pauli_z())
            .kron(Operator::creation() * Operator::annihilation());
        assert_eq!(hilbert_space_dims(&op).unwrap(), HilbertSpace::new(2, 1));
    }

    #[test]
    fn test_mismatched_sum() {
        let op = Operator::pauli_x() + Operator::annihilation();
        assert_eq!(
            hilbert_space_dims(&op).unwrap_err(),
            CompileError::HilbertSpaceMismatch {
                context: "Add",
                left: HilbertSpace::new(1, 0),
                right: HilbertSpace::new(0, 1),
            }
        );
    }

    #[test]
    fn test_mismatched_product() {
        let op = Operator::pauli_x() * Operator::pauli_x().kron(Operator::pauli_y());
        assert!(matches!(
            VerifyHilbertSpace.run(&op),
            Err(CompileError::HilbertSpaceMismatch { context: "Mul", .. })
        ));
    }

    #[test]
    fn test_term_shapes() {
        // X ⊗ a†a + 2·(Y ⊗ a) + Z
        let op = Operator::pauli_x().kron(Operator::creation() * Operator::annihilation())
            + Operator::pauli_y().kron(Operator::annihilation()).scale(2.0)
            + Operator::pauli_z();
        assert_eq!(
            term_shapes(&op).unwrap(),
            vec![
                HilbertSpace::new(1, 1),
                HilbertSpace::new(1, 1),
                HilbertSpace::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_term_shapes_single_term() {
        let op = Operator::pauli_x() * Operator::pauli_y();
        assert_eq!(term_shapes(&op).unwrap(), vec![HilbertSpace::new(1, 0)]);
    }
}
