//! Lifting coefficient passes onto operators.

use std::sync::Arc;

use opal_ir::{MathExpr, Operator};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::rule::Transformer;

/// Runs a [`MathExpr`] pass on the coefficient of every scalar multiple.
#[derive(Debug, Clone)]
pub struct Coefficients<P> {
    math: P,
}

impl<P> Coefficients<P> {
    pub fn new(math: P) -> Self {
        Self { math }
    }
}

impl<P: Pass<MathExpr>> Transformer<Operator> for Coefficients<P> {
    fn name(&self) -> &str {
        self.math.name()
    }

    fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
        let Operator::ScalarMul(op, coeff) = node else {
            return Ok(None);
        };
        let rewritten = self.math.run(coeff)?;
        Ok((rewritten != *coeff).then(|| Operator::ScalarMul(Arc::clone(op), rewritten)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::math::SubstituteVars;
    use crate::walk::Walk;

    #[test]
    fn test_substitute_in_coefficients() {
        let op = Operator::pauli_x().scale(MathExpr::var("g"))
            + Operator::pauli_z().kron(Operator::pauli_z().scale(MathExpr::var("h")));
        let pass = Walk::post(Coefficients::new(Walk::post(
            SubstituteVars::new().with("g", 0.5),
        )));
        let out = pass.run(&op).unwrap();
        assert_eq!(
            out,
            Operator::pauli_x().scale(0.5)
                + Operator::pauli_z().kron(Operator::pauli_z().scale(MathExpr::var("h")))
        );
    }
}
