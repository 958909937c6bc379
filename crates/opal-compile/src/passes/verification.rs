//! Canonical-form verification.
//!
//! Every property of the canonical form is an independent [`Invariant`]: a
//! pure check returning the typed reason it is violated. Structural
//! invariants are pre-order visitors that stop at the first offending node.
//! [`CanonicalFormVerifier`] runs the full set in dependency order, so
//! later checks (term order, coefficients, shapes) only see trees whose
//! structure is already canonical.
//!
//! # Canonical form
//!
//! ```text
//! sum  := term | sum + term                        (left-nested)
//! term := factors * coeff                          (one scalar per term)
//! factors := slot | factors @ slot                 (Pauli slots first)
//! slot := Pauli | ladder | slot*ladder             (a† before a, no 1 in products)
//! ```
//! Term keys strictly increase along the sum and coefficients are fixed
//! points of the coefficient pipeline.

use opal_ir::{Ladder, Operator};
use tracing::debug;

use crate::analysis::{term_index, term_shapes, terms};
use crate::error::{CanonicalFormError, CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::math::math_pipeline;
use crate::passes::operator::{Slot, is_ladder, slot};
use crate::rule::Visitor;
use crate::walk::Walk;

/// A named property of the canonical form.
pub trait Invariant: Send + Sync {
    /// Name of the property.
    fn name(&self) -> &'static str;

    /// Check the property on a whole tree.
    fn check(&self, op: &Operator) -> CompileResult<()>;
}

fn violation(err: CanonicalFormError) -> CompileResult<()> {
    Err(CompileError::CanonicalForm(err))
}

/// Defines a structural invariant as a pre-order visitor.
macro_rules! structural_invariant {
    ($(#[$doc:meta])* $ty:ident, $name:literal, |$node:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl Visitor<Operator> for $ty {
            type State = ();

            fn name(&self) -> &str {
                $name
            }

            fn visit(&self, $node: &Operator, _: &mut ()) -> CompileResult<()> {
                $body
            }
        }

        impl Invariant for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn check(&self, op: &Operator) -> CompileResult<()> {
                Walk::pre(self).visit(op)
            }
        }
    };
}

structural_invariant!(
    /// No differences, and no sums below products or scalar multiples.
    Distributed,
    "distributed",
    |node| match node {
        Operator::Sub(..) => violation(CanonicalFormError::DistributionIncomplete(node.to_string())),
        Operator::Mul(a, b) | Operator::Kron(a, b)
            if matches!(a.as_ref(), Operator::Add(..)) || matches!(b.as_ref(), Operator::Add(..)) =>
        {
            violation(CanonicalFormError::DistributionIncomplete(node.to_string()))
        }
        Operator::Mul(a, b)
            if matches!(a.as_ref(), Operator::Kron(..)) || matches!(b.as_ref(), Operator::Kron(..)) =>
        {
            violation(CanonicalFormError::DistributionIncomplete(node.to_string()))
        }
        Operator::ScalarMul(op, _) if matches!(op.as_ref(), Operator::Add(..)) => {
            violation(CanonicalFormError::DistributionIncomplete(node.to_string()))
        }
        _ => Ok(()),
    }
);

structural_invariant!(
    /// Sums and products nest to the left.
    LeftNested,
    "left_nested",
    |node| match node {
        Operator::Add(_, b) if matches!(b.as_ref(), Operator::Add(..)) => {
            violation(CanonicalFormError::ImproperAssociation(node.to_string()))
        }
        Operator::Mul(_, b) if matches!(b.as_ref(), Operator::Mul(..)) => {
            violation(CanonicalFormError::ImproperAssociation(node.to_string()))
        }
        Operator::Kron(_, b) if matches!(b.as_ref(), Operator::Kron(..)) => {
            violation(CanonicalFormError::ImproperAssociation(node.to_string()))
        }
        _ => Ok(()),
    }
);

structural_invariant!(
    /// No product of two adjacent Pauli generators.
    PauliReduced,
    "pauli_reduced",
    |node| {
        let Operator::Mul(a, b) = node else {
            return Ok(());
        };
        let last = match a.as_ref() {
            Operator::Mul(_, last) => last.as_ref(),
            other => other,
        };
        if last.is_pauli() && b.is_pauli() {
            return violation(CanonicalFormError::PauliAlgebraIncomplete(node.to_string()));
        }
        Ok(())
    }
);

structural_invariant!(
    /// Pauli slots precede ladder slots in every tensor product.
    PauliGathered,
    "pauli_gathered",
    |node| {
        let Operator::Kron(a, b) = node else {
            return Ok(());
        };
        let last = match a.as_ref() {
            Operator::Kron(_, last) => last.as_ref(),
            other => other,
        };
        if slot(last) == Some(Slot::Mode) && slot(b) == Some(Slot::Register) {
            return violation(CanonicalFormError::PauliNotGathered(node.to_string()));
        }
        Ok(())
    }
);

structural_invariant!(
    /// No annihilation or identity directly before a creation.
    NormalOrdered,
    "normal_ordered",
    |node| {
        let Operator::Mul(a, b) = node else {
            return Ok(());
        };
        let last = match a.as_ref() {
            Operator::Mul(_, last) => last.as_ref(),
            other => other,
        };
        if is_ladder(b, Ladder::Creation)
            && (is_ladder(last, Ladder::Annihilation) || is_ladder(last, Ladder::Identity))
        {
            return violation(CanonicalFormError::NotNormalOrdered(node.to_string()));
        }
        Ok(())
    }
);

structural_invariant!(
    /// No ladder identity inside a product.
    IdentityPruned,
    "identity_pruned",
    |node| match node {
        Operator::Mul(a, b) if is_ladder(a, Ladder::Identity) || is_ladder(b, Ladder::Identity) => {
            violation(CanonicalFormError::IdentityNotPruned(node.to_string()))
        }
        _ => Ok(()),
    }
);

structural_invariant!(
    /// Rejects every scalar multiple it meets.
    NoScalar,
    "no_scalar",
    |node| match node {
        Operator::ScalarMul(..) => violation(CanonicalFormError::NestedScalar(node.to_string())),
        _ => Ok(()),
    }
);

/// Every term is a single scalar multiple at its root.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaledTerms;

impl Invariant for ScaledTerms {
    fn name(&self) -> &'static str {
        "scaled_terms"
    }

    fn check(&self, op: &Operator) -> CompileResult<()> {
        for term in terms(op) {
            let Operator::ScalarMul(inner, _) = term else {
                return violation(CanonicalFormError::UnscaledTerm(term.to_string()));
            };
            NoScalar.check(inner)?;
        }
        Ok(())
    }
}

/// Term keys strictly increase along the sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedTerms;

impl Invariant for SortedTerms {
    fn name(&self) -> &'static str {
        "sorted_terms"
    }

    fn check(&self, op: &Operator) -> CompileResult<()> {
        let terms = terms(op);
        let mut keys = Vec::with_capacity(terms.len());
        for term in &terms {
            match term_index(term) {
                Ok(key) => keys.push(key),
                Err(CompileError::DispatchMiss { .. }) => {
                    return violation(CanonicalFormError::DistributionIncomplete(term.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        for (i, pair) in keys.windows(2).enumerate() {
            let (left, right) = (terms[i].to_string(), terms[i + 1].to_string());
            if pair[0] == pair[1] {
                return violation(CanonicalFormError::DuplicateTerms { left, right });
            }
            if pair[0] > pair[1] {
                return violation(CanonicalFormError::UnsortedTerms { left, right });
            }
        }
        Ok(())
    }
}

/// Every coefficient is a fixed point of the coefficient pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalCoefficients {
    max_iter: usize,
}

impl CanonicalCoefficients {
    pub fn new(max_iter: usize) -> Self {
        Self { max_iter }
    }
}

impl Invariant for CanonicalCoefficients {
    fn name(&self) -> &'static str {
        "canonical_coefficients"
    }

    fn check(&self, op: &Operator) -> CompileResult<()> {
        let pipeline = math_pipeline(self.max_iter);
        for term in terms(op) {
            if let Operator::ScalarMul(_, coeff) = term {
                if pipeline.run(coeff)? != *coeff {
                    return violation(CanonicalFormError::NonCanonicalCoefficient(coeff.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// All terms act on the same registers and modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistentShapes;

impl Invariant for ConsistentShapes {
    fn name(&self) -> &'static str {
        "consistent_shapes"
    }

    fn check(&self, op: &Operator) -> CompileResult<()> {
        let shapes = term_shapes(op)?;
        let Some(&expected) = shapes.first() else {
            return Ok(());
        };
        match shapes.iter().position(|s| *s != expected) {
            Some(index) => violation(CanonicalFormError::InconsistentTermShape {
                index,
                expected,
                found: shapes[index],
            }),
            None => Ok(()),
        }
    }
}

/// The full canonical-form check.
pub struct CanonicalFormVerifier {
    invariants: Vec<Box<dyn Invariant>>,
}

impl CanonicalFormVerifier {
    /// All invariants, with the coefficient check bounded by `max_iter`.
    pub fn new(max_iter: usize) -> Self {
        Self {
            invariants: vec![
                Box::new(Distributed),
                Box::new(LeftNested),
                Box::new(PauliReduced),
                Box::new(PauliGathered),
                Box::new(NormalOrdered),
                Box::new(IdentityPruned),
                Box::new(ScaledTerms),
                Box::new(SortedTerms),
                Box::new(CanonicalCoefficients::new(max_iter)),
                Box::new(ConsistentShapes),
            ],
        }
    }

    /// Names of the invariants, in checking order.
    pub fn invariant_names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|i| i.name()).collect()
    }

    /// Fail with the first violated invariant.
    pub fn check(&self, op: &Operator) -> CompileResult<()> {
        for invariant in &self.invariants {
            invariant.check(op)?;
            debug!("Invariant {} holds", invariant.name());
        }
        Ok(())
    }

    /// Every violated invariant, with its name.
    ///
    /// Checks past the first structural violation may report follow-up
    /// issues of the same defect.
    pub fn violations(&self, op: &Operator) -> CompileResult<Vec<(&'static str, CanonicalFormError)>> {
        let mut found = Vec::new();
        for invariant in &self.invariants {
            match invariant.check(op) {
                Ok(()) => {}
                Err(CompileError::CanonicalForm(err)) => found.push((invariant.name(), err)),
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}

impl Pass<Operator> for CanonicalFormVerifier {
    fn name(&self) -> &str {
        "verify_canonical_form"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, tree: &Operator) -> CompileResult<Operator> {
        self.check(tree)?;
        Ok(tree.clone())
    }
}
