//! Built-in rewrite rules and verification passes.
//!
//! Rules are organized by the tree they rewrite:
//! - [`operator`]: distribution, association, Pauli algebra, slot gathering,
//!   normal ordering and term ordering on [`Operator`](opal_ir::Operator)s
//! - [`math`]: canonicalization of [`MathExpr`](opal_ir::MathExpr)
//!   coefficients
//! - [`verification`]: the canonical-form invariants

pub mod math;
pub mod operator;
pub mod verification;

pub use math::{
    CollectTerms, DistributeMathExpr, PartitionMathExpr, ProperOrderMathExpr, SimplifyMathExpr,
    SubstituteVars, math_pipeline,
};
pub use operator::{
    Coefficients, GatherMathExpr, GatherPauli, NormalOrder, OperatorDistribute, PauliAlgebra,
    ProperOrder, PruneIdentity, ScaleTerms, SortedOrder,
};
pub use verification::{CanonicalFormVerifier, Invariant};
