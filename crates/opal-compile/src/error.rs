//! Error types for the compilation crate.

use thiserror::Error;

use crate::analysis::HilbertSpace;

/// A violated canonical-form invariant.
///
/// Each variant names the invariant and carries the offending subtree (or
/// pair of terms) rendered as text.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CanonicalFormError {
    #[error("distribution incomplete at '{0}'")]
    DistributionIncomplete(String),

    #[error("chain is not left-nested at '{0}'")]
    ImproperAssociation(String),

    #[error("Pauli algebra incomplete at '{0}'")]
    PauliAlgebraIncomplete(String),

    #[error("ladder factor precedes Pauli factor in '{0}'")]
    PauliNotGathered(String),

    #[error("ladder product is not normal-ordered: '{0}'")]
    NotNormalOrdered(String),

    #[error("ladder identity left in product '{0}'")]
    IdentityNotPruned(String),

    #[error("term '{0}' has no explicit coefficient")]
    UnscaledTerm(String),

    #[error("nested scalar multiple in '{0}'")]
    NestedScalar(String),

    #[error("terms out of order: '{left}' precedes '{right}'")]
    UnsortedTerms { left: String, right: String },

    #[error("duplicate terms: '{left}' and '{right}'")]
    DuplicateTerms { left: String, right: String },

    #[error("coefficient '{0}' is not in canonical form")]
    NonCanonicalCoefficient(String),

    #[error("term {index} acts on {found}, expected {expected}")]
    InconsistentTermShape {
        index: usize,
        expected: HilbertSpace,
        found: HilbertSpace,
    },
}

/// Errors that can occur during compilation.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] opal_ir::IrError),

    /// The compiled tree violates a canonical-form invariant.
    #[error("Canonical form violated: {0}")]
    CanonicalForm(#[from] CanonicalFormError),

    /// Operands of a sum or product act on differently shaped spaces.
    #[error("Hilbert space mismatch in {context}: {left} vs {right}")]
    HilbertSpaceMismatch {
        context: &'static str,
        left: HilbertSpace,
        right: HilbertSpace,
    },

    /// A fixed-point loop or flow graph exceeded its iteration bound.
    #[error("'{name}' did not terminate within {limit} iterations")]
    NonTermination { name: String, limit: usize },

    /// A rule has no handler for a node variant.
    #[error("Rule '{rule}' has no handler for '{tag}'")]
    DispatchMiss { rule: String, tag: &'static str },

    /// A conversion rule asked for an operand its node does not have.
    #[error("Rule '{rule}' found no operand '{operand}'")]
    MissingOperand { rule: String, operand: &'static str },

    /// A flow graph definition is malformed.
    #[error("Invalid flow graph: {0}")]
    InvalidFlow(String),
}

impl CompileError {
    /// Whether a flow graph may intercept this error and redirect.
    ///
    /// Only node-local failures qualify. Runaway loops, missing handlers and
    /// shape mismatches always propagate.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CompileError::CanonicalForm(_) | CompileError::Ir(_))
    }

    /// Short stable name of the error variant, used for branching on errors.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Ir(_) => "ir",
            CompileError::CanonicalForm(_) => "canonical_form",
            CompileError::HilbertSpaceMismatch { .. } => "hilbert_space_mismatch",
            CompileError::NonTermination { .. } => "non_termination",
            CompileError::DispatchMiss { .. } => "dispatch_miss",
            CompileError::MissingOperand { .. } => "missing_operand",
            CompileError::InvalidFlow(_) => "invalid_flow",
        }
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
