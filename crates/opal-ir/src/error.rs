//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A coefficient refers to a variable with no bound value.
    #[error("Variable '{0}' is unbound")]
    UnboundVariable(String),

    /// Function name not part of the coefficient language.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Division by an expression that evaluates to zero.
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),

    /// Two operands of a product or sum act on spaces of different size.
    #[error(
        "Operand dimension mismatch in {context}: {left_qubits} qubit(s) / {left_modes} mode(s) vs {right_qubits} qubit(s) / {right_modes} mode(s)"
    )]
    DimensionMismatch {
        /// Node kind where the mismatch was found.
        context: &'static str,
        /// Qubit registers of the left operand.
        left_qubits: usize,
        /// Bosonic modes of the left operand.
        left_modes: usize,
        /// Qubit registers of the right operand.
        right_qubits: usize,
        /// Bosonic modes of the right operand.
        right_modes: usize,
    },

    /// Fock-space truncation too small to represent a ladder operator.
    #[error("Fock dimension must be at least 2, got {0}")]
    InvalidFockDimension(usize),

    /// Dense evaluation would allocate an unreasonably large matrix.
    #[error("Dense matrix of dimension {0} exceeds the evaluation limit")]
    MatrixTooLarge(usize),
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
