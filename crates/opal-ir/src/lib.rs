//! Opal Operator Intermediate Representation
//!
//! This crate provides the expression trees that the Opal compiler
//! canonicalizes: symbolic quantum operators over a closed algebra of
//! Pauli and bosonic ladder generators, and the symbolic coefficient
//! language their scalar multiples carry.
//!
//! # Core Components
//!
//! - **Operators**: [`Operator`] with terminals [`Pauli`] (I, X, Y, Z) and
//!   [`Ladder`] (a†, a, 1), composed by sum, difference, product within a
//!   register/mode, tensor product across registers/modes, and scalar multiple
//! - **Coefficients**: [`MathExpr`] with variables, real numbers, the imaginary
//!   unit, unary [`Function`]s and binary arithmetic
//! - **Evaluation**: [`Bindings`], [`MathExpr::evaluate`] and
//!   [`Operator::to_matrix`] for numeric spot checks
//!
//! Both trees are plain tagged records without cycles or external identity,
//! so they serialize directly with serde.
//!
//! # Example
//!
//! ```rust
//! use opal_ir::{Bindings, MathExpr, Operator};
//!
//! // Jaynes-Cummings style coupling: g·(σx ⊗ (a† + a))
//! let h = Operator::pauli_x().kron(Operator::creation() + Operator::annihilation())
//!     * MathExpr::var("g");
//!
//! let matrix = h.to_matrix(&Bindings::new().with("g", 0.5), 3).unwrap();
//! assert_eq!(matrix.shape(), &[6, 6]);
//! ```

pub mod error;
pub mod evaluate;
pub mod math;
pub mod operator;

pub use error::{IrError, IrResult};
pub use evaluate::{Bindings, MAX_DENSE_DIM};
pub use math::{Function, MathExpr};
pub use operator::{Ladder, Operator, Pauli};
