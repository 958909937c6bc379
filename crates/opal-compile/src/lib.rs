//! Opal Canonicalization Framework
//!
//! This crate rewrites symbolic quantum operators into a unique canonical
//! form, so that algebraically equal operators compare equal structurally.
//! It is built as a small term-rewriting compiler: local rules, traversal
//! strategies that apply them, combinators that repeat them to a fixed
//! point, and flow graphs that schedule the resulting passes.
//!
//! # Architecture
//!
//! ```text
//! Input Operator
//!       │
//!       ▼
//! ┌──────────────┐
//! │ compile graph │ ◄── CompilerConfig (max_iter, max_steps, verify_input)
//! └──────────────┘
//!       │
//!       ├── VerifyHilbertSpace
//!       ├── CanonicalFormVerifier ──(violation)──▶ core graph ──▶ verify again
//!       │
//!       │   core graph:
//!       ├── OperatorDistribute / GatherMathExpr / ProperOrder
//!       ├── PauliAlgebra / GatherPauli
//!       ├── NormalOrder / PruneIdentity
//!       └── ScaleTerms / SortedOrder / coefficient canonicalization
//!       │
//!       ▼
//! Canonical Operator
//! ```
//!
//! # Example
//!
//! ```rust
//! use opal_compile::{canonicalize, term_indices};
//! use opal_ir::{MathExpr, Operator};
//!
//! // X·Y = iZ
//! let xy = canonicalize(&(Operator::pauli_x() * Operator::pauli_y())).unwrap();
//! assert_eq!(xy, Operator::pauli_z().scale(MathExpr::imag()));
//!
//! // 2·(X⊗I) + 3·(I⊗X) sorts by term key and is a fixed point.
//! let h = Operator::pauli_x().kron(Operator::pauli_i()) * 2.0
//!     + Operator::pauli_i().kron(Operator::pauli_x()) * 3.0;
//! let once = canonicalize(&h).unwrap();
//! assert_eq!(canonicalize(&once).unwrap(), once);
//! assert_eq!(term_indices(&once).unwrap().len(), 2);
//! ```
//!
//! # Building Blocks
//!
//! ## Rules
//! - [`Transformer`]: local rewrite returning a replacement node
//! - [`Visitor`]: read-only analysis with per-walk state
//! - [`ConversionRule`]: bottom-up translation into another representation
//!
//! ## Strategies and Combinators
//! - [`Walk`] with [`Order`]: pre-, post-, level- and in-order application
//! - [`Chain`], [`FixedPoint`]: sequencing and repetition of passes
//!
//! ## Scheduling
//! - [`flow::FlowGraph`]: state machine over passes with fixed-point,
//!   detour, branch, return and error-redirect transitions
//!
//! # Custom Passes
//!
//! Implement [`Transformer`] and wrap it in a [`Walk`]:
//!
//! ```rust
//! use opal_compile::{CompileResult, Pass, Transformer, Walk};
//! use opal_ir::{Operator, Pauli};
//!
//! struct SwapXZ;
//!
//! impl Transformer<Operator> for SwapXZ {
//!     fn name(&self) -> &str { "swap_xz" }
//!
//!     fn map(&self, node: &Operator) -> CompileResult<Option<Operator>> {
//!         Ok(match node {
//!             Operator::Pauli(Pauli::X) => Some(Operator::pauli_z()),
//!             Operator::Pauli(Pauli::Z) => Some(Operator::pauli_x()),
//!             _ => None,
//!         })
//!     }
//! }
//!
//! let swapped = Walk::post(SwapXZ).run(&Operator::pauli_x().kron(Operator::pauli_z())).unwrap();
//! assert_eq!(swapped, Operator::pauli_z().kron(Operator::pauli_x()));
//! ```

pub mod analysis;
pub mod combinator;
pub mod config;
pub mod error;
pub mod flow;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod rule;
pub mod tree;
pub mod walk;

pub use analysis::{
    HilbertSpace, Key, TermIndex, hilbert_space_dims, term_index, term_indices, term_shapes,
};
pub use combinator::{Chain, FixedPoint};
pub use config::{CompilerConfig, ConfigError};
pub use error::{CanonicalFormError, CompileError, CompileResult};
pub use pass::{Pass, PassKind};
pub use pipeline::{
    Canonicalizer, CanonicalizerBuilder, CoreStage, Stage, canonicalize, compile_graph,
    core_graph, substitute, verify_canonical,
};
pub use rule::{ConversionRule, Operands, Transformer, Visitor};
pub use tree::Tree;
pub use walk::{Order, Walk};
