//! Flow graphs: state machines that schedule passes.
//!
//! A [`FlowGraph`] is a set of named nodes, each running a pass, an
//! emitter or a nested graph, wired together by [`Transition`]s that look
//! at the result of the node:
//!
//! | Transition | Successor |
//! |------------|-----------|
//! | `Once` | always `done` |
//! | `FixedPoint` | the node itself while the model changes, then `done` |
//! | `Detour` | `detour` if the model changed, `done` otherwise |
//! | `Branch` | looked up by an emitted signal value |
//! | `Return` | the node that ran before this one was entered |
//!
//! A node may additionally [`Catch`] recoverable errors and redirect them;
//! a `Reraise` node later surfaces the caught error. Every run yields a
//! [`Traversal`] recording each step, so the sequence of rewrites that
//! produced a result can be inspected afterwards.
//!
//! # Example
//!
//! ```rust
//! use opal_compile::flow::{FlowGraph, NodeId, Transition};
//! use opal_compile::passes::math_pipeline;
//! use opal_ir::MathExpr;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
//! enum Id { Simplify, Done }
//!
//! impl NodeId for Id {
//!     fn name(&self) -> &'static str {
//!         match self {
//!             Id::Simplify => "simplify",
//!             Id::Done => "done",
//!         }
//!     }
//! }
//!
//! let graph = FlowGraph::builder("coefficients", Id::Simplify)
//!     .pass(Id::Simplify, math_pipeline(100), Transition::forward_once(Id::Done))
//!     .terminal(Id::Done)
//!     .build()
//!     .unwrap();
//!
//! let result = graph.run_traced(&(MathExpr::num(2.0) + MathExpr::num(3.0))).unwrap();
//! assert_eq!(result.model, MathExpr::num(5.0));
//! assert_eq!(result.traversal.path(), vec!["simplify", "done"]);
//! ```

mod graph;
mod transition;
mod traversal;

use std::fmt;
use std::hash::Hash;

use crate::error::CompileResult;

pub use graph::{FlowGraph, FlowGraphBuilder, Node};
pub use transition::{Catch, Transition};
pub use traversal::{Emission, Emitter, FlowOut, FlowResult, Traversal, TraversalSite};

/// Identifier of a flow graph node.
///
/// Usually a fieldless enum; the name appears in logs, traversals and DOT
/// output.
pub trait NodeId: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &'static str;
}

/// Anything that runs a model to completion and logs how.
pub trait Flow<T>: Send + Sync {
    /// Name of this flow.
    fn name(&self) -> &str;

    /// Run on `model`.
    fn execute(&self, model: &T) -> CompileResult<FlowResult<T>>;
}
