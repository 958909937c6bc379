//! The canonicalization pipeline.
//!
//! Two flow graphs make up the compiler. The core graph rewrites an
//! operator into canonical form:
//!
//! ```text
//! distribute ─▶ gather_math_expr ─▶ proper_order ─▶ pauli_algebra ─▶ gather_pauli
//!     ▲   (any change goes back to distribute)          │ ▲               │
//!     └──────────────────────────────┘           tidy ◀─┘ └─ return   normal_order ⇄ tidy
//!                                                                         │
//!                 done ◀─ coefficients ◀─ sorted_order ◀─ scale_terms ◀─ prune_identity
//! ```
//!
//! Every stage that can introduce sums or nested scalars (Pauli algebra,
//! normal ordering) detours through `tidy`, a bounded fixed point of
//! distribution, scalar gathering and re-association, which returns to the
//! stage that called it.
//!
//! The compile graph wraps the core graph: it checks Hilbert-space
//! consistency, tries the canonical-form verifier on the input, and only on
//! a violation runs the core graph and verifies again. A violation that the
//! core graph cannot repair is re-raised.

use std::fmt;

use opal_ir::Operator;
use tracing::{info, instrument};

use crate::analysis::{VerifyHilbertSpace, terms};
use crate::combinator::{Chain, FixedPoint};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::flow::{FlowGraph, FlowResult, NodeId, Transition};
use crate::pass::Pass;
use crate::passes::{
    CanonicalFormVerifier, Coefficients, GatherMathExpr, GatherPauli, NormalOrder,
    OperatorDistribute, PauliAlgebra, ProperOrder, PruneIdentity, ScaleTerms, SortedOrder,
    SubstituteVars, math_pipeline,
};
use crate::walk::Walk;

/// Nodes of the core canonicalization graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoreStage {
    Distribute,
    GatherMathExpr,
    ProperOrder,
    PauliAlgebra,
    Tidy,
    GatherPauli,
    NormalOrder,
    PruneIdentity,
    ScaleTerms,
    SortedOrder,
    Coefficients,
    Done,
}

impl NodeId for CoreStage {
    fn name(&self) -> &'static str {
        match self {
            CoreStage::Distribute => "distribute",
            CoreStage::GatherMathExpr => "gather_math_expr",
            CoreStage::ProperOrder => "proper_order",
            CoreStage::PauliAlgebra => "pauli_algebra",
            CoreStage::Tidy => "tidy",
            CoreStage::GatherPauli => "gather_pauli",
            CoreStage::NormalOrder => "normal_order",
            CoreStage::PruneIdentity => "prune_identity",
            CoreStage::ScaleTerms => "scale_terms",
            CoreStage::SortedOrder => "sorted_order",
            CoreStage::Coefficients => "coefficients",
            CoreStage::Done => "done",
        }
    }
}

impl fmt::Display for CoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nodes of the compile graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    VerifyHilbertSpace,
    VerifyCanonicalForm,
    Canonicalize,
    Raise,
    Done,
}

impl NodeId for Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::VerifyHilbertSpace => "verify_hilbert_space",
            Stage::VerifyCanonicalForm => "verify_canonical_form",
            Stage::Canonicalize => "canonicalize",
            Stage::Raise => "raise",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Distribution, scalar gathering and re-association to a fixed point.
fn tidy(max_iter: usize) -> FixedPoint<Chain<Operator>> {
    FixedPoint::new(
        Chain::new("tidy")
            .then(Walk::post(OperatorDistribute))
            .then(Walk::post(GatherMathExpr))
            .then(Walk::post(ProperOrder)),
        max_iter,
    )
}

/// Build the core canonicalization graph.
pub fn core_graph(config: &CompilerConfig) -> CompileResult<FlowGraph<Operator, CoreStage>> {
    let max_iter = config.max_iter;
    FlowGraph::builder("canonicalize", CoreStage::Distribute)
        .max_steps(config.max_steps)
        .pass(
            CoreStage::Distribute,
            Walk::post(OperatorDistribute),
            Transition::forward_fixed_point(CoreStage::GatherMathExpr),
        )
        .pass(
            CoreStage::GatherMathExpr,
            Walk::post(GatherMathExpr),
            Transition::forward_detour(CoreStage::ProperOrder, CoreStage::Distribute),
        )
        .pass(
            CoreStage::ProperOrder,
            Walk::post(ProperOrder),
            Transition::forward_detour(CoreStage::PauliAlgebra, CoreStage::Distribute),
        )
        .pass(
            CoreStage::PauliAlgebra,
            Walk::post(PauliAlgebra),
            Transition::forward_detour(CoreStage::GatherPauli, CoreStage::Tidy),
        )
        .pass(CoreStage::Tidy, tidy(max_iter), Transition::forward_return())
        .pass(
            CoreStage::GatherPauli,
            Walk::post(GatherPauli),
            Transition::forward_fixed_point(CoreStage::NormalOrder),
        )
        .pass(
            CoreStage::NormalOrder,
            Walk::post(NormalOrder),
            Transition::forward_detour(CoreStage::PruneIdentity, CoreStage::Tidy),
        )
        .pass(
            CoreStage::PruneIdentity,
            Walk::post(PruneIdentity),
            Transition::forward_fixed_point(CoreStage::ScaleTerms),
        )
        .pass(
            CoreStage::ScaleTerms,
            ScaleTerms,
            Transition::forward_once(CoreStage::SortedOrder),
        )
        .pass(
            CoreStage::SortedOrder,
            SortedOrder,
            Transition::forward_once(CoreStage::Coefficients),
        )
        .pass(
            CoreStage::Coefficients,
            Walk::post(Coefficients::new(math_pipeline(max_iter))),
            Transition::forward_once(CoreStage::Done),
        )
        .terminal(CoreStage::Done)
        .build()
}

/// Build the compile graph around the core graph.
pub fn compile_graph(config: &CompilerConfig) -> CompileResult<FlowGraph<Operator, Stage>> {
    let root = if config.verify_input {
        Stage::VerifyHilbertSpace
    } else {
        Stage::VerifyCanonicalForm
    };
    let mut builder = FlowGraph::builder("compile", root).max_steps(config.max_steps);
    if config.verify_input {
        builder = builder.pass(
            Stage::VerifyHilbertSpace,
            VerifyHilbertSpace,
            Transition::forward_once(Stage::VerifyCanonicalForm),
        );
    }
    builder
        .pass(
            Stage::VerifyCanonicalForm,
            CanonicalFormVerifier::new(config.max_iter),
            Transition::forward_once(Stage::Done),
        )
        .catch_error(Stage::VerifyCanonicalForm, Stage::Canonicalize)
        .graph(
            Stage::Canonicalize,
            core_graph(config)?,
            Transition::forward_detour(Stage::Raise, Stage::VerifyCanonicalForm),
        )
        .reraise(Stage::Raise)
        .terminal(Stage::Done)
        .build()
}

/// The configured compiler.
///
/// Building the graphs is done once; a `Canonicalizer` can then be shared
/// across threads and reused for any number of operators.
pub struct Canonicalizer {
    config: CompilerConfig,
    graph: FlowGraph<Operator, Stage>,
}

impl fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canonicalizer")
            .field("config", &self.config)
            .field("nodes", &self.graph.len())
            .finish()
    }
}

impl Canonicalizer {
    /// A canonicalizer with the default configuration.
    pub fn new() -> CompileResult<Self> {
        Self::with_config(CompilerConfig::default())
    }

    /// A canonicalizer with the given configuration.
    pub fn with_config(config: CompilerConfig) -> CompileResult<Self> {
        if config.max_iter == 0 {
            return Err(CompileError::InvalidFlow(
                "max_iter must be at least 1".to_string(),
            ));
        }
        let graph = compile_graph(&config)?;
        Ok(Self { config, graph })
    }

    /// Start configuring a canonicalizer.
    pub fn builder() -> CanonicalizerBuilder {
        CanonicalizerBuilder::new()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The compile graph.
    pub fn graph(&self) -> &FlowGraph<Operator, Stage> {
        &self.graph
    }

    /// Rewrite `op` into canonical form.
    pub fn canonicalize(&self, op: &Operator) -> CompileResult<Operator> {
        Ok(self.canonicalize_traced(op)?.model)
    }

    /// Rewrite `op` into canonical form, keeping the traversal log.
    #[instrument(skip_all, fields(size = op.size()))]
    pub fn canonicalize_traced(&self, op: &Operator) -> CompileResult<FlowResult<Operator>> {
        info!("Canonicalizing operator with {} nodes", op.size());
        let result = self.graph.run_traced(op)?;
        info!(
            "Canonical form has {} terms after {} steps",
            terms(&result.model).len(),
            result.traversal.total_steps()
        );
        Ok(result)
    }

    /// Bind variables in every coefficient, then canonicalize.
    pub fn substitute(&self, op: &Operator, values: &SubstituteVars) -> CompileResult<Operator> {
        let bound = Walk::post(Coefficients::new(Walk::post(values.clone()))).run(op)?;
        self.canonicalize(&bound)
    }

    /// Check `op` against every canonical-form invariant.
    pub fn verify(&self, op: &Operator) -> CompileResult<()> {
        CanonicalFormVerifier::new(self.config.max_iter).check(op)
    }
}

/// Builder for [`Canonicalizer`].
#[derive(Debug, Clone, Default)]
pub struct CanonicalizerBuilder {
    config: CompilerConfig,
}

impl CanonicalizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound every fixed-point combinator.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Bound every flow graph run.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Enable or disable the up-front Hilbert-space check.
    #[must_use]
    pub fn verify_input(mut self, verify: bool) -> Self {
        self.config.verify_input = verify;
        self
    }

    pub fn build(self) -> CompileResult<Canonicalizer> {
        Canonicalizer::with_config(self.config)
    }
}

/// Rewrite `op` into canonical form with the default configuration.
#[instrument(skip_all)]
pub fn canonicalize(op: &Operator) -> CompileResult<Operator> {
    Canonicalizer::new()?.canonicalize(op)
}

/// Check `op` against every canonical-form invariant.
pub fn verify_canonical(op: &Operator) -> CompileResult<()> {
    CanonicalFormVerifier::new(CompilerConfig::default().max_iter).check(op)
}

/// Bind variables in every coefficient of `op` and canonicalize.
pub fn substitute(op: &Operator, values: &SubstituteVars) -> CompileResult<Operator> {
    Canonicalizer::new()?.substitute(op, values)
}
