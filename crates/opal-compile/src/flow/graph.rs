//! Flow graph definition and executor.

use std::collections::BTreeMap;

use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};

use super::transition::{Catch, Transition};
use super::traversal::{Emission, Emitter, FlowResult, Traversal, TraversalSite};
use super::{Flow, NodeId};

/// What a flow graph node does when it is reached.
pub enum Node<T> {
    /// Stop and return the current model.
    Terminal,
    /// Run a pass.
    Pass(Box<dyn Pass<T>>),
    /// Run an emitter, whose signals drive a branch.
    Emit(Box<dyn Emitter<T>>),
    /// Run a nested graph to completion.
    Graph(Box<dyn Flow<T>>),
    /// Fail with the most recently caught error.
    Reraise,
}

impl<T> Node<T> {
    fn label(&self) -> &'static str {
        match self {
            Node::Terminal => "terminal",
            Node::Pass(_) => "pass",
            Node::Emit(_) => "emit",
            Node::Graph(_) => "graph",
            Node::Reraise => "reraise",
        }
    }
}

struct NodeEntry<T, N> {
    node: Node<T>,
    transition: Option<Transition<N>>,
    catch: Option<Catch<N>>,
}

impl<T, N> NodeEntry<T, N> {
    fn is_exit(&self) -> bool {
        matches!(self.node, Node::Terminal | Node::Reraise)
            || matches!(self.transition, Some(Transition::Return))
    }
}

/// A typed state machine scheduling passes over a model.
///
/// Each step runs the current node, records a [`TraversalSite`] and moves
/// to the node chosen by the node's [`Transition`], or by its [`Catch`]
/// when the node failed with a recoverable error. Reaching a terminal
/// node ends the run; exceeding `max_steps` is a
/// [`CompileError::NonTermination`].
pub struct FlowGraph<T, N: NodeId> {
    name: String,
    root: N,
    max_steps: usize,
    nodes: BTreeMap<N, NodeEntry<T, N>>,
}

impl<T, N> FlowGraph<T, N>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    N: NodeId,
{
    /// Start defining a graph.
    pub fn builder(name: impl Into<String>, root: N) -> FlowGraphBuilder<T, N> {
        FlowGraphBuilder {
            name: name.into(),
            root,
            max_steps: 10_000,
            nodes: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    /// The root node.
    pub fn root(&self) -> N {
        self.root
    }

    /// The step bound.
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node identifiers, in identifier order.
    pub fn node_ids(&self) -> impl Iterator<Item = N> + '_ {
        self.nodes.keys().copied()
    }

    /// Run the graph to completion.
    pub fn run_traced(&self, model: &T) -> CompileResult<FlowResult<T>> {
        let mut traversal = Traversal::new(self.name.clone());
        let mut model = model.clone();
        let mut current = self.root;
        let mut history: Vec<N> = Vec::new();
        let mut last_error: Option<CompileError> = None;

        for _ in 0..self.max_steps {
            let entry = self.entry(current)?;
            let outcome = match &entry.node {
                Node::Terminal => {
                    debug!("{}: reached {}", self.name, current.name());
                    traversal.sites.push(TraversalSite {
                        node: current.name(),
                        emission: Emission::none(),
                        model: model.clone(),
                        sub: None,
                    });
                    return Ok(FlowResult { model, traversal });
                }
                Node::Pass(pass) => pass.run(&model).map(|m| (m, Emission::none(), None)),
                Node::Emit(emitter) => emitter
                    .emit(&model)
                    .map(|out| (out.model, out.emission, None)),
                Node::Graph(flow) => flow
                    .execute(&model)
                    .map(|r| (r.model, Emission::none(), Some(r.traversal))),
                Node::Reraise => Err(last_error.clone().unwrap_or_else(|| {
                    CompileError::InvalidFlow(format!(
                        "node '{}' has no caught error to re-raise",
                        current.name()
                    ))
                })),
            };

            let next = match outcome {
                Ok((new_model, emission, sub)) => {
                    let changed = new_model != model;
                    let transition = entry.transition.as_ref().ok_or_else(|| {
                        CompileError::InvalidFlow(format!(
                            "node '{}' has no transition",
                            current.name()
                        ))
                    })?;
                    let next = Self::resolve(current, transition, changed, &emission, &history)?;
                    debug!(
                        "{}: {} ({}) -> {}",
                        self.name,
                        current.name(),
                        if changed { "changed" } else { "unchanged" },
                        next.name()
                    );
                    traversal.sites.push(TraversalSite {
                        node: current.name(),
                        emission,
                        model: new_model.clone(),
                        sub,
                    });
                    model = new_model;
                    next
                }
                Err(err) => {
                    let target = entry
                        .catch
                        .as_ref()
                        .filter(|_| err.is_recoverable())
                        .and_then(|c| c.target(err.kind()));
                    let Some(target) = target else {
                        return Err(err);
                    };
                    warn!(
                        "{}: {} failed ({}), redirecting to {}",
                        self.name,
                        current.name(),
                        err,
                        target.name()
                    );
                    traversal.sites.push(TraversalSite {
                        node: current.name(),
                        emission: Emission::caught(err.clone()),
                        model: model.clone(),
                        sub: None,
                    });
                    last_error = Some(err);
                    target
                }
            };
            history.push(current);
            current = next;
        }

        Err(CompileError::NonTermination {
            name: self.name.clone(),
            limit: self.max_steps,
        })
    }

    fn entry(&self, id: N) -> CompileResult<&NodeEntry<T, N>> {
        self.nodes
            .get(&id)
            .ok_or_else(|| CompileError::InvalidFlow(format!("unknown node '{}'", id.name())))
    }

    fn resolve(
        current: N,
        transition: &Transition<N>,
        changed: bool,
        emission: &Emission,
        history: &[N],
    ) -> CompileResult<N> {
        match transition {
            Transition::Once { done } => Ok(*done),
            Transition::FixedPoint { done } => Ok(if changed { current } else { *done }),
            Transition::Detour { done, detour } => Ok(if changed { *detour } else { *done }),
            Transition::Branch {
                key,
                branches,
                default,
            } => {
                let value = emission.signal(key);
                value
                    .and_then(|v| branches.get(v).copied())
                    .or(*default)
                    .ok_or_else(|| {
                        CompileError::InvalidFlow(format!(
                            "node '{}' emitted {:?} for '{key}', which has no branch",
                            current.name(),
                            value
                        ))
                    })
            }
            Transition::Return => history
                .iter()
                .rev()
                .find(|n| **n != current)
                .copied()
                .ok_or_else(|| {
                    CompileError::InvalidFlow(format!(
                        "node '{}' has no caller to return to",
                        current.name()
                    ))
                }),
        }
    }

    /// Static transition graph; runtime `Return` edges are not shown.
    fn topology(&self) -> (DiGraph<String, String>, FxHashMap<N, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = FxHashMap::default();
        for (id, entry) in &self.nodes {
            let label = match (&entry.node, &entry.transition) {
                (_, Some(Transition::Return)) => format!("{} [{}, return]", id.name(), entry.node.label()),
                (node, _) => format!("{} [{}]", id.name(), node.label()),
            };
            index.insert(*id, graph.add_node(label));
        }
        for (id, entry) in &self.nodes {
            let from = index[id];
            let mut edges = Vec::new();
            if let Some(transition) = &entry.transition {
                edges.extend(transition.targets());
                if transition.loops() {
                    edges.push((*id, "loop".to_string()));
                }
            }
            if let Some(catch) = &entry.catch {
                edges.extend(catch.targets());
            }
            for (to, label) in edges {
                if let Some(&to) = index.get(&to) {
                    graph.add_edge(from, to, label);
                }
            }
        }
        (graph, index)
    }

    /// Graphviz rendering of the transition graph.
    pub fn to_dot(&self) -> String {
        let (graph, _) = self.topology();
        format!("{}", Dot::new(&graph))
    }
}

impl<T, N> Flow<T> for FlowGraph<T, N>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    N: NodeId,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, model: &T) -> CompileResult<FlowResult<T>> {
        self.run_traced(model)
    }
}

impl<T, N> Pass<T> for FlowGraph<T, N>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    N: NodeId,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, tree: &T) -> CompileResult<T> {
        Ok(self.run_traced(tree)?.model)
    }
}

/// Builder for [`FlowGraph`]s.
pub struct FlowGraphBuilder<T, N> {
    name: String,
    root: N,
    max_steps: usize,
    nodes: BTreeMap<N, NodeEntry<T, N>>,
    problems: Vec<String>,
}

impl<T, N> FlowGraphBuilder<T, N>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    N: NodeId,
{
    /// Set the step bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn insert(mut self, id: N, node: Node<T>, transition: Option<Transition<N>>) -> Self {
        let entry = NodeEntry {
            node,
            transition,
            catch: None,
        };
        if self.nodes.insert(id, entry).is_some() {
            self.problems.push(format!("node '{}' defined twice", id.name()));
        }
        self
    }

    /// Add a pass node.
    #[must_use]
    pub fn pass(self, id: N, pass: impl Pass<T> + 'static, transition: Transition<N>) -> Self {
        self.insert(id, Node::Pass(Box::new(pass)), Some(transition))
    }

    /// Add an emitter node.
    #[must_use]
    pub fn emitter(
        self,
        id: N,
        emitter: impl Emitter<T> + 'static,
        transition: Transition<N>,
    ) -> Self {
        self.insert(id, Node::Emit(Box::new(emitter)), Some(transition))
    }

    /// Add a nested graph node.
    #[must_use]
    pub fn graph(self, id: N, flow: impl Flow<T> + 'static, transition: Transition<N>) -> Self {
        self.insert(id, Node::Graph(Box::new(flow)), Some(transition))
    }

    /// Add a terminal node.
    #[must_use]
    pub fn terminal(self, id: N) -> Self {
        self.insert(id, Node::Terminal, None)
    }

    /// Add a node re-raising the last caught error.
    #[must_use]
    pub fn reraise(self, id: N) -> Self {
        self.insert(id, Node::Reraise, None)
    }

    fn set_catch(mut self, id: N, catch: Catch<N>) -> Self {
        match self.nodes.get_mut(&id) {
            Some(entry) => entry.catch = Some(catch),
            None => self
                .problems
                .push(format!("catch on undefined node '{}'", id.name())),
        }
        self
    }

    /// Redirect recoverable errors of `id` to `redirect`.
    #[must_use]
    pub fn catch_error(self, id: N, redirect: N) -> Self {
        self.set_catch(id, Catch::Redirect(redirect))
    }

    /// Redirect recoverable errors of `id` by error kind.
    #[must_use]
    pub fn catch_errors_and_branch(
        self,
        id: N,
        by_kind: impl IntoIterator<Item = (&'static str, N)>,
        default: Option<N>,
    ) -> Self {
        let by_kind = by_kind.into_iter().collect();
        self.set_catch(id, Catch::Branch { by_kind, default })
    }

    /// Validate and build the graph.
    pub fn build(self) -> CompileResult<FlowGraph<T, N>> {
        let invalid = |msg: String| CompileError::InvalidFlow(format!("{}: {msg}", self.name));

        if let Some(problem) = self.problems.first() {
            return Err(invalid(problem.clone()));
        }
        if self.max_steps == 0 {
            return Err(invalid("max_steps must be at least 1".to_string()));
        }
        if !self.nodes.contains_key(&self.root) {
            return Err(invalid(format!("root '{}' is not defined", self.root.name())));
        }
        for (id, entry) in &self.nodes {
            let needs_transition = !matches!(entry.node, Node::Terminal | Node::Reraise);
            if needs_transition && entry.transition.is_none() {
                return Err(invalid(format!("node '{}' has no transition", id.name())));
            }
            let targets = entry
                .transition
                .iter()
                .flat_map(Transition::targets)
                .chain(entry.catch.iter().flat_map(Catch::targets));
            for (target, _) in targets {
                if !self.nodes.contains_key(&target) {
                    return Err(invalid(format!(
                        "node '{}' leads to undefined node '{}'",
                        id.name(),
                        target.name()
                    )));
                }
            }
        }

        let graph = FlowGraph {
            name: self.name,
            root: self.root,
            max_steps: self.max_steps,
            nodes: self.nodes,
        };

        let (topology, index) = graph.topology();
        let ids: FxHashMap<NodeIndex, N> = index.iter().map(|(id, ix)| (*ix, *id)).collect();
        let mut dfs = Dfs::new(&topology, index[&graph.root]);
        let mut has_exit = false;
        while let Some(ix) = dfs.next(&topology) {
            if graph.nodes[&ids[&ix]].is_exit() {
                has_exit = true;
                break;
            }
        }
        if !has_exit {
            return Err(CompileError::InvalidFlow(format!(
                "{}: no terminal, re-raise or return reachable from '{}'",
                graph.name,
                graph.root.name()
            )));
        }

        Ok(graph)
    }
}
