//! Execution records of flow graphs.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{CompileError, CompileResult};

/// Out-of-band signal of one node invocation.
///
/// Nodes emit string-keyed signals for branching; a caught error is stored
/// alongside so it stays inspectable and can be re-raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Emission {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub signals: BTreeMap<String, String>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<CompileError>,
}

fn serialize_error<S: Serializer>(error: &Option<CompileError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl Emission {
    /// An emission without signals.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a signal.
    #[must_use]
    pub fn with_signal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.signals.insert(key.into(), value.into());
        self
    }

    /// An emission carrying a caught error.
    pub fn caught(error: CompileError) -> Self {
        Self {
            signals: BTreeMap::new(),
            error: Some(error),
        }
    }

    /// Look up a signal.
    pub fn signal(&self, key: &str) -> Option<&str> {
        self.signals.get(key).map(String::as_str)
    }
}

/// Result of invoking one node: the (possibly rewritten) model and its
/// emission.
#[derive(Debug, Clone)]
pub struct FlowOut<T> {
    pub model: T,
    pub emission: Emission,
}

impl<T> FlowOut<T> {
    pub fn new(model: T, emission: Emission) -> Self {
        Self { model, emission }
    }
}

/// A node that emits signals for its successor to branch on.
pub trait Emitter<T>: Send + Sync {
    /// Name of this emitter.
    fn name(&self) -> &str;

    /// Inspect or rewrite the model and emit signals.
    fn emit(&self, model: &T) -> CompileResult<FlowOut<T>>;
}

/// One executed step.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalSite<T> {
    /// Name of the executed node.
    pub node: &'static str,
    /// Signals emitted by the node.
    pub emission: Emission,
    /// Model after the node ran.
    pub model: T,
    /// Log of a nested graph node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<Traversal<T>>,
}

/// Append-only execution log of one flow graph run.
#[derive(Debug, Clone, Serialize)]
pub struct Traversal<T> {
    /// Name of the graph.
    pub graph: String,
    /// Executed steps, in order.
    pub sites: Vec<TraversalSite<T>>,
}

impl<T> Traversal<T> {
    pub fn new(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            sites: Vec::new(),
        }
    }

    /// Get the number of recorded steps.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Check if no step was recorded.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Names of the executed nodes, in order.
    pub fn path(&self) -> Vec<&'static str> {
        self.sites.iter().map(|s| s.node).collect()
    }

    /// Number of steps including those of nested graphs.
    pub fn total_steps(&self) -> usize {
        self.sites
            .iter()
            .map(|s| 1 + s.sub.as_ref().map_or(0, Traversal::total_steps))
            .sum()
    }
}

/// Final model of a flow graph run together with its log.
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult<T> {
    pub model: T,
    pub traversal: Traversal<T>,
}
