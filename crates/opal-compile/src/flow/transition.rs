//! Transition functions of flow graph nodes.

use std::collections::BTreeMap;

/// Where to go after a node ran successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<N> {
    /// Go to `done` unconditionally.
    Once { done: N },
    /// Repeat the node until the model stops changing, then go to `done`.
    FixedPoint { done: N },
    /// Go to `done` if the model is unchanged, to `detour` otherwise.
    Detour { done: N, detour: N },
    /// Pick the successor by the value of an emitted signal.
    Branch {
        key: String,
        branches: BTreeMap<String, N>,
        default: Option<N>,
    },
    /// Resume at the node that ran before this node was entered.
    Return,
}

impl<N: Copy> Transition<N> {
    pub fn forward_once(done: N) -> Self {
        Transition::Once { done }
    }

    pub fn forward_fixed_point(done: N) -> Self {
        Transition::FixedPoint { done }
    }

    pub fn forward_detour(done: N, detour: N) -> Self {
        Transition::Detour { done, detour }
    }

    pub fn forward_branch_from_emission<K: Into<String>>(
        key: impl Into<String>,
        branches: impl IntoIterator<Item = (K, N)>,
    ) -> Self {
        Transition::Branch {
            key: key.into(),
            branches: branches.into_iter().map(|(k, n)| (k.into(), n)).collect(),
            default: None,
        }
    }

    pub fn forward_return() -> Self {
        Transition::Return
    }

    /// Fallback successor of a branch for unlisted signal values.
    #[must_use]
    pub fn or_else(self, fallback: N) -> Self {
        match self {
            Transition::Branch { key, branches, .. } => Transition::Branch {
                key,
                branches,
                default: Some(fallback),
            },
            other => other,
        }
    }

    /// Every node this transition can lead to statically.
    pub fn targets(&self) -> Vec<(N, String)> {
        match self {
            Transition::Once { done } => vec![(*done, "done".to_string())],
            Transition::FixedPoint { done } => vec![(*done, "done".to_string())],
            Transition::Detour { done, detour } => vec![
                (*done, "done".to_string()),
                (*detour, "detour".to_string()),
            ],
            Transition::Branch {
                key,
                branches,
                default,
            } => branches
                .iter()
                .map(|(value, n)| (*n, format!("{key}={value}")))
                .chain(default.iter().map(|n| (*n, format!("{key}=*"))))
                .collect(),
            Transition::Return => vec![],
        }
    }

    /// Whether the node may loop on itself.
    pub fn loops(&self) -> bool {
        matches!(self, Transition::FixedPoint { .. })
    }
}

/// Error interception around a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Catch<N> {
    /// Redirect every recoverable error to one node.
    Redirect(N),
    /// Redirect by [`CompileError::kind`](crate::error::CompileError::kind);
    /// unlisted kinds go to `default` or propagate.
    Branch {
        by_kind: BTreeMap<&'static str, N>,
        default: Option<N>,
    },
}

impl<N: Copy> Catch<N> {
    /// Target for an error of the given kind.
    pub fn target(&self, kind: &str) -> Option<N> {
        match self {
            Catch::Redirect(n) => Some(*n),
            Catch::Branch { by_kind, default } => by_kind.get(kind).copied().or(*default),
        }
    }

    /// Every node this catch can lead to.
    pub fn targets(&self) -> Vec<(N, String)> {
        match self {
            Catch::Redirect(n) => vec![(*n, "catch".to_string())],
            Catch::Branch { by_kind, default } => by_kind
                .iter()
                .map(|(kind, n)| (*n, format!("catch:{kind}")))
                .chain(default.iter().map(|n| (*n, "catch:*".to_string())))
                .collect(),
        }
    }
}
