//! Canonical sort keys of additive terms.
//!
//! A [`TermIndex`] lists one [`Key`] per slot of a term: a Pauli register
//! contributes its generator index, a bosonic mode contributes the pair
//! (ladder count, creation count). For terms already distributed, Pauli
//! reduced, gathered and normal-ordered the key identifies the operator
//! content uniquely, so equal keys mean mergeable terms and key order is the
//! canonical term order. On other trees the key is well defined but
//! meaningless.

use serde::{Deserialize, Serialize};
use std::fmt;

use opal_ir::{Ladder, Operator};

use crate::error::CompileResult;
use crate::rule::{ConversionRule, Operands, convert};

/// Key of one register or mode slot.
///
/// Pauli keys order before ladder keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    /// Pauli generator index: I=0, X=1, Y=2, Z=3.
    Pauli(u8),
    /// Ladder factors and how many of them are creations.
    Ladder { ladders: u32, creations: u32 },
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Pauli(index) => write!(f, "{index}"),
            Key::Ladder { ladders, creations } => write!(f, "({ladders}, {creations})"),
        }
    }
}

/// Lexicographically ordered key of one term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermIndex(pub Vec<Key>);

impl TermIndex {
    /// Number of slots.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no slots.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TermIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}

/// Post-order conversion of a term into its [`TermIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TermIndexRule;

impl ConversionRule<Operator> for TermIndexRule {
    type Output = TermIndex;

    fn name(&self) -> &str {
        "term_index"
    }

    fn convert(&self, node: &Operator, mut operands: Operands<'_, TermIndex>) -> CompileResult<TermIndex> {
        match node {
            Operator::Pauli(p) => Ok(TermIndex(vec![Key::Pauli(p.index())])),
            Operator::Ladder(l) => {
                let (ladders, creations) = match l {
                    Ladder::Identity => (0, 0),
                    Ladder::Annihilation => (1, 0),
                    Ladder::Creation => (1, 1),
                };
                Ok(TermIndex(vec![Key::Ladder { ladders, creations }]))
            }
            Operator::ScalarMul(..) => operands.take("op"),
            Operator::Kron(..) => {
                let (TermIndex(mut left), TermIndex(right)) = operands.take_pair("op1", "op2")?;
                left.extend(right);
                Ok(TermIndex(left))
            }
            Operator::Mul(..) => {
                let (TermIndex(left), TermIndex(right)) = operands.take_pair("op1", "op2")?;
                if left.len() != right.len() {
                    return Err(self.unhandled(node));
                }
                left.into_iter()
                    .zip(right)
                    .map(|pair| match pair {
                        // Product up to phase: the index XOR is the Pauli product.
                        (Key::Pauli(a), Key::Pauli(b)) => Ok(Key::Pauli(a ^ b)),
                        (
                            Key::Ladder { ladders: l1, creations: c1 },
                            Key::Ladder { ladders: l2, creations: c2 },
                        ) => Ok(Key::Ladder {
                            ladders: l1 + l2,
                            creations: c1 + c2,
                        }),
                        _ => Err(self.unhandled(node)),
                    })
                    .collect::<CompileResult<Vec<_>>>()
                    .map(TermIndex)
            }
            Operator::Add(..) | Operator::Sub(..) => Err(self.unhandled(node)),
        }
    }
}

/// Canonical key of a single term.
pub fn term_index(op: &Operator) -> CompileResult<TermIndex> {
    convert(&TermIndexRule, op)
}

/// Terms of a left-nested sum, first to last.
pub fn terms(op: &Operator) -> Vec<&Operator> {
    let mut out = Vec::new();
    let mut current = op;
    while let Operator::Add(rest, last) = current {
        out.push(last.as_ref());
        current = rest.as_ref();
    }
    out.push(current);
    out.reverse();
    out
}

/// Keys of every term of a left-nested sum.
pub fn term_indices(op: &Operator) -> CompileResult<Vec<TermIndex>> {
    terms(op).into_iter().map(term_index).collect()
}
