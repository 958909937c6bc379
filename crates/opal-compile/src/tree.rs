//! Uniform view over the expression trees the compiler rewrites.
//!
//! Rules dispatch on node variants with exhaustive `match`es. What the
//! traversal machinery needs beyond that is the same for every tree: a tag
//! for diagnostics, the ordered named children, and a way to rebuild a node
//! around new children. [`Tree`] provides exactly that for [`Operator`] and
//! [`MathExpr`].

use std::fmt;
use std::sync::Arc;

use opal_ir::{MathExpr, Operator};

/// A tagged, immutable tree with reference-counted children.
pub trait Tree: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Name of the node variant.
    fn tag(&self) -> &'static str;

    /// Children in evaluation order, each with its operand name.
    fn children(&self) -> Vec<(&'static str, &Arc<Self>)>;

    /// Rebuild this node with replacement children.
    ///
    /// `children` is consumed in the order of [`Tree::children`]; missing
    /// entries keep the original child.
    #[must_use]
    fn with_children(&self, children: Vec<Arc<Self>>) -> Self;
}

impl Tree for Operator {
    fn tag(&self) -> &'static str {
        match self {
            Operator::Pauli(_) => "Pauli",
            Operator::Ladder(_) => "Ladder",
            Operator::Add(..) => "Add",
            Operator::Sub(..) => "Sub",
            Operator::Mul(..) => "Mul",
            Operator::Kron(..) => "Kron",
            Operator::ScalarMul(..) => "ScalarMul",
        }
    }

    fn children(&self) -> Vec<(&'static str, &Arc<Self>)> {
        match self {
            Operator::Pauli(_) | Operator::Ladder(_) => vec![],
            Operator::ScalarMul(op, _) => vec![("op", op)],
            Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) | Operator::Kron(a, b) => {
                vec![("op1", a), ("op2", b)]
            }
        }
    }

    fn with_children(&self, children: Vec<Arc<Self>>) -> Self {
        let mut it = children.into_iter();
        let mut next = |old: &Arc<Self>| it.next().unwrap_or_else(|| Arc::clone(old));
        match self {
            Operator::Pauli(_) | Operator::Ladder(_) => self.clone(),
            Operator::ScalarMul(op, coeff) => Operator::ScalarMul(next(op), coeff.clone()),
            Operator::Add(a, b) => Operator::Add(next(a), next(b)),
            Operator::Sub(a, b) => Operator::Sub(next(a), next(b)),
            Operator::Mul(a, b) => Operator::Mul(next(a), next(b)),
            Operator::Kron(a, b) => Operator::Kron(next(a), next(b)),
        }
    }
}

impl Tree for MathExpr {
    fn tag(&self) -> &'static str {
        match self {
            MathExpr::Var(_) => "Var",
            MathExpr::Num(_) => "Num",
            MathExpr::Imag => "Imag",
            MathExpr::Func(..) => "Func",
            MathExpr::Add(..) => "Add",
            MathExpr::Sub(..) => "Sub",
            MathExpr::Mul(..) => "Mul",
            MathExpr::Div(..) => "Div",
            MathExpr::Pow(..) => "Pow",
        }
    }

    fn children(&self) -> Vec<(&'static str, &Arc<Self>)> {
        match self {
            MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag => vec![],
            MathExpr::Func(_, arg) => vec![("expr", arg)],
            MathExpr::Add(a, b)
            | MathExpr::Sub(a, b)
            | MathExpr::Mul(a, b)
            | MathExpr::Div(a, b)
            | MathExpr::Pow(a, b) => vec![("expr1", a), ("expr2", b)],
        }
    }

    fn with_children(&self, children: Vec<Arc<Self>>) -> Self {
        let mut it = children.into_iter();
        let mut next = |old: &Arc<Self>| it.next().unwrap_or_else(|| Arc::clone(old));
        match self {
            MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag => self.clone(),
            MathExpr::Func(func, arg) => MathExpr::Func(*func, next(arg)),
            MathExpr::Add(a, b) => MathExpr::Add(next(a), next(b)),
            MathExpr::Sub(a, b) => MathExpr::Sub(next(a), next(b)),
            MathExpr::Mul(a, b) => MathExpr::Mul(next(a), next(b)),
            MathExpr::Div(a, b) => MathExpr::Div(next(a), next(b)),
            MathExpr::Pow(a, b) => MathExpr::Pow(next(a), next(b)),
        }
    }
}
