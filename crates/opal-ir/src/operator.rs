//! Operator expression trees.
//!
//! An [`Operator`] is built from Pauli and bosonic ladder terminals with sums,
//! products within one register or mode (`Mul`), tensor products across
//! registers and modes (`Kron`), and scalar multiples carrying a
//! [`MathExpr`] coefficient.
//!
//! Trees are immutable. Children are reference counted so a rewrite can share
//! every untouched subtree with the tree it was derived from.
//!
//! # Example
//!
//! ```rust
//! use opal_ir::{MathExpr, Operator};
//!
//! // H = 0.5·(X ⊗ X) + J·(Z ⊗ a†a)
//! let h = (Operator::pauli_x().kron(Operator::pauli_x())) * 0.5
//!     + (Operator::pauli_z().kron(Operator::creation() * Operator::annihilation()))
//!         * MathExpr::var("J");
//! assert_eq!(h.size(), 11);
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::math::MathExpr;

/// Single-register Pauli generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pauli {
    /// Identity on one qubit register.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
}

impl Pauli {
    /// Index used by canonical term keys: I=0, X=1, Y=2, Z=3.
    pub fn index(self) -> u8 {
        match self {
            Pauli::I => 0,
            Pauli::X => 1,
            Pauli::Y => 2,
            Pauli::Z => 3,
        }
    }
}

/// Single-mode bosonic ladder generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ladder {
    /// Identity on one bosonic mode.
    Identity,
    /// Creation operator a†.
    Creation,
    /// Annihilation operator a.
    Annihilation,
}

/// A symbolic quantum operator.
///
/// Equality, dropping, [`Operator::size`] and printing of left-nested chains
/// use explicit stacks, so sums with tens of thousands of terms are fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operator {
    /// Pauli terminal.
    Pauli(Pauli),
    /// Ladder terminal.
    Ladder(Ladder),
    /// Sum of two operators.
    Add(Arc<Operator>, Arc<Operator>),
    /// Difference of two operators.
    Sub(Arc<Operator>, Arc<Operator>),
    /// Operator product on the same registers and modes.
    Mul(Arc<Operator>, Arc<Operator>),
    /// Tensor product across registers and modes.
    Kron(Arc<Operator>, Arc<Operator>),
    /// Scalar multiple.
    ScalarMul(Arc<Operator>, MathExpr),
}

impl Operator {
    /// Pauli identity.
    pub fn pauli_i() -> Self {
        Operator::Pauli(Pauli::I)
    }

    /// Pauli-X.
    pub fn pauli_x() -> Self {
        Operator::Pauli(Pauli::X)
    }

    /// Pauli-Y.
    pub fn pauli_y() -> Self {
        Operator::Pauli(Pauli::Y)
    }

    /// Pauli-Z.
    pub fn pauli_z() -> Self {
        Operator::Pauli(Pauli::Z)
    }

    /// Creation operator a†.
    pub fn creation() -> Self {
        Operator::Ladder(Ladder::Creation)
    }

    /// Annihilation operator a.
    pub fn annihilation() -> Self {
        Operator::Ladder(Ladder::Annihilation)
    }

    /// Ladder identity.
    pub fn identity() -> Self {
        Operator::Ladder(Ladder::Identity)
    }

    /// Tensor product `self ⊗ rhs`.
    #[must_use]
    pub fn kron(self, rhs: Operator) -> Self {
        Operator::Kron(Arc::new(self), Arc::new(rhs))
    }

    /// Scalar multiple `coeff · self`.
    #[must_use]
    pub fn scale(self, coeff: impl Into<MathExpr>) -> Self {
        Operator::ScalarMul(Arc::new(self), coeff.into())
    }

    /// True for Pauli and ladder terminals.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Operator::Pauli(_) | Operator::Ladder(_))
    }

    /// True for Pauli terminals.
    pub fn is_pauli(&self) -> bool {
        matches!(self, Operator::Pauli(_))
    }

    /// True for ladder terminals.
    pub fn is_ladder(&self) -> bool {
        matches!(self, Operator::Ladder(_))
    }

    /// Number of operator nodes in the tree (coefficients not counted).
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            match node {
                Operator::Pauli(_) | Operator::Ladder(_) => {}
                Operator::ScalarMul(op, _) => pending.push(op),
                Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) | Operator::Kron(a, b) => {
                    pending.push(a);
                    pending.push(b);
                }
            }
        }
        count
    }

    /// Operands of a binary node.
    fn operands(&self) -> Option<(&Arc<Operator>, &Arc<Operator>)> {
        match self {
            Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) | Operator::Kron(a, b) => {
                Some((a, b))
            }
            Operator::Pauli(_) | Operator::Ladder(_) | Operator::ScalarMul(..) => None,
        }
    }

    /// Move every non-terminal child into `out`, leaving a shared placeholder.
    fn detach_children(&mut self, out: &mut Vec<Arc<Operator>>) {
        let mut detach = |slot: &mut Arc<Operator>| {
            if !slot.is_terminal() {
                out.push(std::mem::replace(slot, Arc::clone(&PLACEHOLDER)));
            }
        };
        match self {
            Operator::Pauli(_) | Operator::Ladder(_) => {}
            Operator::ScalarMul(op, _) => detach(op),
            Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) | Operator::Kron(a, b) => {
                detach(a);
                detach(b);
            }
        }
    }

    /// Binding strength used when printing without redundant parentheses.
    fn precedence(&self) -> u8 {
        match self {
            Operator::Add(..) | Operator::Sub(..) => 1,
            Operator::ScalarMul(..) => 2,
            Operator::Kron(..) => 3,
            Operator::Mul(..) => 4,
            Operator::Pauli(_) | Operator::Ladder(_) => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        let own = self.precedence();
        // Right-nested chains keep their parentheses so association stays visible.
        if own < parent || (right && own == parent && own != 5) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pauli::I => write!(f, "I"),
            Pauli::X => write!(f, "X"),
            Pauli::Y => write!(f, "Y"),
            Pauli::Z => write!(f, "Z"),
        }
    }
}

impl fmt::Display for Ladder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ladder::Identity => write!(f, "1"),
            Ladder::Creation => write!(f, "C"),
            Ladder::Annihilation => write!(f, "A"),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Pauli(p) => write!(f, "{p}"),
            Operator::Ladder(l) => write!(f, "{l}"),
            Operator::ScalarMul(op, coeff) => {
                write!(f, "{coeff} * ")?;
                op.fmt_operand(f, self.precedence(), true)
            }
            Operator::Add(..) | Operator::Sub(..) | Operator::Mul(..) | Operator::Kron(..) => {
                // Unparenthesized left operands are printed along the spine.
                let mut spine = Vec::new();
                let mut node = self;
                while let Some((a, b)) = node.operands() {
                    spine.push((node, b));
                    if a.operands().is_none() || a.precedence() < node.precedence() {
                        a.fmt_operand(f, node.precedence(), false)?;
                        break;
                    }
                    node = a;
                }
                for (node, b) in spine.into_iter().rev() {
                    f.write_str(match node {
                        Operator::Add(..) => " + ",
                        Operator::Sub(..) => " - ",
                        Operator::Mul(..) => "*",
                        _ => " @ ",
                    })?;
                    b.fmt_operand(f, node.precedence(), true)?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        fn defer<'a>(
            pending: &mut Vec<(&'a Operator, &'a Operator)>,
            x: &'a Arc<Operator>,
            y: &'a Arc<Operator>,
        ) {
            if !Arc::ptr_eq(x, y) {
                pending.push((x.as_ref(), y.as_ref()));
            }
        }

        let mut pending = vec![(self, other)];
        while let Some((lhs, rhs)) = pending.pop() {
            match (lhs, rhs) {
                (Operator::Pauli(p), Operator::Pauli(q)) if p == q => {}
                (Operator::Ladder(l), Operator::Ladder(m)) if l == m => {}
                (Operator::ScalarMul(x, c), Operator::ScalarMul(y, d)) if c == d => {
                    defer(&mut pending, x, y);
                }
                (Operator::Add(a1, b1), Operator::Add(a2, b2))
                | (Operator::Sub(a1, b1), Operator::Sub(a2, b2))
                | (Operator::Mul(a1, b1), Operator::Mul(a2, b2))
                | (Operator::Kron(a1, b1), Operator::Kron(a2, b2)) => {
                    defer(&mut pending, a1, a2);
                    defer(&mut pending, b1, b2);
                }
                _ => return false,
            }
        }
        true
    }
}

/// Stand-in child left behind while a tree is torn down.
static PLACEHOLDER: LazyLock<Arc<Operator>> = LazyLock::new(|| Arc::new(Operator::Pauli(Pauli::I)));

impl Drop for Operator {
    fn drop(&mut self) {
        let mut orphans = Vec::new();
        self.detach_children(&mut orphans);
        while let Some(child) = orphans.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                node.detach_children(&mut orphans);
            }
        }
    }
}

impl From<Pauli> for Operator {
    fn from(p: Pauli) -> Self {
        Operator::Pauli(p)
    }
}

impl From<Ladder> for Operator {
    fn from(l: Ladder) -> Self {
        Operator::Ladder(l)
    }
}

impl std::ops::Add for Operator {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Operator::Add(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Sub for Operator {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Operator::Sub(Arc::new(self), Arc::new(rhs))
    }
}

/// Operator product on the same register or mode.
impl std::ops::Mul for Operator {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Operator::Mul(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Mul<MathExpr> for Operator {
    type Output = Self;

    fn mul(self, rhs: MathExpr) -> Self::Output {
        self.scale(rhs)
    }
}

impl std::ops::Mul<f64> for Operator {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl std::ops::Mul<Complex64> for Operator {
    type Output = Self;

    fn mul(self, rhs: Complex64) -> Self::Output {
        self.scale(rhs)
    }
}

impl std::ops::Mul<Operator> for MathExpr {
    type Output = Operator;

    fn mul(self, rhs: Operator) -> Self::Output {
        rhs.scale(self)
    }
}

impl std::ops::Mul<Operator> for f64 {
    type Output = Operator;

    fn mul(self, rhs: Operator) -> Self::Output {
        rhs.scale(self)
    }
}

impl std::ops::Neg for Operator {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.scale(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(Operator::pauli_x(), Operator::Pauli(Pauli::X));
        assert_eq!(Operator::creation(), Operator::Ladder(Ladder::Creation));
        assert!(Operator::identity().is_ladder());
        assert!(Operator::pauli_i().is_pauli());
    }

    #[test]
    fn test_scalar_mul_both_sides() {
        let left = 2.0 * Operator::pauli_z();
        let right = Operator::pauli_z() * 2.0;
        assert_eq!(left, right);
        assert_eq!(
            left,
            Operator::ScalarMul(Arc::new(Operator::pauli_z()), MathExpr::Num(2.0))
        );
    }

    #[test]
    fn test_size() {
        let op = Operator::pauli_x().kron(Operator::pauli_y() + Operator::pauli_z());
        assert_eq!(op.size(), 5);
    }

    #[test]
    fn test_display_precedence() {
        let op = Operator::pauli_x().kron(Operator::pauli_y() + Operator::pauli_z());
        assert_eq!(op.to_string(), "X @ (Y + Z)");

        let term = (Operator::creation() * Operator::annihilation()).kron(Operator::identity());
        assert_eq!(term.to_string(), "C*A @ 1");

        let scaled = Operator::pauli_x().kron(Operator::pauli_y()) * 2.0;
        assert_eq!(scaled.to_string(), "2 * X @ Y");
    }

    #[test]
    fn test_display_keeps_right_nesting() {
        let left = (Operator::pauli_x() + Operator::pauli_y()) + Operator::pauli_z();
        let right = Operator::pauli_x() + (Operator::pauli_y() + Operator::pauli_z());
        assert_eq!(left.to_string(), "X + Y + Z");
        assert_eq!(right.to_string(), "X + (Y + Z)");
    }

    #[test]
    fn test_long_sum_compares_prints_and_drops() {
        let sum = |n: usize| {
            (1..n).fold(Operator::pauli_x(), |acc, _| acc + Operator::pauli_x())
        };
        let (a, b) = (sum(50_000), sum(50_000));
        assert_eq!(a.size(), 99_999);
        assert!(a == b);
        assert!(a != sum(49_999));
        assert_eq!(a.to_string().len(), 50_000 + 3 * 49_999);
        drop(a);
        drop(b);
    }

    #[test]
    fn test_equality_ignores_sharing() {
        let shared = Arc::new(Operator::pauli_y().scale(MathExpr::var("g")));
        let a = Operator::Add(Arc::clone(&shared), Arc::clone(&shared));
        let b = Operator::pauli_y().scale(MathExpr::var("g")) + Operator::pauli_y().scale("g");
        assert_eq!(a, b);
        assert_ne!(a, Operator::pauli_y().scale("h") + Operator::pauli_y().scale("g"));
    }

    #[test]
    fn test_serde_tagged_record() {
        let op = Operator::pauli_x() * Operator::pauli_y();
        let json = serde_json::to_string(&op).unwrap();
        let back: Operator = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
        assert!(json.contains("\"Mul\""));
    }
}
