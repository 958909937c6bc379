//! Symbolic coefficient expressions.
//!
//! A [`MathExpr`] is the scalar half of an operator expression: every
//! `ScalarMul` node in an [`Operator`](crate::Operator) tree carries one.
//! Raw numbers and complex values are promoted into the tree through the
//! `From` casts below, so coefficient trees never hold anything but
//! `MathExpr` nodes.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::error::IrError;

/// Unary functions available in coefficient expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sinh,
    Cosh,
    Tanh,
    Asin,
    Acos,
    Atan,
    Asinh,
    Acosh,
    Atanh,
    Sqrt,
    Abs,
    Conj,
    Real,
    Imag,
    Heaviside,
}

impl Function {
    /// All functions, in declaration order.
    pub const ALL: [Function; 20] = [
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Exp,
        Function::Log,
        Function::Sinh,
        Function::Cosh,
        Function::Tanh,
        Function::Asin,
        Function::Acos,
        Function::Atan,
        Function::Asinh,
        Function::Acosh,
        Function::Atanh,
        Function::Sqrt,
        Function::Abs,
        Function::Conj,
        Function::Real,
        Function::Imag,
        Function::Heaviside,
    ];

    /// Lowercase name as written in expressions.
    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Asinh => "asinh",
            Function::Acosh => "acosh",
            Function::Atanh => "atanh",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Conj => "conj",
            Function::Real => "real",
            Function::Imag => "imag",
            Function::Heaviside => "heaviside",
        }
    }

    /// Apply the function to a complex argument.
    pub fn apply(self, z: Complex64) -> Complex64 {
        match self {
            Function::Sin => z.sin(),
            Function::Cos => z.cos(),
            Function::Tan => z.tan(),
            Function::Exp => z.exp(),
            Function::Log => z.ln(),
            Function::Sinh => z.sinh(),
            Function::Cosh => z.cosh(),
            Function::Tanh => z.tanh(),
            Function::Asin => z.asin(),
            Function::Acos => z.acos(),
            Function::Atan => z.atan(),
            Function::Asinh => z.asinh(),
            Function::Acosh => z.acosh(),
            Function::Atanh => z.atanh(),
            Function::Sqrt => z.sqrt(),
            Function::Abs => Complex64::new(z.norm(), 0.0),
            Function::Conj => z.conj(),
            Function::Real => Complex64::new(z.re, 0.0),
            Function::Imag => Complex64::new(z.im, 0.0),
            Function::Heaviside => {
                if z.re >= 0.0 {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(0.0, 0.0)
                }
            }
        }
    }

    /// Apply the function to a real argument, if the result stays real.
    pub fn apply_real(self, x: f64) -> Option<f64> {
        let value = match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Exp => x.exp(),
            Function::Log if x > 0.0 => x.ln(),
            Function::Sinh => x.sinh(),
            Function::Cosh => x.cosh(),
            Function::Tanh => x.tanh(),
            Function::Asin if (-1.0..=1.0).contains(&x) => x.asin(),
            Function::Acos if (-1.0..=1.0).contains(&x) => x.acos(),
            Function::Atan => x.atan(),
            Function::Asinh => x.asinh(),
            Function::Acosh if x >= 1.0 => x.acosh(),
            Function::Atanh if x > -1.0 && x < 1.0 => x.atanh(),
            Function::Sqrt if x >= 0.0 => x.sqrt(),
            Function::Abs => x.abs(),
            Function::Conj | Function::Real => x,
            Function::Imag => 0.0,
            Function::Heaviside => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Function::ALL
            .into_iter()
            .find(|func| func.name() == s)
            .ok_or_else(|| IrError::UnknownFunction(s.to_string()))
    }
}

/// A symbolic scalar expression.
///
/// Like [`Operator`](crate::Operator) trees, deep expressions compare, drop
/// and print without recursing along left-nested chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MathExpr {
    /// A named symbolic variable.
    Var(String),
    /// A real numeric constant.
    Num(f64),
    /// The imaginary unit `i`.
    Imag,
    /// A unary function application.
    Func(Function, Arc<MathExpr>),
    /// Addition.
    Add(Arc<MathExpr>, Arc<MathExpr>),
    /// Subtraction.
    Sub(Arc<MathExpr>, Arc<MathExpr>),
    /// Multiplication.
    Mul(Arc<MathExpr>, Arc<MathExpr>),
    /// Division.
    Div(Arc<MathExpr>, Arc<MathExpr>),
    /// Exponentiation.
    Pow(Arc<MathExpr>, Arc<MathExpr>),
}

impl MathExpr {
    /// Create a symbolic variable.
    pub fn var(name: impl Into<String>) -> Self {
        MathExpr::Var(name.into())
    }

    /// Create a numeric constant.
    pub fn num(value: f64) -> Self {
        MathExpr::Num(value)
    }

    /// The imaginary unit.
    pub fn imag() -> Self {
        MathExpr::Imag
    }

    /// The multiplicative unit.
    pub fn one() -> Self {
        MathExpr::Num(1.0)
    }

    /// Apply a unary function.
    pub fn func(func: Function, arg: impl Into<MathExpr>) -> Self {
        MathExpr::Func(func, Arc::new(arg.into()))
    }

    /// Raise to a power.
    #[must_use]
    pub fn pow(self, exponent: impl Into<MathExpr>) -> Self {
        MathExpr::Pow(Arc::new(self), Arc::new(exponent.into()))
    }

    /// Return the value if this node is a numeric constant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MathExpr::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// True for numeric constants.
    pub fn is_number(&self) -> bool {
        matches!(self, MathExpr::Num(_))
    }

    /// True for leaves (variables, numbers and the imaginary unit).
    pub fn is_leaf(&self) -> bool {
        matches!(self, MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag)
    }

    /// Names of all variables in this expression.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_vars(&mut set);
        set
    }

    fn collect_vars(&self, set: &mut BTreeSet<String>) {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            match node {
                MathExpr::Var(name) => {
                    set.insert(name.clone());
                }
                MathExpr::Num(_) | MathExpr::Imag => {}
                MathExpr::Func(_, arg) => pending.push(arg),
                MathExpr::Add(a, b)
                | MathExpr::Sub(a, b)
                | MathExpr::Mul(a, b)
                | MathExpr::Div(a, b)
                | MathExpr::Pow(a, b) => {
                    pending.push(a);
                    pending.push(b);
                }
            }
        }
    }

    /// Number of nodes in the expression tree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            if let Some((a, b)) = node.operands() {
                pending.push(a);
                pending.push(b);
            } else if let MathExpr::Func(_, arg) = node {
                pending.push(arg);
            }
        }
        count
    }

    /// Operands of a binary node.
    fn operands(&self) -> Option<(&Arc<MathExpr>, &Arc<MathExpr>)> {
        match self {
            MathExpr::Add(a, b)
            | MathExpr::Sub(a, b)
            | MathExpr::Mul(a, b)
            | MathExpr::Div(a, b)
            | MathExpr::Pow(a, b) => Some((a, b)),
            MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag | MathExpr::Func(..) => None,
        }
    }

    /// Move every non-leaf child into `out`, leaving a shared placeholder.
    fn detach_children(&mut self, out: &mut Vec<Arc<MathExpr>>) {
        let mut detach = |slot: &mut Arc<MathExpr>| {
            if !slot.is_leaf() {
                out.push(std::mem::replace(slot, Arc::clone(&PLACEHOLDER)));
            }
        };
        match self {
            MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag => {}
            MathExpr::Func(_, arg) => detach(arg),
            MathExpr::Add(a, b)
            | MathExpr::Sub(a, b)
            | MathExpr::Mul(a, b)
            | MathExpr::Div(a, b)
            | MathExpr::Pow(a, b) => {
                detach(a);
                detach(b);
            }
        }
    }
}

impl fmt::Display for MathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathExpr::Var(name) => write!(f, "{name}"),
            MathExpr::Num(v) if *v < 0.0 => write!(f, "({v})"),
            MathExpr::Num(v) => write!(f, "{v}"),
            MathExpr::Imag => write!(f, "i"),
            MathExpr::Func(func, arg) => write!(f, "{func}({arg})"),
            MathExpr::Add(..)
            | MathExpr::Sub(..)
            | MathExpr::Mul(..)
            | MathExpr::Div(..)
            | MathExpr::Pow(..) => {
                let mut spine = Vec::new();
                let mut leftmost = self;
                while let Some((a, b)) = leftmost.operands() {
                    spine.push((leftmost, b));
                    leftmost = a;
                }
                for (node, _) in &spine {
                    if matches!(node, MathExpr::Add(..) | MathExpr::Sub(..)) {
                        f.write_str("(")?;
                    }
                }
                write!(f, "{leftmost}")?;
                for (node, b) in spine.into_iter().rev() {
                    match node {
                        MathExpr::Add(..) => write!(f, " + {b})")?,
                        MathExpr::Sub(..) => write!(f, " - {b})")?,
                        MathExpr::Mul(..) => write!(f, "*{b}")?,
                        MathExpr::Div(..) => write!(f, "/{b}")?,
                        _ => write!(f, "^{b}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for MathExpr {
    fn eq(&self, other: &Self) -> bool {
        fn defer<'a>(
            pending: &mut Vec<(&'a MathExpr, &'a MathExpr)>,
            x: &'a Arc<MathExpr>,
            y: &'a Arc<MathExpr>,
        ) {
            if !Arc::ptr_eq(x, y) {
                pending.push((x.as_ref(), y.as_ref()));
            }
        }

        let mut pending = vec![(self, other)];
        while let Some((lhs, rhs)) = pending.pop() {
            match (lhs, rhs) {
                (MathExpr::Var(a), MathExpr::Var(b)) if a == b => {}
                (MathExpr::Num(x), MathExpr::Num(y)) if x == y => {}
                (MathExpr::Imag, MathExpr::Imag) => {}
                (MathExpr::Func(f, x), MathExpr::Func(g, y)) if f == g => defer(&mut pending, x, y),
                (MathExpr::Add(a1, b1), MathExpr::Add(a2, b2))
                | (MathExpr::Sub(a1, b1), MathExpr::Sub(a2, b2))
                | (MathExpr::Mul(a1, b1), MathExpr::Mul(a2, b2))
                | (MathExpr::Div(a1, b1), MathExpr::Div(a2, b2))
                | (MathExpr::Pow(a1, b1), MathExpr::Pow(a2, b2)) => {
                    defer(&mut pending, a1, a2);
                    defer(&mut pending, b1, b2);
                }
                _ => return false,
            }
        }
        true
    }
}

/// Stand-in child left behind while an expression is torn down.
static PLACEHOLDER: LazyLock<Arc<MathExpr>> = LazyLock::new(|| Arc::new(MathExpr::Imag));

impl Drop for MathExpr {
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

impl From<f64> for MathExpr {
    fn from(value: f64) -> Self {
        MathExpr::Num(value)
    }
}

impl From<i32> for MathExpr {
    fn from(value: i32) -> Self {
        MathExpr::Num(f64::from(value))
    }
}

impl From<&str> for MathExpr {
    fn from(name: &str) -> Self {
        MathExpr::Var(name.to_string())
    }
}

/// Complex values are promoted to `re + im*i`, dropping a zero part.
impl From<Complex64> for MathExpr {
    fn from(value: Complex64) -> Self {
        let imaginary = if value.im == 1.0 {
            MathExpr::Imag
        } else {
            MathExpr::Num(value.im) * MathExpr::Imag
        };
        match (value.re == 0.0, value.im == 0.0) {
            (_, true) => MathExpr::Num(value.re),
            (true, false) => imaginary,
            (false, false) => MathExpr::Num(value.re) + imaginary,
        }
    }
}

impl std::ops::Add for MathExpr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        MathExpr::Add(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Sub for MathExpr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        MathExpr::Sub(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Mul for MathExpr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        MathExpr::Mul(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Div for MathExpr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        MathExpr::Div(Arc::new(self), Arc::new(rhs))
    }
}

impl std::ops::Neg for MathExpr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        MathExpr::Num(-1.0) * self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_cast() {
        assert_eq!(MathExpr::from(Complex64::new(2.0, 0.0)), MathExpr::Num(2.0));
        assert_eq!(MathExpr::from(Complex64::new(0.0, 1.0)), MathExpr::Imag);
        assert_eq!(
            MathExpr::from(Complex64::new(0.0, -3.0)),
            MathExpr::Num(-3.0) * MathExpr::Imag
        );
        assert_eq!(
            MathExpr::from(Complex64::new(1.0, 1.0)),
            MathExpr::Num(1.0) + MathExpr::Imag
        );
    }

    #[test]
    fn test_free_vars() {
        let e = MathExpr::var("theta") * MathExpr::func(Function::Cos, MathExpr::var("phi"))
            + MathExpr::num(2.0);
        let vars: Vec<_> = e.free_vars().into_iter().collect();
        assert_eq!(vars, vec!["phi".to_string(), "theta".to_string()]);
    }

    #[test]
    fn test_function_roundtrip_name() {
        for func in Function::ALL {
            assert_eq!(func.name().parse::<Function>().unwrap(), func);
        }
        assert!("erf".parse::<Function>().is_err());
    }

    #[test]
    fn test_neg_is_scaled() {
        let e = -MathExpr::var("x");
        assert_eq!(e, MathExpr::Num(-1.0) * MathExpr::var("x"));
    }

    #[test]
    fn test_display() {
        let e = MathExpr::num(2.0) * MathExpr::Imag + MathExpr::var("x").pow(2);
        assert_eq!(e.to_string(), "(2*i + x^2)");
        let e = (MathExpr::var("a") + MathExpr::var("b")) * MathExpr::var("c")
            - MathExpr::var("d") / MathExpr::num(-2.0);
        assert_eq!(e.to_string(), "((a + b)*c - d/(-2))");
    }

    #[test]
    fn test_long_sum_compares_prints_and_drops() {
        let sum = |n: usize| (1..n).fold(MathExpr::var("g"), |acc, _| acc + MathExpr::var("g"));
        let (a, b) = (sum(50_000), sum(50_000));
        assert_eq!(a.size(), 99_999);
        assert!(a == b);
        assert!(a != sum(49_999));
        assert_eq!(a.free_vars().len(), 1);
        let printed = a.to_string();
        assert!(printed.starts_with("((((g + g)"));
        assert_eq!(printed.len(), 1 + 6 * 49_999);
    }
}
