//! Coefficient rewrite rules.
//!
//! The rules bring a [`MathExpr`] into one deterministic shape: a
//! left-nested sum of left-nested products whose factors are ordered
//! imaginary unit, numbers, variables (by name), functions, powers and
//! quotients, with adjacent numbers folded. Sum terms are sorted and like
//! terms added up, so the shape does not depend on the order terms were
//! written in. [`math_pipeline`] assembles the rules into the fixed-point
//! pass used on every coefficient.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use opal_ir::MathExpr;

use crate::combinator::{Chain, FixedPoint};
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::rule::Transformer;
use crate::tree::Tree;
use crate::walk::Walk;

fn add(a: &Arc<MathExpr>, b: &Arc<MathExpr>) -> MathExpr {
    MathExpr::Add(Arc::clone(a), Arc::clone(b))
}

fn mul(a: &Arc<MathExpr>, b: &Arc<MathExpr>) -> MathExpr {
    MathExpr::Mul(Arc::clone(a), Arc::clone(b))
}

/// Folded number, if the result stays finite.
fn folded(value: f64) -> Option<MathExpr> {
    value.is_finite().then_some(MathExpr::Num(value))
}

/// Pushes products and quotients through sums; `a - b` becomes
/// `a + (-1)·b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributeMathExpr;

impl Transformer<MathExpr> for DistributeMathExpr {
    fn name(&self) -> &str {
        "distribute_math_expr"
    }

    fn map(&self, node: &MathExpr) -> CompileResult<Option<MathExpr>> {
        Ok(match node {
            MathExpr::Sub(a, b) => Some(MathExpr::Add(
                Arc::clone(a),
                Arc::new(MathExpr::Mul(Arc::new(MathExpr::Num(-1.0)), Arc::clone(b))),
            )),
            MathExpr::Mul(a, b) => match (a.as_ref(), b.as_ref()) {
                (MathExpr::Add(x, y), _) => Some(MathExpr::Add(
                    Arc::new(mul(x, b)),
                    Arc::new(mul(y, b)),
                )),
                (_, MathExpr::Add(x, y)) => Some(MathExpr::Add(
                    Arc::new(mul(a, x)),
                    Arc::new(mul(a, y)),
                )),
                _ => None,
            },
            MathExpr::Div(a, b) => match a.as_ref() {
                MathExpr::Add(x, y) => Some(MathExpr::Add(
                    Arc::new(MathExpr::Div(Arc::clone(x), Arc::clone(b))),
                    Arc::new(MathExpr::Div(Arc::clone(y), Arc::clone(b))),
                )),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Re-associates sums and products to the left.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProperOrderMathExpr;

impl Transformer<MathExpr> for ProperOrderMathExpr {
    fn name(&self) -> &str {
        "proper_order_math_expr"
    }

    fn map(&self, node: &MathExpr) -> CompileResult<Option<MathExpr>> {
        Ok(match node {
            MathExpr::Add(a, b) => match b.as_ref() {
                MathExpr::Add(x, y) => Some(MathExpr::Add(Arc::new(add(a, x)), Arc::clone(y))),
                _ => None,
            },
            MathExpr::Mul(a, b) => match b.as_ref() {
                MathExpr::Mul(x, y) => Some(MathExpr::Mul(Arc::new(mul(a, x)), Arc::clone(y))),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Orders the factors of a product by priority.
///
/// Imaginary unit, numbers, variables, functions, powers, quotients, then
/// anything else. Variables are ordered by name, functions, powers and
/// quotients by their printed form.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionMathExpr;

impl PartitionMathExpr {
    fn priority(e: &MathExpr) -> (u8, String) {
        match e {
            MathExpr::Imag => (0, String::new()),
            MathExpr::Num(_) => (1, String::new()),
            MathExpr::Var(name) => (2, name.clone()),
            MathExpr::Func(..) => (3, e.to_string()),
            MathExpr::Pow(..) => (4, e.to_string()),
            MathExpr::Div(..) => (5, e.to_string()),
            MathExpr::Add(..) | MathExpr::Sub(..) | MathExpr::Mul(..) => (6, String::new()),
        }
    }
}

impl Transformer<MathExpr> for PartitionMathExpr {
    fn name(&self) -> &str {
        "partition_math_expr"
    }

    fn map(&self, node: &MathExpr) -> CompileResult<Option<MathExpr>> {
        let MathExpr::Mul(a, b) = node else {
            return Ok(None);
        };
        let (rest, last) = match a.as_ref() {
            MathExpr::Mul(rest, last) => (Some(rest), last),
            _ => (None, a),
        };
        if Self::priority(b) >= Self::priority(last) {
            return Ok(None);
        }
        let front = match rest {
            Some(rest) => Arc::new(mul(rest, b)),
            None => Arc::clone(b),
        };
        Ok(Some(MathExpr::Mul(front, Arc::clone(last))))
    }
}

/// Numeric folding.
///
/// Adjacent numbers in sums and products are combined, additive and
/// multiplicative units dropped, `i·i` becomes `-1`, and functions, powers
/// and quotients of numbers are evaluated when the result is a finite real.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifyMathExpr;

impl Transformer<MathExpr> for SimplifyMathExpr {
    fn name(&self) -> &str {
        "simplify_math_expr"
    }

    fn map(&self, node: &MathExpr) -> CompileResult<Option<MathExpr>> {
        use MathExpr::{Add, Div, Func, Imag, Mul, Num, Pow, Sub};

        Ok(match node {
            Add(a, b) => match (a.as_ref(), b.as_ref()) {
                (Num(x), Num(y)) => folded(x + y),
                (Add(rest, last), Num(y)) => match last.as_ref() {
                    Num(x) => folded(x + y).map(|n| Add(Arc::clone(rest), Arc::new(n))),
                    _ => None,
                },
                (Num(x), _) if *x == 0.0 => Some(b.as_ref().clone()),
                (_, Num(y)) if *y == 0.0 => Some(a.as_ref().clone()),
                _ => None,
            },
            Sub(a, b) => match (a.as_ref(), b.as_ref()) {
                (Num(x), Num(y)) => folded(x - y),
                _ => None,
            },
            Mul(a, b) => match (a.as_ref(), b.as_ref()) {
                (Num(x), Num(y)) => folded(x * y),
                (Imag, Imag) => Some(Num(-1.0)),
                (Num(x), _) | (_, Num(x)) if *x == 0.0 => Some(Num(0.0)),
                (Num(x), _) if *x == 1.0 => Some(b.as_ref().clone()),
                (_, Num(y)) if *y == 1.0 => Some(a.as_ref().clone()),
                (Mul(rest, last), Num(y)) => match last.as_ref() {
                    Num(x) => folded(x * y).map(|n| Mul(Arc::clone(rest), Arc::new(n))),
                    _ => None,
                },
                (Mul(rest, last), Imag) => match last.as_ref() {
                    Imag => Some(Mul(Arc::clone(rest), Arc::new(Num(-1.0)))),
                    _ => None,
                },
                _ => None,
            },
            Div(a, b) => match (a.as_ref(), b.as_ref()) {
                (Num(x), Num(y)) if *y != 0.0 => folded(x / y),
                (_, Num(y)) if *y == 1.0 => Some(a.as_ref().clone()),
                _ => None,
            },
            Pow(a, b) => match (a.as_ref(), b.as_ref()) {
                (Num(x), Num(y)) => folded(x.powf(*y)),
                (_, Num(y)) if *y == 1.0 => Some(a.as_ref().clone()),
                (_, Num(y)) if *y == 0.0 => Some(Num(1.0)),
                _ => None,
            },
            Func(func, arg) => match arg.as_ref() {
                Num(x) => func.apply_real(*x).map(Num),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Sorts the terms of every sum and adds up terms that differ only in
/// their numeric factor: `3·g + h + 2·g` becomes `5·g + h`.
///
/// A term is keyed by its non-numeric factors, each ranked the way
/// [`PartitionMathExpr`] ranks factors and then by printed form. Pure
/// numbers key first. Merged terms whose numbers cancel are dropped; a
/// merge that would overflow keeps its terms apart.
///
/// Every sum is flattened and handled once, children before parents, on an
/// explicit stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectTerms;

type TermKey = Vec<(u8, String)>;

/// A sum term split into its numeric factor and the rest.
struct Summand {
    key: TermKey,
    number: f64,
    rest: Vec<Arc<MathExpr>>,
    term: Arc<MathExpr>,
}

enum Step {
    Enter(Arc<MathExpr>),
    Exit(Arc<MathExpr>, Vec<Arc<MathExpr>>),
}

/// Left-nest operands with a binary constructor.
fn nest(
    operands: Vec<Arc<MathExpr>>,
    join: fn(Arc<MathExpr>, Arc<MathExpr>) -> MathExpr,
) -> Option<Arc<MathExpr>> {
    operands.into_iter().reduce(|acc, next| Arc::new(join(acc, next)))
}

/// Operands of a chain of one binary node kind, first to last.
fn flatten(node: &Arc<MathExpr>, is_link: fn(&MathExpr) -> bool) -> Vec<Arc<MathExpr>> {
    let mut out = Vec::new();
    let mut pending = vec![node];
    while let Some(e) = pending.pop() {
        match e.as_ref() {
            MathExpr::Add(a, b) | MathExpr::Mul(a, b) if is_link(e) => {
                pending.push(b);
                pending.push(a);
            }
            _ => out.push(Arc::clone(e)),
        }
    }
    out
}

impl CollectTerms {
    fn summand(term: Arc<MathExpr>) -> Summand {
        let mut number = 1.0;
        let mut rest = Vec::new();
        for factor in flatten(&term, |e| matches!(e, MathExpr::Mul(..))) {
            match factor.as_number() {
                Some(x) => number *= x,
                None => rest.push(factor),
            }
        }
        let key = rest
            .iter()
            .map(|f| (PartitionMathExpr::priority(f).0, f.to_string()))
            .collect();
        Summand {
            key,
            number,
            rest,
            term,
        }
    }

    /// `number` times `rest`, the number placed after a leading `i`.
    fn scaled(number: f64, mut rest: Vec<Arc<MathExpr>>) -> Option<Arc<MathExpr>> {
        if number != 1.0 || rest.is_empty() {
            let leading_imag = rest.first().is_some_and(|f| matches!(f.as_ref(), MathExpr::Imag));
            rest.insert(usize::from(leading_imag), Arc::new(MathExpr::Num(number)));
        }
        nest(rest, MathExpr::Mul)
    }

    fn combine(node: &Arc<MathExpr>, terms: Vec<Arc<MathExpr>>, unchanged: bool) -> Arc<MathExpr> {
        let mut summands: Vec<Summand> = terms.into_iter().map(Self::summand).collect();
        if summands.windows(2).all(|w| w[0].key < w[1].key) {
            if unchanged {
                return Arc::clone(node);
            }
            let terms = summands.into_iter().map(|s| s.term).collect();
            return nest(terms, MathExpr::Add).unwrap_or_else(|| Arc::clone(node));
        }

        summands.sort_by(|a, b| a.key.cmp(&b.key));
        let mut out = Vec::with_capacity(summands.len());
        for group in summands.chunk_by(|a, b| a.key == b.key) {
            let total: f64 = group.iter().map(|s| s.number).sum();
            match group {
                [single] => out.push(Arc::clone(&single.term)),
                _ if !total.is_finite() => out.extend(group.iter().map(|s| Arc::clone(&s.term))),
                [first, ..] if total != 0.0 => out.extend(Self::scaled(total, first.rest.clone())),
                _ => {}
            }
        }
        nest(out, MathExpr::Add).unwrap_or_else(|| Arc::new(MathExpr::Num(0.0)))
    }
}

impl Pass<MathExpr> for CollectTerms {
    fn name(&self) -> &str {
        "collect_terms"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, tree: &MathExpr) -> CompileResult<MathExpr> {
        let root = Arc::new(tree.clone());
        let mut steps = vec![Step::Enter(Arc::clone(&root))];
        let mut done: Vec<Arc<MathExpr>> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Enter(node) => {
                    let operands = match node.as_ref() {
                        MathExpr::Add(..) => flatten(&node, |e| matches!(e, MathExpr::Add(..))),
                        _ => node.children().into_iter().map(|(_, c)| Arc::clone(c)).collect(),
                    };
                    let entered: Vec<_> = operands.iter().rev().cloned().map(Step::Enter).collect();
                    steps.push(Step::Exit(node, operands));
                    steps.extend(entered);
                }
                Step::Exit(node, operands) => {
                    let results = done.split_off(done.len().saturating_sub(operands.len()));
                    let unchanged = results.iter().zip(&operands).all(|(r, o)| Arc::ptr_eq(r, o));
                    done.push(match node.as_ref() {
                        MathExpr::Add(..) => Self::combine(&node, results, unchanged),
                        _ if unchanged => node,
                        _ => Arc::new(node.with_children(results)),
                    });
                }
            }
        }
        Ok(match done.pop() {
            Some(out) if !Arc::ptr_eq(&out, &root) => Arc::unwrap_or_clone(out),
            _ => tree.clone(),
        })
    }
}

/// Binds variables to numbers.
#[derive(Debug, Clone, Default)]
pub struct SubstituteVars {
    values: FxHashMap<String, f64>,
}

impl SubstituteVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, returning the updated substitution.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for SubstituteVars {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Transformer<MathExpr> for SubstituteVars {
    fn name(&self) -> &str {
        "substitute_vars"
    }

    fn map(&self, node: &MathExpr) -> CompileResult<Option<MathExpr>> {
        Ok(match node {
            MathExpr::Var(name) => self.values.get(name).map(|v| MathExpr::Num(*v)),
            _ => None,
        })
    }
}

/// The coefficient canonicalization pass, repeated to a fixed point.
pub fn math_pipeline(max_iter: usize) -> FixedPoint<Chain<MathExpr>> {
    FixedPoint::new(
        Chain::new("math_expr")
            .then(Walk::post(DistributeMathExpr))
            .then(Walk::post(ProperOrderMathExpr))
            .then(Walk::post(PartitionMathExpr))
            .then(Walk::post(SimplifyMathExpr))
            .then(CollectTerms),
        max_iter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::Pass;
    use opal_ir::Function;

    fn canon(e: &MathExpr) -> MathExpr {
        math_pipeline(100).run(e).unwrap()
    }

    #[test]
    fn test_fold_sum() {
        assert_eq!(canon(&(MathExpr::one() + MathExpr::one())), MathExpr::num(2.0));
    }

    #[test]
    fn test_distribute_and_partition() {
        // x·(2 + i)  ->  i·x + 2·x
        let e = MathExpr::var("x") * (MathExpr::num(2.0) + MathExpr::Imag);
        assert_eq!(
            canon(&e),
            MathExpr::Imag * MathExpr::var("x") + MathExpr::num(2.0) * MathExpr::var("x")
        );
    }

    #[test]
    fn test_imaginary_square() {
        let e = MathExpr::Imag * MathExpr::var("g") * MathExpr::Imag;
        assert_eq!(canon(&e), MathExpr::num(-1.0) * MathExpr::var("g"));
    }

    #[test]
    fn test_unit_coefficients() {
        assert_eq!(canon(&(MathExpr::one() * MathExpr::Imag)), MathExpr::Imag);
        assert_eq!(
            canon(&(MathExpr::var("b") * MathExpr::var("a"))),
            MathExpr::var("a") * MathExpr::var("b")
        );
    }

    #[test]
    fn test_sub_to_zero() {
        let e = MathExpr::num(3.0) - MathExpr::num(3.0);
        assert_eq!(canon(&e), MathExpr::num(0.0));
    }

    #[test]
    fn test_numeric_functions() {
        let e = MathExpr::func(Function::Cos, 0.0) + MathExpr::num(2.0).pow(3);
        assert_eq!(canon(&e), MathExpr::num(9.0));
        // Not real: stays symbolic.
        let e = MathExpr::func(Function::Sqrt, -1.0);
        assert_eq!(canon(&e), MathExpr::func(Function::Sqrt, -1.0));
    }

    #[test]
    fn test_idempotent() {
        let e = (MathExpr::var("g") - MathExpr::var("h")) * MathExpr::num(0.5)
            + MathExpr::Imag * MathExpr::func(Function::Sin, "t");
        let once = canon(&e);
        assert_eq!(canon(&once), once);
    }

    #[test]
    fn test_sum_order_is_irrelevant() {
        let g = || MathExpr::var("g");
        let h = || MathExpr::var("h");
        assert_eq!(canon(&(h() + g())), g() + h());
        assert_eq!(canon(&(g() + h())), g() + h());
        let mixed = MathExpr::Imag * h() + MathExpr::num(2.0) + g();
        assert_eq!(canon(&mixed), MathExpr::num(2.0) + MathExpr::Imag * h() + g());
    }

    #[test]
    fn test_like_terms_added() {
        let e = MathExpr::num(2.0) * MathExpr::var("g") + MathExpr::var("g") * MathExpr::num(3.0);
        assert_eq!(canon(&e), MathExpr::num(5.0) * MathExpr::var("g"));

        let e = MathExpr::var("g") + MathExpr::Imag * MathExpr::var("h") - MathExpr::var("g");
        assert_eq!(canon(&e), MathExpr::Imag * MathExpr::var("h"));

        let e = MathExpr::Imag * MathExpr::var("h") + MathExpr::var("h") * MathExpr::Imag;
        assert_eq!(
            canon(&e),
            MathExpr::Imag * MathExpr::num(2.0) * MathExpr::var("h")
        );
        assert_eq!(canon(&(MathExpr::var("g") - MathExpr::var("g"))), MathExpr::num(0.0));
    }

    #[test]
    fn test_collect_terms_keeps_sorted_sums() {
        let e = MathExpr::var("a") + MathExpr::func(Function::Sin, MathExpr::var("b"));
        assert_eq!(CollectTerms.run(&e).unwrap(), e);
        let long = (0..20_000).fold(MathExpr::num(1.0), |acc, _| acc + MathExpr::num(1.0));
        assert_eq!(CollectTerms.run(&long).unwrap(), MathExpr::num(20_001.0));
    }

    #[test]
    fn test_substitute() {
        let subst: SubstituteVars = [("g".to_string(), 2.0)].into_iter().collect();
        assert_eq!(subst.len(), 1);
        let e = MathExpr::var("g") * MathExpr::var("h");
        let out = Walk::post(subst).run(&e).unwrap();
        assert_eq!(out, MathExpr::num(2.0) * MathExpr::var("h"));
    }
}
