//! Rule kinds of the dispatch engine.
//!
//! A rule handles one node at a time and matches on its variant. Grouping
//! variants under one arm (every Pauli terminal, every binary node) plays the
//! role of a category-level handler. Where a rule is placed in a tree is
//! decided by a [`Walk`](crate::walk::Walk) or, for conversions, by
//! [`convert`].
//!
//! - [`Transformer`]: returns a replacement node, or `None` to leave the node
//!   as is. Unhandled nodes are rebuilt around their walked children, so
//!   structural recursion is the default.
//! - [`Visitor`]: side-effecting analysis over an explicit per-walk state.
//! - [`ConversionRule`]: lowers a tree bottom-up into another
//!   representation, receiving the already converted children as
//!   [`Operands`].

use std::sync::Arc;

use crate::error::{CompileError, CompileResult};
use crate::tree::Tree;

/// A local rewrite rule.
pub trait Transformer<T: Tree>: Send + Sync {
    /// Name of this rule.
    fn name(&self) -> &str;

    /// Rewrite a single node.
    ///
    /// Returns `Ok(None)` when the rule does not apply. Returning a node equal
    /// to the input is allowed but defeats subtree sharing.
    fn map(&self, node: &T) -> CompileResult<Option<T>>;
}

/// A side-effecting analysis.
///
/// The state is created fresh for every walk and handed back when the walk
/// ends, so nothing carries over between trees.
pub trait Visitor<T: Tree>: Send + Sync {
    /// Accumulator threaded through one walk.
    type State: Default;

    /// Name of this analysis.
    fn name(&self) -> &str;

    /// Visit a single node.
    fn visit(&self, node: &T, state: &mut Self::State) -> CompileResult<()>;
}

/// A bottom-up translation into another representation.
pub trait ConversionRule<T: Tree>: Send + Sync {
    /// Result of converting one subtree.
    type Output;

    /// Name of this rule.
    fn name(&self) -> &str;

    /// Convert a node whose children have already been converted.
    fn convert(&self, node: &T, operands: Operands<'_, Self::Output>) -> CompileResult<Self::Output>;

    /// Error for a variant this rule does not handle.
    fn unhandled(&self, node: &T) -> CompileError {
        CompileError::DispatchMiss {
            rule: self.name().to_string(),
            tag: node.tag(),
        }
    }
}

/// Converted children of a node, keyed by operand name.
pub struct Operands<'a, O> {
    rule: &'a str,
    entries: Vec<(&'static str, O)>,
}

impl<O> Operands<'_, O> {
    /// Take the converted operand with the given name.
    pub fn take(&mut self, name: &'static str) -> CompileResult<O> {
        let position = self
            .entries
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| CompileError::MissingOperand {
                rule: self.rule.to_string(),
                operand: name,
            })?;
        Ok(self.entries.swap_remove(position).1)
    }

    /// Take a pair of operands.
    pub fn take_pair(&mut self, first: &'static str, second: &'static str) -> CompileResult<(O, O)> {
        Ok((self.take(first)?, self.take(second)?))
    }

    /// Number of operands.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no operands.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run a conversion rule over a tree, children first.
///
/// Converted children wait on an explicit stack, so deep trees do not
/// recurse.
pub fn convert<T, R>(rule: &R, tree: &T) -> CompileResult<R::Output>
where
    T: Tree,
    R: ConversionRule<T> + ?Sized,
{
    enum Step<'a, T> {
        Enter(&'a T),
        Build(&'a T),
    }

    let mut steps = vec![Step::Enter(tree)];
    let mut done: Vec<R::Output> = Vec::new();
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(node) => {
                steps.push(Step::Build(node));
                steps.extend(node.children().into_iter().rev().map(|(_, c)| Step::Enter(c.as_ref())));
            }
            Step::Build(node) => {
                let names = node.children().into_iter().map(|(name, _)| name);
                let converted = done.split_off(done.len().saturating_sub(names.len()));
                let operands = Operands {
                    rule: rule.name(),
                    entries: names.zip(converted).collect(),
                };
                done.push(rule.convert(node, operands)?);
            }
        }
    }
    done.pop().ok_or_else(|| CompileError::MissingOperand {
        rule: rule.name().to_string(),
        operand: "root",
    })
}

impl<T: Tree, R: Transformer<T> + ?Sized> Transformer<T> for Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn map(&self, node: &T) -> CompileResult<Option<T>> {
        (**self).map(node)
    }
}

impl<T: Tree, V: Visitor<T> + ?Sized> Visitor<T> for &V {
    type State = V::State;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn visit(&self, node: &T, state: &mut Self::State) -> CompileResult<()> {
        (**self).visit(node, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_ir::MathExpr;

    /// Counts leaves, refusing functions.
    struct Leaves;

    impl ConversionRule<MathExpr> for Leaves {
        type Output = usize;

        fn name(&self) -> &str {
            "leaves"
        }

        fn convert(&self, node: &MathExpr, mut operands: Operands<'_, usize>) -> CompileResult<usize> {
            match node {
                MathExpr::Var(_) | MathExpr::Num(_) | MathExpr::Imag => Ok(1),
                MathExpr::Func(..) => Err(self.unhandled(node)),
                _ => {
                    let (a, b) = operands.take_pair("expr1", "expr2")?;
                    Ok(a + b)
                }
            }
        }
    }

    #[test]
    fn test_convert_post_order() {
        let e = (MathExpr::var("x") + MathExpr::num(2.0)) * MathExpr::Imag;
        assert_eq!(convert(&Leaves, &e).unwrap(), 3);
    }

    #[test]
    fn test_convert_deep_chain() {
        let e = (0..30_000).fold(MathExpr::var("x"), |acc, _| acc * MathExpr::num(2.0));
        assert_eq!(convert(&Leaves, &e).unwrap(), 30_001);
    }

    #[test]
    fn test_dispatch_miss() {
        let e = MathExpr::func(opal_ir::Function::Sin, MathExpr::var("x"));
        let err = convert(&Leaves, &e).unwrap_err();
        assert_eq!(
            err,
            CompileError::DispatchMiss {
                rule: "leaves".into(),
                tag: "Func"
            }
        );
    }

    #[test]
    fn test_missing_operand() {
        let mut operands: Operands<'_, usize> = Operands {
            rule: "count",
            entries: vec![("expr1", 1)],
        };
        assert_eq!(operands.len(), 1);
        assert!(matches!(
            operands.take("expr2"),
            Err(CompileError::MissingOperand { operand: "expr2", .. })
        ));
    }
}
