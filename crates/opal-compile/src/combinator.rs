//! Pass combinators.
//!
//! [`Chain`] threads a tree through passes in sequence, [`FixedPoint`]
//! repeats a pass until the tree stops changing. Both are passes
//! themselves, so they nest.

use tracing::trace;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};

/// Passes applied in sequence.
pub struct Chain<T> {
    name: String,
    passes: Vec<Box<dyn Pass<T>>>,
}

impl<T> Chain<T> {
    /// Create an empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: vec![],
        }
    }

    /// Append a pass.
    #[must_use]
    pub fn then(mut self, pass: impl Pass<T> + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the chain has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl<T: Send + Sync> Pass<T> for Chain<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PassKind {
        if self
            .passes
            .iter()
            .any(|p| p.kind() == PassKind::Transformation)
        {
            PassKind::Transformation
        } else {
            PassKind::Analysis
        }
    }

    fn run(&self, tree: &T) -> CompileResult<T> {
        let mut passes = self.passes.iter();
        let Some(first) = passes.next() else {
            return Err(CompileError::InvalidFlow(format!(
                "chain '{}' has no passes",
                self.name
            )));
        };
        let mut current = first.run(tree)?;
        for pass in passes {
            current = pass.run(&current)?;
        }
        Ok(current)
    }
}

/// A pass repeated until its output equals its input.
///
/// Exceeding `max_iter` applications without reaching a fixed point is a
/// [`CompileError::NonTermination`].
pub struct FixedPoint<P> {
    pass: P,
    max_iter: usize,
}

impl<P> FixedPoint<P> {
    /// Wrap a pass with an iteration bound.
    pub fn new(pass: P, max_iter: usize) -> Self {
        Self { pass, max_iter }
    }

    /// The iteration bound.
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }
}

impl<T, P> Pass<T> for FixedPoint<P>
where
    T: PartialEq,
    P: Pass<T>,
{
    fn name(&self) -> &str {
        self.pass.name()
    }

    fn kind(&self) -> PassKind {
        self.pass.kind()
    }

    fn run(&self, tree: &T) -> CompileResult<T> {
        let mut current = self.pass.run(tree)?;
        if current == *tree {
            return Ok(current);
        }
        for iteration in 1..self.max_iter {
            let next = self.pass.run(&current)?;
            if next == current {
                trace!("{} reached fixed point after {} iterations", self.name(), iteration + 1);
                return Ok(next);
            }
            current = next;
        }
        Err(CompileError::NonTermination {
            name: self.pass.name().to_string(),
            limit: self.max_iter,
        })
    }
}
