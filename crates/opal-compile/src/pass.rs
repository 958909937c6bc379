//! Pass trait and types for compilation passes.

use crate::error::CompileResult;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that inspects but does not rewrite the tree.
    Analysis,
    /// Transformation pass that rewrites the tree.
    Transformation,
}

/// A compilation pass over trees of type `T`.
///
/// Passes are the unit the combinators and flow graphs schedule. A pass
/// never mutates its input: it returns the rewritten tree, sharing every
/// subtree it did not touch. Analysis passes return their input unchanged
/// or fail.
pub trait Pass<T>: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given tree.
    fn run(&self, tree: &T) -> CompileResult<T>;
}

impl<T, P: Pass<T> + ?Sized> Pass<T> for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> PassKind {
        (**self).kind()
    }

    fn run(&self, tree: &T) -> CompileResult<T> {
        (**self).run(tree)
    }
}
