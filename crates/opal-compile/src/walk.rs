//! Traversal strategies.
//!
//! A [`Walk`] places a single rule in a tree:
//!
//! | Order | Rule applied |
//! |-------|--------------|
//! | [`Order::Pre`] | to a node, then to the children of the result |
//! | [`Order::Post`] | to the rebuilt node after all children |
//! | [`Order::Level`] | breadth-first, one layer of the tree at a time |
//! | [`Order::In`] | after the first child and before the remaining ones |
//!
//! [`Walk::reversed`] processes children last to first. A walk over a
//! [`Transformer`] is a [`Pass`]; a walk over a [`Visitor`] is run with
//! [`Walk::visit`].
//!
//! Subtrees the rule leaves alone are shared with the input tree. Walks keep
//! their own stack instead of recursing, so a sum of many thousands of terms
//! is walked like any other tree.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::rule::{Transformer, Visitor};
use crate::tree::Tree;

/// Where a rule is invoked relative to a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Pre,
    Post,
    Level,
    In,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Pre => write!(f, "pre"),
            Order::Post => write!(f, "post"),
            Order::Level => write!(f, "level"),
            Order::In => write!(f, "in"),
        }
    }
}

/// A rule together with the order it is applied in.
#[derive(Debug, Clone)]
pub struct Walk<R> {
    rule: R,
    order: Order,
    reverse: bool,
}

impl<R> Walk<R> {
    /// Walk with an explicit order.
    pub fn new(rule: R, order: Order) -> Self {
        Self {
            rule,
            order,
            reverse: false,
        }
    }

    /// Apply the rule before descending.
    pub fn pre(rule: R) -> Self {
        Self::new(rule, Order::Pre)
    }

    /// Apply the rule after the children are done.
    pub fn post(rule: R) -> Self {
        Self::new(rule, Order::Post)
    }

    /// Apply the rule layer by layer.
    pub fn level(rule: R) -> Self {
        Self::new(rule, Order::Level)
    }

    /// Apply the rule between the first and remaining children.
    pub fn in_order(rule: R) -> Self {
        Self::new(rule, Order::In)
    }

    /// Process children last to first.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    /// The traversal order.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Whether children are processed last to first.
    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    /// The wrapped rule.
    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Children of a node in processing order.
    fn ordered<'n, T: Tree>(&self, node: &'n T) -> Vec<(usize, &'n Arc<T>)> {
        let mut children: Vec<_> = node
            .children()
            .into_iter()
            .map(|(_, child)| child)
            .enumerate()
            .collect();
        if self.reverse {
            children.reverse();
        }
        children
    }
}

/// Rebuild `node` if any child changed.
fn rebuild<T: Tree>(node: &Arc<T>, replaced: Vec<(usize, Arc<T>)>) -> Option<Arc<T>> {
    if replaced.is_empty() {
        return None;
    }
    let mut children: Vec<Arc<T>> = node
        .children()
        .into_iter()
        .map(|(_, child)| Arc::clone(child))
        .collect();
    for (index, child) in replaced {
        if let Some(slot) = children.get_mut(index) {
            *slot = child;
        }
    }
    Some(Arc::new(node.with_children(children)))
}

/// A node on the explicit stack of a depth-first transform.
struct Frame<T> {
    /// The node as rewritten so far.
    node: Arc<T>,
    /// Replacement the rule produced for this node.
    mapped: Option<Arc<T>>,
    children: Vec<(usize, Arc<T>)>,
    next: usize,
    replaced: Vec<(usize, Arc<T>)>,
    /// In-order only: the rule has run on this node.
    applied: bool,
}

/// A node reached by a level-order transform.
struct LevelEntry<T> {
    node: Arc<T>,
    mapped: bool,
    parent: Option<(usize, usize)>,
    replaced: Vec<(usize, Arc<T>)>,
}

/// Pending work of a visitor walk.
enum Step<'a, T> {
    Enter(&'a T),
    Visit(&'a T),
}

impl<R> Walk<R> {
    /// Transform a shared tree. `Ok(None)` means nothing changed.
    pub fn transform<T>(&self, tree: &Arc<T>) -> CompileResult<Option<Arc<T>>>
    where
        T: Tree,
        R: Transformer<T>,
    {
        match self.order {
            Order::Level => self.level_order(tree),
            Order::Pre | Order::Post | Order::In => self.depth_first(tree),
        }
    }

    fn apply<T: Tree>(&self, node: &Arc<T>) -> CompileResult<Option<Arc<T>>>
    where
        R: Transformer<T>,
    {
        Ok(self.rule.map(node.as_ref())?.map(Arc::new))
    }

    fn owned_children<T: Tree>(&self, node: &Arc<T>) -> Vec<(usize, Arc<T>)> {
        self.ordered(node.as_ref())
            .into_iter()
            .map(|(index, child)| (index, Arc::clone(child)))
            .collect()
    }

    fn enter<T: Tree>(&self, node: Arc<T>) -> CompileResult<Frame<T>>
    where
        R: Transformer<T>,
    {
        let mapped = match self.order {
            Order::Pre => self.apply(&node)?,
            _ => None,
        };
        let node = mapped.clone().unwrap_or(node);
        Ok(Frame {
            children: self.owned_children(&node),
            node,
            mapped,
            next: 0,
            replaced: Vec::new(),
            applied: false,
        })
    }

    /// In-order: run the rule once the first child is done, then continue
    /// with the remaining children of the result.
    fn apply_between<T: Tree>(&self, frame: &mut Frame<T>) -> CompileResult<()>
    where
        R: Transformer<T>,
    {
        let rebuilt = rebuild(&frame.node, std::mem::take(&mut frame.replaced));
        let current = rebuilt.as_ref().unwrap_or(&frame.node);
        let changed = self.apply(current)?.or(rebuilt);
        if let Some(new) = &changed {
            if frame.next == 1 {
                frame.children = self.owned_children(new);
            }
            frame.node = Arc::clone(new);
        }
        frame.mapped = changed;
        frame.applied = true;
        Ok(())
    }

    fn finish<T: Tree>(&self, frame: Frame<T>) -> CompileResult<Option<Arc<T>>>
    where
        R: Transformer<T>,
    {
        if self.order == Order::Post {
            let rebuilt = rebuild(&frame.node, frame.replaced);
            let current = rebuilt.as_ref().unwrap_or(&frame.node);
            return Ok(self.apply(current)?.or(rebuilt));
        }
        Ok(rebuild(&frame.node, frame.replaced).or(frame.mapped))
    }

    fn depth_first<T: Tree>(&self, tree: &Arc<T>) -> CompileResult<Option<Arc<T>>>
    where
        R: Transformer<T>,
    {
        let mut stack = vec![self.enter(Arc::clone(tree))?];
        while let Some(frame) = stack.last_mut() {
            if self.order == Order::In
                && !frame.applied
                && (frame.next == 1 || frame.children.is_empty())
            {
                self.apply_between(frame)?;
            }
            if let Some((_, child)) = frame.children.get(frame.next) {
                let child = Arc::clone(child);
                frame.next += 1;
                let entered = self.enter(child)?;
                stack.push(entered);
                continue;
            }
            let Some(done) = stack.pop() else {
                break;
            };
            let result = self.finish(done)?;
            let Some(parent) = stack.last_mut() else {
                return Ok(result);
            };
            if let Some(new) = result {
                let index = parent.children[parent.next - 1].0;
                parent.replaced.push((index, new));
            }
        }
        Ok(None)
    }

    /// Apply the rule one layer at a time, each layer seeing the rewritten
    /// layer above it, then rebuild bottom-up.
    fn level_order<T: Tree>(&self, tree: &Arc<T>) -> CompileResult<Option<Arc<T>>>
    where
        R: Transformer<T>,
    {
        let mut entries = vec![LevelEntry {
            node: Arc::clone(tree),
            mapped: false,
            parent: None,
            replaced: Vec::new(),
        }];
        let mut layer = 0..1;
        while !layer.is_empty() {
            let start = entries.len();
            for id in layer {
                if let Some(new) = self.apply(&entries[id].node)? {
                    entries[id].node = new;
                    entries[id].mapped = true;
                }
                for (index, child) in self.owned_children(&entries[id].node) {
                    entries.push(LevelEntry {
                        node: child,
                        mapped: false,
                        parent: Some((id, index)),
                        replaced: Vec::new(),
                    });
                }
            }
            layer = start..entries.len();
        }

        // Children always come after their parent.
        while let Some(entry) = entries.pop() {
            let result =
                rebuild(&entry.node, entry.replaced).or(entry.mapped.then_some(entry.node));
            match (entry.parent, result) {
                (Some((parent, index)), Some(new)) => entries[parent].replaced.push((index, new)),
                (Some(_), None) => {}
                (None, result) => return Ok(result),
            }
        }
        Ok(None)
    }
}

impl<R> Walk<R> {
    /// Run a visitor over a tree and return its final state.
    pub fn visit<T>(&self, tree: &T) -> CompileResult<R::State>
    where
        T: Tree,
        R: Visitor<T>,
    {
        let mut state = R::State::default();
        if self.order == Order::Level {
            let mut queue = VecDeque::from([tree]);
            while let Some(node) = queue.pop_front() {
                self.rule.visit(node, &mut state)?;
                queue.extend(self.ordered(node).into_iter().map(|(_, c)| c.as_ref()));
            }
            return Ok(state);
        }

        let mut steps = vec![Step::Enter(tree)];
        while let Some(step) = steps.pop() {
            let node = match step {
                Step::Visit(node) => {
                    self.rule.visit(node, &mut state)?;
                    continue;
                }
                Step::Enter(node) => node,
            };
            let children: Vec<&T> = self.ordered(node).into_iter().map(|(_, c)| c.as_ref()).collect();
            // Pushed in reverse: the last step pushed runs first.
            match self.order {
                Order::Pre => {
                    steps.extend(children.into_iter().rev().map(Step::Enter));
                    steps.push(Step::Visit(node));
                }
                Order::Post => {
                    steps.push(Step::Visit(node));
                    steps.extend(children.into_iter().rev().map(Step::Enter));
                }
                Order::In | Order::Level => {
                    let mut children = children.into_iter();
                    let first = children.next();
                    steps.extend(children.rev().map(Step::Enter));
                    steps.push(Step::Visit(node));
                    steps.extend(first.map(Step::Enter));
                }
            }
        }
        Ok(state)
    }
}

impl<T, R> Pass<T> for Walk<R>
where
    T: Tree,
    R: Transformer<T>,
{
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, tree: &T) -> CompileResult<T> {
        let root = Arc::new(tree.clone());
        Ok(match self.transform(&root)? {
            Some(new) => Arc::unwrap_or_clone(new),
            None => tree.clone(),
        })
    }
}
