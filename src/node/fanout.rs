use crate::{
    context::SharedContext,
    error::GraphError,
    node::{Node, PendingNode, Search},
    types::{NodeId, Payload},
};
use derive_more::{Debug, Deref};
use std::io::{self, Write};
use tracing::trace;

/// Ordered children of a tree root or internal node.
///
/// The fan-out owns each value handed to it: children only ever see a shared
/// borrow, and the value is dropped by `fan_out` after the last child
/// returned. Dropping the fan-out drops the whole subtree.
#[must_use]
#[derive(Debug, Deref)]
pub(crate) struct FanOutNode<Id: NodeId, T> {
    #[deref]
    children: Vec<Box<dyn Node<Id, T>>>,
}

impl<Id: NodeId, T: Payload> FanOutNode<Id, T> {
    pub(crate) fn new() -> Self {
        Self { children: vec![] }
    }

    /// Deliver `value` to every child.
    ///
    /// Multi-threaded mode runs one pool task per child and waits for all of
    /// them; single-threaded mode runs them in registration order, each
    /// subtree depth-first. A single child always runs inline.
    pub(crate) fn fan_out(&self, value: Option<T>, context: &SharedContext) {
        self.deliver(value, context, false);
    }

    /// As [`FanOutNode::fan_out`], but a child whose turn comes after the
    /// context stopped is skipped. Used below internal nodes.
    pub(crate) fn relay(&self, value: T, context: &SharedContext) {
        self.deliver(Some(value), context, true);
    }

    fn deliver(&self, value: Option<T>, context: &SharedContext, gated: bool) {
        let Some(value) = value else {
            return;
        };
        let run = |child: &Box<dyn Node<Id, T>>| {
            if gated && !context.is_running() {
                trace!(node = %child.id(), "stopped; skipping child");
                return;
            }
            child.run_filter(&value, context);
        };
        match self.children.as_slice() {
            [] => {}
            [only] => run(only),
            children if context.is_single_threaded() => children.iter().for_each(run),
            children => {
                trace!(children = children.len(), "fanning out on the pool");
                context.pool().for_each(children, run);
            }
        }
        // Every child has returned: this is the single release of `value`.
        drop(value);
    }

    /// Append `pending` as a direct child, provided it consumes `T`.
    ///
    /// `owner` is the identifier of the node (or tree) owning this fan-out.
    pub(crate) fn adopt(&mut self, pending: PendingNode<Id>, owner: &Id) -> Result<(), GraphError<Id>> {
        let PendingNode { id: _, consumes, node } = pending;
        match node.downcast::<Box<dyn Node<Id, T>>>() {
            Ok(node) => {
                self.children.push(*node);
                Ok(())
            }
            Err(_) => Err(GraphError::TypeMismatch {
                parent: owner.clone(),
                produces: core::any::type_name::<T>(),
                consumes,
            }),
        }
    }

    /// Depth-first search of the children for the node `onto`.
    pub(crate) fn search(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<Search<Id>, GraphError<Id>> {
        let mut pending = pending;
        for child in &mut self.children {
            match child.attach(pending, onto)? {
                Search::Missed(returned) => pending = returned,
                Search::Attached => return Ok(Search::Attached),
            }
        }
        Ok(Search::Missed(pending))
    }

    /// Print each child at `indent`, its own children one `step` deeper.
    pub(crate) fn print(&self, out: &mut dyn Write, indent: &str, step: &str) -> io::Result<()> {
        let deeper = format!("{indent}{step}");
        for child in &self.children {
            writeln!(out, "{indent}->{}", child.id())?;
            child.print(out, &deeper, step)?;
        }
        Ok(())
    }
}
