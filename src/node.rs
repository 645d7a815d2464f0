mod fanout;
mod internal;

pub(crate) use crate::node::{fanout::FanOutNode, internal::InternalNode};
use crate::{
    capability::Transform,
    context::SharedContext,
    error::GraphError,
    types::{NodeId, Payload},
};
use core::{any::Any, fmt::Debug};
use std::io::{self, Write};

/// Object-safe view of an internal node, keyed by the type it consumes.
///
/// A fan-out producing `In` owns its children as `Box<dyn Node<Id, In>>`;
/// everything below that boundary (the node's own output type and its
/// children) is hidden behind the trait.
pub(crate) trait Node<Id: NodeId, In>: Debug + Send + Sync {
    fn id(&self) -> &Id;

    /// Apply the transform to `input` and propagate the result to the
    /// children, unless the transform pruned it or the context stopped.
    fn run_filter(&self, input: &In, context: &SharedContext);

    /// Try to graft `pending` onto the node `onto` somewhere in this subtree.
    fn attach(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<Search<Id>, GraphError<Id>>;

    /// Print the subtree below this node, starting at `indent`.
    fn print(&self, out: &mut dyn Write, indent: &str, step: &str) -> io::Result<()>;
}

/// A constructed node travelling through the attach search.
///
/// The node is stored as `Box<dyn Node<Id, In>>` behind `Any`, so the parent
/// that finally adopts it can check `In` against its own output type.
pub(crate) struct PendingNode<Id> {
    pub(crate) id: Id,
    consumes: &'static str,
    node: Box<dyn Any + Send>,
}

impl<Id: NodeId> PendingNode<Id> {
    pub(crate) fn new<In, Out>(id: Id, transform: Box<dyn Transform<In, Out>>) -> Self
    where
        In: Payload,
        Out: Payload,
    {
        let node: Box<dyn Node<Id, In>> = Box::new(InternalNode::new(id.clone(), transform));
        Self {
            id,
            consumes: core::any::type_name::<In>(),
            node: Box::new(node),
        }
    }
}

/// Outcome of searching one subtree for the attach point.
///
/// A miss hands the pending node back so the caller can try the next sibling.
pub(crate) enum Search<Id> {
    Attached,
    Missed(PendingNode<Id>),
}
