use crate::{
    capability::Transform,
    context::SharedContext,
    error::GraphError,
    node::{FanOutNode, Node, PendingNode, Search},
    types::{NodeId, Payload},
};
use derive_more::Debug;
use std::io::{self, Write};
use tracing::trace;

/// Binds an identifier and a transform to the fan-out of its own children.
///
/// This is where the type erasure of the search ends: the node is reached as
/// `dyn Node<Id, In>` but runs its transform and children fully typed.
#[must_use]
#[derive(Debug)]
pub(crate) struct InternalNode<Id: NodeId, In, Out> {
    id: Id,
    #[debug(skip)]
    transform: Box<dyn Transform<In, Out>>,
    children: FanOutNode<Id, Out>,
}

impl<Id: NodeId, In: Payload, Out: Payload> InternalNode<Id, In, Out> {
    pub(crate) fn new(id: Id, transform: Box<dyn Transform<In, Out>>) -> Self {
        Self {
            id,
            transform,
            children: FanOutNode::new(),
        }
    }
}

impl<Id: NodeId, In: Payload, Out: Payload> Node<Id, In> for InternalNode<Id, In, Out> {
    fn id(&self) -> &Id {
        &self.id
    }

    fn run_filter(&self, input: &In, context: &SharedContext) {
        let Self {
            id,
            transform,
            children,
        } = self;
        let Some(output) = transform.apply(input) else {
            trace!(node = %id, "pruned");
            return;
        };
        if !context.is_running() {
            trace!(node = %id, "stopped; dropping late result");
            return;
        }
        children.relay(output, context);
    }

    fn attach(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<Search<Id>, GraphError<Id>> {
        let Self { id, children, .. } = self;
        if id == onto {
            children.adopt(pending, id)?;
            return Ok(Search::Attached);
        }
        children.search(pending, onto)
    }

    fn print(&self, out: &mut dyn Write, indent: &str, step: &str) -> io::Result<()> {
        self.children.print(out, indent, step)
    }
}
