use crate::{
    capability::Source,
    context::{LogSink, SharedContext},
    error::GraphError,
    node::{FanOutNode, PendingNode, Search},
    sync::{AtomicBool, JoinHandle, Ordering, is_finished, relax, spawn_named},
    types::{HashSet, NodeId, Payload},
    utils::LockUnpoisoned,
};
use core::any::Any;
use derive_more::Debug;
use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};
use tracing::{debug, info, trace, warn};

/// Object-safe view of one tree of the forest.
pub trait Dag<Id>: core::fmt::Debug + Send + Sync {
    /// Identifier of the tree, i.e. of its source.
    fn id(&self) -> &Id;

    /// Whether `id` names a node attached beneath this tree.
    ///
    /// The tree's own identifier is not part of the descendant set; see
    /// [`Dag::claims`].
    fn contains(&self, id: &Id) -> bool;

    /// Whether `id` is this tree or one of its descendants.
    fn claims(&self, id: &Id) -> bool
    where
        Id: PartialEq,
    {
        self.id() == id || self.contains(id)
    }

    /// Pull one value from the source and propagate it through the tree.
    ///
    /// Returns once every node reached by the value has finished with it.
    fn push_once(&self);

    /// Whether this tree's pull loop is alive.
    fn is_running(&self) -> bool;

    /// Print the tree to the shared log sink.
    fn print(&self) -> io::Result<()>;
}

/// One source and the tree of nodes hanging off it.
///
/// A tree is *building* while it has no live pull loop and *running* while it
/// has one; nodes can only be attached while building. Dropping the tree stops
/// and joins its pull loop before the nodes are released.
#[must_use]
#[derive(Debug)]
pub struct Tree<T: Payload, Id: NodeId> {
    inner: Arc<TreeInner<T, Id>>,
    descendants: HashSet<Id>,
    #[debug(skip)]
    worker: Option<JoinHandle<()>>,
}

/// The part of a tree shared with its pull loop.
#[derive(Debug)]
struct TreeInner<T: Payload, Id: NodeId> {
    id: Id,
    #[debug(skip)]
    source: Mutex<Box<dyn Source<T>>>,
    root: FanOutNode<Id, T>,
    halted: AtomicBool,
    context: Arc<SharedContext>,
}

impl<T: Payload, Id: NodeId> TreeInner<T, Id> {
    fn push_once(&self) {
        let produced = self.source.lock_unpoisoned().produce();
        if produced.is_none() {
            trace!(tree = %self.id, "source produced nothing");
        }
        self.root.fan_out(produced, &self.context);
    }

    fn should_run(&self) -> bool {
        self.context.is_running() && !self.halted.load(Ordering::Acquire)
    }

    fn pull_loop(&self) {
        debug!(tree = %self.id, children = self.root.len(), "pull loop started");
        let mut activations = 0u64;
        while self.should_run() {
            self.push_once();
            activations += 1;
            relax();
        }
        debug!(tree = %self.id, activations, "pull loop exited");
    }
}

impl<T: Payload, Id: NodeId> Tree<T, Id> {
    pub(crate) fn new(id: Id, source: Box<dyn Source<T>>, context: Arc<SharedContext>) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                id,
                source: Mutex::new(source),
                root: FanOutNode::new(),
                halted: AtomicBool::new(false),
                context,
            }),
            descendants: HashSet::default(),
            worker: None,
        }
    }

    /// Push a caller-supplied value through the tree, bypassing the source.
    pub fn pump(&self, value: T) {
        self.inner.root.fan_out(Some(value), &self.inner.context);
    }

    /// Spawn the pull loop, replacing a previous one if any.
    ///
    /// A previous loop is halted and joined first, which waits for its
    /// current activation to finish. Nothing is spawned while the context is
    /// stopped, since the loop would exit before its first activation.
    pub(crate) fn start(&mut self) -> Result<(), GraphError<Id>> {
        self.halt();
        if !self.inner.context.is_running() {
            debug!(tree = %self.inner.id, "context stopped; pull loop not spawned");
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        inner.halted.store(false, Ordering::Release);
        let name = inner.context.thread_name(&inner.id);
        let handle = spawn_named(name, move || inner.pull_loop()).map_err(|err| GraphError::Spawn {
            tree: self.inner.id.clone(),
            reason: err.to_string(),
        })?;
        self.worker = Some(handle);
        info!(tree = %self.inner.id, "tree started");
        Ok(())
    }

    /// Stop this tree's pull loop and wait for it to exit.
    pub(crate) fn halt(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.inner.halted.store(true, Ordering::Release);
        if handle.join().is_err() {
            warn!(tree = %self.inner.id, "pull loop terminated by a panic");
        }
    }

    /// Graft `pending` beneath the node `onto`, or directly beneath the
    /// source when `onto` is the tree's own identifier.
    pub(crate) fn add_filter(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<(), GraphError<Id>> {
        if self.is_running() {
            return Err(GraphError::TreeRunning(self.inner.id.clone()));
        }
        // Reap a loop that already exited on its own.
        self.halt();
        let Self {
            inner,
            descendants,
            worker: _,
        } = self;
        if pending.id == inner.id || descendants.contains(&pending.id) {
            return Err(GraphError::DuplicateId(pending.id));
        }
        let tree_id = inner.id.clone();
        let Some(inner) = Arc::get_mut(inner) else {
            return Err(GraphError::TreeRunning(tree_id));
        };
        let id = pending.id.clone();
        if *onto == inner.id {
            inner.root.adopt(pending, &inner.id)?;
        } else if let Search::Missed(_) = inner.root.search(pending, onto)? {
            return Err(GraphError::ParentNotFound(onto.clone()));
        }
        debug!(tree = %tree_id, node = %id, parent = %onto, "attached");
        descendants.insert(id);
        Ok(())
    }

    pub(crate) fn print_into(&self, sink: &mut LogSink) -> io::Result<()> {
        let LogSink { out, indent } = sink;
        let step = indent.as_str();
        writeln!(out, "->{}", self.inner.id)?;
        self.inner.root.print(out.as_mut(), step, step)
    }

    /// Number of nodes attached beneath the source.
    pub fn len(&self) -> usize {
        self.descendants.len()
    }

    /// Whether nothing is attached beneath the source.
    pub fn is_empty(&self) -> bool {
        self.descendants.is_empty()
    }
}

impl<T: Payload, Id: NodeId> Dag<Id> for Tree<T, Id> {
    fn id(&self) -> &Id {
        &self.inner.id
    }

    fn contains(&self, id: &Id) -> bool {
        self.descendants.contains(id)
    }

    fn push_once(&self) {
        self.inner.push_once();
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !is_finished(handle))
    }

    fn print(&self) -> io::Result<()> {
        let mut sink = self.inner.context.log();
        self.print_into(&mut sink)?;
        sink.out.flush()
    }
}

impl<T: Payload, Id: NodeId> Drop for Tree<T, Id> {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Forest-side handle on a tree: the typed `Tree` behind object-safe
/// construction and control methods.
pub(crate) trait ForestEntry<Id: NodeId>: Dag<Id> {
    fn add_filter(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<(), GraphError<Id>>;
    fn start(&mut self) -> Result<(), GraphError<Id>>;
    fn halt(&mut self);
    fn print_into(&self, sink: &mut LogSink) -> io::Result<()>;
    fn produces(&self) -> &'static str;
    fn as_dag(&self) -> &dyn Dag<Id>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Payload, Id: NodeId> ForestEntry<Id> for Tree<T, Id> {
    fn add_filter(&mut self, pending: PendingNode<Id>, onto: &Id) -> Result<(), GraphError<Id>> {
        Tree::add_filter(self, pending, onto)
    }

    fn start(&mut self) -> Result<(), GraphError<Id>> {
        Tree::start(self)
    }

    fn halt(&mut self) {
        Tree::halt(self);
    }

    fn print_into(&self, sink: &mut LogSink) -> io::Result<()> {
        Tree::print_into(self, sink)
    }

    fn produces(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn as_dag(&self) -> &dyn Dag<Id> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
