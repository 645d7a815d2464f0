use crate::{
    capability::{Source, Transform},
    config::ManagerConfig,
    context::{SharedContext, StopHandle},
    error::{GraphError, SetupError},
    node::PendingNode,
    sync::WorkerPool,
    tree::{Dag, ForestEntry, Tree},
    types::{IndexMap, NodeId, Payload},
};
use derive_more::Debug;
use std::{
    io::{self, Write},
    sync::Arc,
};
use tracing::info;

const FOREST_HEADER: &str = "------------DAG Forest-----------";
const FOREST_FOOTER: &str = "---------------------------------";

/// Owner of a forest of trees and of the context they share.
///
/// Key responsibilities:
/// - Creates root trees from sources and grafts transform nodes onto any
///   tree or node by identifier, rejecting absent capabilities, unknown
///   parents, duplicate identifiers and payload type mismatches before the
///   forest is touched.
/// - Starts, stops and joins the pull loops of every tree.
/// - Prints the forest to a replaceable log sink.
///
/// Dropping the manager stops the forest and joins every pull loop.
#[must_use]
#[derive(Debug)]
pub struct Manager<Id: NodeId> {
    context: Arc<SharedContext>,
    trees: IndexMap<Id, Box<dyn ForestEntry<Id>>>,
}

impl<Id: NodeId> Default for Manager<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: NodeId> Manager<Id> {
    /// A running, multi-threaded manager sharing rayon's global pool.
    pub fn new() -> Self {
        let context = SharedContext::new(&ManagerConfig::default(), WorkerPool::global());
        Self::from_context(context)
    }

    /// Build a manager from an explicit configuration.
    ///
    /// # Errors
    /// If a dedicated worker pool was requested and could not be built.
    pub fn with_config(config: &ManagerConfig) -> Result<Self, SetupError> {
        let pool = match config.worker_threads {
            Some(threads) => WorkerPool::dedicated(threads.get(), &config.thread_name_prefix)?,
            None => WorkerPool::global(),
        };
        Ok(Self::from_context(SharedContext::new(config, pool)))
    }

    fn from_context(context: SharedContext) -> Self {
        Self {
            context: Arc::new(context),
            trees: IndexMap::default(),
        }
    }

    /// Create a tree rooted at `source`, optionally starting its pull loop.
    ///
    /// # Errors
    /// `DuplicateId` if `id` is already in the forest, `Spawn` if the pull
    /// loop could not be started.
    pub fn add_dag<T, S>(&mut self, id: Id, source: S, autostart: bool) -> Result<(), GraphError<Id>>
    where
        T: Payload,
        S: Source<T> + 'static,
    {
        self.add_boxed_dag(id, Some(Box::new(source)), autostart)
    }

    /// Type-erased form of [`Manager::add_dag`] for builders that construct
    /// capabilities dynamically and may come back empty-handed.
    ///
    /// # Errors
    /// `NullCapability` if `source` is `None`, otherwise as `add_dag`.
    pub fn add_boxed_dag<T: Payload>(
        &mut self,
        id: Id,
        source: Option<Box<dyn Source<T>>>,
        autostart: bool,
    ) -> Result<(), GraphError<Id>> {
        let Some(source) = source else {
            return Err(GraphError::NullCapability(id));
        };
        if self.contains(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        let mut tree = Tree::new(id.clone(), source, Arc::clone(&self.context));
        if autostart {
            tree.start()?;
        }
        info!(tree = %id, payload = core::any::type_name::<T>(), autostart, "tree created");
        self.trees.insert(id, Box::new(tree));
        Ok(())
    }

    /// Attach `transform` as node `id` beneath the tree or node `onto`.
    ///
    /// The payload produced by `onto` must be `In`.
    ///
    /// # Errors
    /// `ParentNotFound`, `DuplicateId`, `TypeMismatch`, or `TreeRunning` when
    /// the owning tree has a live pull loop.
    pub fn add_node<In, Out, F>(&mut self, id: Id, transform: F, onto: Id) -> Result<(), GraphError<Id>>
    where
        In: Payload,
        Out: Payload,
        F: Transform<In, Out> + 'static,
    {
        self.add_boxed_node(id, Some(Box::new(transform)), onto)
    }

    /// Type-erased form of [`Manager::add_node`].
    ///
    /// # Errors
    /// `NullCapability` if `transform` is `None`, otherwise as `add_node`.
    pub fn add_boxed_node<In: Payload, Out: Payload>(
        &mut self,
        id: Id,
        transform: Option<Box<dyn Transform<In, Out>>>,
        onto: Id,
    ) -> Result<(), GraphError<Id>> {
        let Some(transform) = transform else {
            return Err(GraphError::NullCapability(id));
        };
        if self.contains(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        let Some(tree) = self.trees.values_mut().find(|tree| tree.claims(&onto)) else {
            return Err(GraphError::ParentNotFound(onto));
        };
        tree.add_filter(PendingNode::new(id, transform), &onto)
    }

    /// Whether `id` is a tree or a node anywhere in the forest.
    pub fn contains(&self, id: &Id) -> bool {
        self.trees.values().any(|tree| tree.claims(id))
    }

    /// Number of trees in the forest.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether the forest has no trees.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Trees in creation order.
    pub fn trees(&self) -> impl Iterator<Item = &dyn Dag<Id>> {
        self.trees.values().map(|tree| tree.as_dag())
    }

    /// Typed access to the tree rooted at `id`, if its payload is `T`.
    pub fn tree<T: Payload>(&self, id: &Id) -> Option<&Tree<T, Id>> {
        self.trees.get(id)?.as_any().downcast_ref()
    }

    /// Run one activation of the tree rooted at `id` on the calling thread.
    ///
    /// # Errors
    /// `UnknownTree` if no tree is rooted at `id`.
    pub fn push_once(&self, id: &Id) -> Result<(), GraphError<Id>> {
        let tree = self
            .trees
            .get(id)
            .ok_or_else(|| GraphError::UnknownTree(id.clone()))?;
        tree.push_once();
        Ok(())
    }

    /// Run one activation of every tree, in creation order.
    pub fn push_all_once(&self) {
        for tree in self.trees.values() {
            tree.push_once();
        }
    }

    /// Push `value` through the tree rooted at `id`, skipping its source.
    ///
    /// # Errors
    /// `UnknownTree` if no tree is rooted at `id`, `TypeMismatch` if the
    /// tree does not carry `T`.
    pub fn pump<T: Payload>(&self, id: &Id, value: T) -> Result<(), GraphError<Id>> {
        let entry = self
            .trees
            .get(id)
            .ok_or_else(|| GraphError::UnknownTree(id.clone()))?;
        let Some(tree) = entry.as_any().downcast_ref::<Tree<T, Id>>() else {
            return Err(GraphError::TypeMismatch {
                parent: id.clone(),
                produces: entry.produces(),
                consumes: core::any::type_name::<T>(),
            });
        };
        tree.pump(value);
        Ok(())
    }

    /// Mark the forest running and (re)spawn the pull loop of every tree.
    ///
    /// A tree whose loop is already alive is halted and restarted, which
    /// waits for its current activation.
    ///
    /// # Errors
    /// `Spawn` if a pull loop could not be started; trees before it in
    /// creation order are already running.
    pub fn start(&mut self) -> Result<(), GraphError<Id>> {
        self.context.set_running(true);
        for tree in self.trees.values_mut() {
            tree.start()?;
        }
        info!(trees = self.trees.len(), "forest started");
        Ok(())
    }

    /// Ask every pull loop to exit after its current activation and every
    /// node to drop the results it produces from now on.
    ///
    /// Does not wait; see [`Manager::shutdown`].
    pub fn stop(&self) {
        self.context.set_running(false);
    }

    /// Stop the forest and join every pull loop, returning all trees to the
    /// building state.
    pub fn shutdown(&mut self) {
        self.stop();
        for tree in self.trees.values_mut() {
            tree.halt();
        }
        info!(trees = self.trees.len(), "forest shut down");
    }

    /// Whether the forest is marked running.
    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    /// A handle that can call [`Manager::stop`] from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.context))
    }

    /// Switch every fan-out between sequential and pooled delivery.
    pub fn run_single_threaded(&self, single_threaded: bool) {
        self.context.set_single_threaded(single_threaded);
    }

    /// Redirect `print` output.
    pub fn set_log_sink(&self, sink: impl Write + Send + 'static) {
        self.context.set_log_sink(Box::new(sink));
    }

    /// Replace the per-level print indentation.
    pub fn set_indent(&self, indent: impl Into<String>) {
        self.context.set_indent(indent.into());
    }

    /// Print every tree between a header and a footer.
    ///
    /// # Errors
    /// Whatever the log sink reports.
    pub fn print_all(&self) -> io::Result<()> {
        let mut sink = self.context.log();
        writeln!(sink.out)?;
        writeln!(sink.out, "{FOREST_HEADER}")?;
        for tree in self.trees.values() {
            tree.print_into(&mut sink)?;
        }
        writeln!(sink.out, "{FOREST_FOOTER}")?;
        sink.out.flush()
    }

    /// Drop every tree, joining each pull loop.
    ///
    /// Trees are halted individually, so this returns even while the forest
    /// is marked running.
    pub fn clear(&mut self) {
        self.trees.clear();
    }
}

impl<Id: NodeId> Drop for Manager<Id> {
    fn drop(&mut self) {
        self.stop();
        self.clear();
    }
}
