use thiserror::Error;

/// Error returned by the construction and control operations of a forest.
///
/// Every variant is produced before the forest is touched: an operation that
/// fails leaves trees, nodes and identifier sets exactly as they were.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError<Id> {
    /// The source or transform handed to a constructor was absent.
    #[error("capability for `{0}` is absent")]
    NullCapability(Id),
    /// No tree or node in the forest carries the requested parent identifier.
    #[error("parent `{0}` was not found in the forest")]
    ParentNotFound(Id),
    /// The identifier is already registered somewhere in the forest.
    #[error("identifier `{0}` is already registered")]
    DuplicateId(Id),
    /// The parent's output type differs from the input type of the node (or
    /// value) being attached to it.
    #[error("`{parent}` produces `{produces}` but `{consumes}` was offered")]
    TypeMismatch {
        /// Identifier of the node whose output was checked.
        parent: Id,
        /// Output type of `parent`.
        produces: &'static str,
        /// Input type of the rejected node or value.
        consumes: &'static str,
    },
    /// The tree owning the parent has a live pull loop.
    #[error("tree `{0}` is running; shut it down before attaching")]
    TreeRunning(Id),
    /// No root tree carries the identifier.
    #[error("no tree is rooted at `{0}`")]
    UnknownTree(Id),
    /// The OS refused to spawn a pull-loop thread.
    #[error("failed to spawn the pull loop of `{tree}`: {reason}")]
    Spawn {
        /// Tree whose pull loop could not start.
        tree: Id,
        /// OS error description.
        reason: String,
    },
}

/// Error returned by `Manager::with_config`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SetupError {
    /// The dedicated fan-out pool could not be built.
    #[error("failed to build the fan-out worker pool: {0}")]
    Pool(String),
}
