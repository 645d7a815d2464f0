use core::num::NonZeroUsize;

/// Configuration entry-point for instantiating a `Manager`.
///
/// Everything here is fixed for the manager's lifetime except
/// `single_threaded` and `indent`, which can still be changed through the
/// manager afterwards.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Deliver every fan-out sequentially, depth-first, on the calling thread.
    pub single_threaded: bool,
    /// Indentation added per depth level by `print`.
    pub indent: String,
    /// Size of a dedicated fan-out pool. `None` shares rayon's global pool.
    pub worker_threads: Option<NonZeroUsize>,
    /// Name prefix for pull-loop and pool threads.
    pub thread_name_prefix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            single_threaded: false,
            indent: "  ".to_owned(),
            worker_threads: None,
            thread_name_prefix: "fdag".to_owned(),
        }
    }
}

impl ManagerConfig {
    /// Start in single-threaded mode.
    pub fn with_single_threaded(mut self, single_threaded: bool) -> Self {
        self.single_threaded = single_threaded;
        self
    }

    /// Replace the per-level print indentation.
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Run fan-outs on a dedicated pool of `threads` workers.
    pub fn with_worker_threads(mut self, threads: NonZeroUsize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Replace the thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}
