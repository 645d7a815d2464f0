use crate::{
    config::ManagerConfig,
    sync::{AtomicBool, Ordering, WorkerPool},
    utils::LockUnpoisoned,
};
use derive_more::Debug;
use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

/// State shared by every tree and node of one manager.
///
/// Trees hold it behind an `Arc`; nodes receive it by reference for the
/// duration of each activation. `running` is the only shutdown signal and it
/// is advisory: nothing in flight is interrupted when it flips.
#[derive(Debug)]
pub(crate) struct SharedContext {
    running: AtomicBool,
    single_threaded: AtomicBool,
    #[debug(skip)]
    log: Mutex<LogSink>,
    thread_name_prefix: String,
    pool: WorkerPool,
}

/// Destination of `print` output together with the per-level indentation.
pub(crate) struct LogSink {
    pub(crate) out: Box<dyn Write + Send>,
    pub(crate) indent: String,
}

impl SharedContext {
    pub(crate) fn new(config: &ManagerConfig, pool: WorkerPool) -> Self {
        let ManagerConfig {
            single_threaded,
            indent,
            worker_threads: _,
            thread_name_prefix,
        } = config;
        Self {
            running: AtomicBool::new(true),
            single_threaded: AtomicBool::new(*single_threaded),
            log: Mutex::new(LogSink {
                out: Box::new(io::stdout()),
                indent: indent.clone(),
            }),
            thread_name_prefix: thread_name_prefix.clone(),
            pool,
        }
    }

    /// Whether pull loops keep pulling and nodes keep propagating.
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether fan-outs are delivered sequentially on the calling thread.
    pub(crate) fn is_single_threaded(&self) -> bool {
        self.single_threaded.load(Ordering::Relaxed)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn set_single_threaded(&self, single_threaded: bool) {
        self.single_threaded
            .store(single_threaded, Ordering::Relaxed);
    }

    pub(crate) fn set_log_sink(&self, out: Box<dyn Write + Send>) {
        self.log.lock_unpoisoned().out = out;
    }

    pub(crate) fn set_indent(&self, indent: String) {
        self.log.lock_unpoisoned().indent = indent;
    }

    /// Holds the sink for a whole print so concurrent prints never interleave.
    pub(crate) fn log(&self) -> MutexGuard<'_, LogSink> {
        self.log.lock_unpoisoned()
    }

    pub(crate) fn thread_name(&self, tree: impl core::fmt::Display) -> String {
        format!("{}-{tree}", self.thread_name_prefix)
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

/// Cloneable handle that can stop a forest from any thread.
///
/// Useful inside a `Source` or `Transform` that decides the stream is over.
#[derive(Debug, Clone)]
pub struct StopHandle(pub(crate) Arc<SharedContext>);

impl StopHandle {
    /// Ask every pull loop to exit after its current activation and every
    /// node to drop results produced from now on.
    pub fn stop(&self) {
        let Self(context) = self;
        context.set_running(false);
    }

    /// Whether the forest is still marked running.
    pub fn is_running(&self) -> bool {
        let Self(context) = self;
        context.is_running()
    }
}
