#[cfg(feature = "loom")]
mod imp {
    use crate::error::SetupError;
    pub(crate) use loom::{
        sync::atomic::{AtomicBool, Ordering},
        thread::JoinHandle,
    };

    pub(crate) fn spawn_named<F>(_name: String, f: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        Ok(loom::thread::spawn(f))
    }

    /// loom handles cannot be polled; a loop counts as alive until joined.
    pub(crate) fn is_finished(_handle: &JoinHandle<()>) -> bool {
        false
    }

    /// Lets the model scheduler switch away from a spinning pull loop.
    pub(crate) fn relax() {
        loom::thread::yield_now();
    }

    /// Under `loom` every fan-out runs inline on the calling thread.
    #[derive(Debug)]
    pub(crate) struct WorkerPool;

    impl WorkerPool {
        pub(crate) fn global() -> Self {
            Self
        }

        pub(crate) fn dedicated(_threads: usize, _prefix: &str) -> Result<Self, SetupError> {
            Ok(Self)
        }

        pub(crate) fn for_each<C, F>(&self, items: &[C], f: F)
        where
            C: Sync,
            F: Fn(&C) + Sync,
        {
            items.iter().for_each(f);
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    use crate::error::SetupError;
    pub(crate) use core::sync::atomic::{AtomicBool, Ordering};
    pub(crate) use std::thread::JoinHandle;

    pub(crate) fn spawn_named<F>(name: String, f: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        std::thread::Builder::new().name(name).spawn(f)
    }

    pub(crate) fn is_finished(handle: &JoinHandle<()>) -> bool {
        handle.is_finished()
    }

    #[inline]
    pub(crate) fn relax() {}

    /// Pool that runs the per-child tasks of a multi-threaded fan-out.
    #[derive(Debug)]
    pub(crate) enum WorkerPool {
        /// rayon's process-wide pool.
        Global,
        /// A pool owned by one manager.
        Dedicated(rayon::ThreadPool),
    }

    impl WorkerPool {
        pub(crate) fn global() -> Self {
            Self::Global
        }

        pub(crate) fn dedicated(threads: usize, prefix: &str) -> Result<Self, SetupError> {
            let prefix = prefix.to_owned();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(move |idx| format!("{prefix}-pool-{idx}"))
                .build()
                .map_err(|err| SetupError::Pool(err.to_string()))?;
            Ok(Self::Dedicated(pool))
        }

        /// Runs `f` once per item on the pool and returns only after every
        /// call has finished.
        ///
        /// Nested calls from inside a pool task run on the same pool, so a
        /// deep tree never grows the number of OS threads.
        pub(crate) fn for_each<C, F>(&self, items: &[C], f: F)
        where
            C: Sync,
            F: Fn(&C) + Sync,
        {
            let f = &f;
            match self {
                Self::Global => rayon::scope(|scope| {
                    for item in items {
                        scope.spawn(move |_| f(item));
                    }
                }),
                Self::Dedicated(pool) => pool.scope(|scope| {
                    for item in items {
                        scope.spawn(move |_| f(item));
                    }
                }),
            }
        }
    }
}

pub(crate) use imp::*;
