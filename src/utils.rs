use std::sync::{Mutex, MutexGuard, PoisonError};

/// A panic inside a caller-supplied capability must not wedge the rest of the
/// forest, so poisoned locks are entered anyway.
pub(crate) trait LockUnpoisoned<T: ?Sized> {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T>;
}

impl<T: ?Sized> LockUnpoisoned<T> for Mutex<T> {
    #[inline]
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
