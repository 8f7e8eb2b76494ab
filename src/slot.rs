//! Shared mutable cells for late-bound responses.

use std::sync::{Arc, Mutex, PoisonError};

/// A value owned outside the handler queue and read when a handler runs.
///
/// Clones share the same value. A test keeps one clone, a handler built
/// with [`respond_with_slot`](crate::respond_with_slot) keeps another, and
/// every [`set`](Slot::set) before a request changes what that request gets.
#[derive(Debug, Default)]
pub struct Slot<T> {
    value: Arc<Mutex<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self { value: Arc::clone(&self.value) }
    }
}

impl<T> Slot<T> {
    pub fn new(value: T) -> Self {
        Self { value: Arc::new(Mutex::new(value)) }
    }

    pub fn set(&self, value: T) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.lock().unwrap_or_else(PoisonError::into_inner), value)
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}
