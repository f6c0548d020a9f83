//! Listener registry
//!
//! One-to-many fan-out: listeners are kept in registration order and invoked
//! synchronously on the publishing thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Shared by every registry so ids from different feeds never collide.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned by [`Registry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of boxed listeners of type `T`
pub struct Registry<T: ?Sized> {
    listeners: Vec<(SubscriptionId, Box<T>)>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<T>) -> SubscriptionId {
        let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; `false` if the id was unknown or already removed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Invoke `f` on every listener in registration order
    pub fn dispatch<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for (_, listener) in self.listeners.iter_mut() {
            f(&mut **listener);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
