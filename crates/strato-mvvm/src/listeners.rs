use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned when registering a listener, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callbacks in registration order.
///
/// Notification works on a snapshot, so a listener may add or remove
/// listeners while being called.
pub(crate) struct Listeners<L: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> Listeners<L> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(ListenerId, Arc<L>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Callback = dyn Fn() + Send + Sync;

    #[test]
    fn test_add_remove_and_snapshot() {
        let listeners: Listeners<Callback> = Listeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let first = listeners.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = calls.clone();
        listeners.add(Arc::new(move || {
            counter.fetch_add(10, Ordering::SeqCst);
        }));

        for listener in listeners.snapshot() {
            listener();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 11);

        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));
        assert_eq!(listeners.snapshot().len(), 1);
    }
}
