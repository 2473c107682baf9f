// Registry - handle table behind the numeric handles given to the host
//
// Handles start at 1 and are never reused, so a stale handle can only ever
// miss. Entries are Arc<Mutex<T>> so a frame can be drawn without holding
// the table lock.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque id handed across the C boundary; 0 is never issued.
pub type Handle = u64;

pub struct Registry<T> {
    next: Handle,
    entries: BTreeMap<Handle, Arc<Mutex<T>>>,
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Self {
            next: 1,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> Handle {
        let handle = self.next;
        self.next += 1;
        self.entries.insert(handle, Arc::new(Mutex::new(value)));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        self.entries.get(&handle).cloned()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        self.entries.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_nonzero_and_unique() {
        let mut registry = Registry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");

        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(*registry.get(a).unwrap().lock(), "a");
        assert_eq!(*registry.get(b).unwrap().lock(), "b");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removed_handles_are_not_reissued() {
        let mut registry = Registry::new();
        let first = registry.insert(1);
        assert!(registry.remove(first).is_some());
        assert!(registry.get(first).is_none());
        assert!(registry.remove(first).is_none());

        let second = registry.insert(2);
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert!(!registry.is_empty());
    }

    #[test]
    fn unknown_handles_miss() {
        let registry: Registry<()> = Registry::default();
        assert!(registry.get(0).is_none());
        assert!(registry.get(42).is_none());
    }

    #[test]
    fn removed_entry_outlives_table_while_borrowed() {
        let mut registry = Registry::new();
        let handle = registry.insert(vec![1, 2, 3]);

        let in_use = registry.get(handle).unwrap();
        drop(registry.remove(handle));

        assert_eq!(in_use.lock().len(), 3);
    }
}
