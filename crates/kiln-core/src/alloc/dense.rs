//! Packed per-type component storage addressed through [`Handle`]s.

use std::fmt;

use crate::alloc::handle::Handle;
use crate::profiling::profile_function;

const ABSENT: u32 = u32::MAX;

/// Callback invoked with a component's value right before it leaves the store.
pub type DestructionCallback<T> = Box<dyn FnMut(&T) + Send>;

/// A dense array of `T` with an index-addressed sparse lookup.
///
/// Values live contiguously in insertion order until a removal swaps the
/// last value into the hole, so [`raw_data`](Self::raw_data) is always a gap-free
/// slice suitable for per-frame bulk iteration.
///
/// The store has no internal locking; it belongs to whichever subsystem
/// created it.
pub struct DenseComponentStore<T> {
    data: Vec<T>,
    /// `handle.index()` -> slot in `data`, or `ABSENT`.
    sparse: Vec<u32>,
    /// slot in `data` -> owning handle.
    owners: Vec<Handle>,
    on_destroy: Option<DestructionCallback<T>>,
}

impl<T> Default for DenseComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DenseComponentStore<T> {
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            sparse: Vec::new(),
            owners: Vec::new(),
            on_destroy: None,
        }
    }

    /// Install a callback run on every value removed by [`remove`](Self::remove),
    /// [`clear`](Self::clear) or drop.
    pub fn set_destruction_callback(&mut self, callback: impl FnMut(&T) + Send + 'static) {
        self.on_destroy = Some(Box::new(callback));
    }

    fn slot(&self, handle: Handle) -> Option<usize> {
        let slot = *self.sparse.get(handle.index() as usize)?;
        if slot == ABSENT || self.owners[slot as usize] != handle {
            return None;
        }
        Some(slot as usize)
    }

    /// Attach `value` to `handle`.
    ///
    /// The handle must not already have a value (debug assertion; release
    /// builds ignore the call).
    pub fn add(&mut self, handle: Handle, value: T) {
        profile_function!();
        debug_assert!(handle.is_valid(), "adding a component to the invalid handle");
        debug_assert!(!self.contains(handle), "{handle:?} already has a component");
        if self.contains(handle) {
            return;
        }

        let index = handle.index() as usize;
        if self.sparse.len() <= index {
            self.sparse.resize(index + 1, ABSENT);
        }
        self.sparse[index] = self.data.len() as u32;
        self.data.push(value);
        self.owners.push(handle);
    }

    /// Detach and destroy the value owned by `handle`.
    ///
    /// The last value is moved into the freed slot. The handle must be present
    /// (debug assertion; release builds ignore the call).
    pub fn remove(&mut self, handle: Handle) {
        profile_function!();
        let slot = self.slot(handle);
        debug_assert!(slot.is_some(), "{handle:?} has no component to remove");
        let Some(slot) = slot else {
            return;
        };

        if let Some(on_destroy) = self.on_destroy.as_mut() {
            on_destroy(&self.data[slot]);
        }

        self.sparse[handle.index() as usize] = ABSENT;
        self.data.swap_remove(slot);
        self.owners.swap_remove(slot);

        if slot < self.data.len() {
            let moved = self.owners[slot];
            self.sparse[moved.index() as usize] = slot as u32;
        }
    }

    /// O(1). Indices beyond the lookup table are simply absent.
    pub fn contains(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    /// The value owned by `handle`.
    ///
    /// # Panics
    ///
    /// Debug builds assert that the handle is present. Release builds skip
    /// the ownership check and index straight through the lookup table.
    pub fn get(&self, handle: Handle) -> &T {
        debug_assert!(self.contains(handle), "{handle:?} has no component");
        &self.data[self.sparse[handle.index() as usize] as usize]
    }

    /// Mutable counterpart of [`get`](Self::get), with the same contract.
    pub fn get_mut(&mut self, handle: Handle) -> &mut T {
        debug_assert!(self.contains(handle), "{handle:?} has no component");
        let slot = self.sparse[handle.index() as usize] as usize;
        &mut self.data[slot]
    }

    pub fn try_get(&self, handle: Handle) -> Option<&T> {
        self.slot(handle).map(|slot| &self.data[slot])
    }

    pub fn try_get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slot(handle).map(|slot| &mut self.data[slot])
    }

    /// The packed values. Order is stable until the next `add`/`remove`.
    pub fn raw_data(&self) -> &[T] {
        &self.data
    }

    pub fn raw_data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Owners of [`raw_data`](Self::raw_data), slot for slot.
    pub fn owners(&self) -> &[Handle] {
        &self.owners
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.owners.iter().copied().zip(self.data.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.owners.iter().copied().zip(self.data.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Destroy every value and drop the lookup tables.
    pub fn clear(&mut self) {
        profile_function!();
        if let Some(on_destroy) = self.on_destroy.as_mut() {
            for value in &self.data {
                on_destroy(value);
            }
        }

        self.data.clear();
        self.sparse.clear();
        self.owners.clear();
    }
}

impl<T> Drop for DenseComponentStore<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for DenseComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::alloc::handle::HandleAllocator;

    #[test]
    fn test_add_and_get() {
        let mut handles = HandleAllocator::new();
        let mut store = DenseComponentStore::new();

        let a = handles.allocate();
        let b = handles.allocate();
        store.add(b, "b");
        store.add(a, "a");

        assert_eq!(*store.get(a), "a");
        assert_eq!(*store.get(b), "b");
        assert_eq!(store.raw_data(), &["b", "a"]);
        assert_eq!(store.owners(), &[b, a]);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut handles = HandleAllocator::new();
        let mut store = DenseComponentStore::new();

        let a = handles.allocate();
        let b = handles.allocate();
        store.add(a, 1);
        store.add(b, 2);
        store.remove(b);

        assert!(!store.contains(b));
        assert_eq!(store.raw_data(), &[1]);
        assert_eq!(*store.get(a), 1);
    }

    #[test]
    fn test_contains_out_of_range() {
        let store = DenseComponentStore::<u8>::new();
        assert!(!store.contains(Handle::new(1000, 1)));
        assert!(store.try_get(Handle::new(1000, 1)).is_none());
    }

    #[test]
    fn test_stale_generation_is_absent() {
        let mut handles = HandleAllocator::new();
        let mut store = DenseComponentStore::new();

        let old = handles.allocate();
        store.add(old, 10);
        store.remove(old);
        handles.release(old);

        let new = handles.allocate();
        assert_eq!(new.index(), old.index());
        store.add(new, 20);

        assert!(!store.contains(old));
        assert_eq!(store.try_get(new), Some(&20));
    }

    #[test]
    fn test_destruction_callback() {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let mut handles = HandleAllocator::new();
        let mut store = DenseComponentStore::new();
        let sink = Arc::clone(&destroyed);
        store.set_destruction_callback(move |v: &u32| sink.lock().push(*v));

        let a = handles.allocate();
        let b = handles.allocate();
        let c = handles.allocate();
        store.add(a, 1);
        store.add(b, 2);
        store.add(c, 3);

        store.remove(b);
        assert_eq!(*destroyed.lock(), vec![2]);

        store.clear();
        assert_eq!(*destroyed.lock(), vec![2, 1, 3]);
        assert!(store.is_empty());
        assert!(!store.contains(a));
    }

    #[test]
    fn test_drop_runs_callback() {
        let destroyed = Arc::new(Mutex::new(0));
        {
            let mut store = DenseComponentStore::new();
            let sink = Arc::clone(&destroyed);
            store.set_destruction_callback(move |_: &u8| *sink.lock() += 1);
            store.add(Handle::new(0, 1), 0);
            store.add(Handle::new(1, 1), 0);
        }
        assert_eq!(*destroyed.lock(), 2);
    }

    #[test]
    #[should_panic(expected = "already has a component")]
    #[cfg(debug_assertions)]
    fn test_double_add_asserts() {
        let mut store = DenseComponentStore::new();
        let handle = Handle::new(0, 1);
        store.add(handle, 1);
        store.add(handle, 2);
    }

    #[test]
    fn test_iter_mut() {
        let mut store = DenseComponentStore::new();
        store.add(Handle::new(0, 1), 1);
        store.add(Handle::new(5, 1), 2);
        for (_, value) in store.iter_mut() {
            *value *= 10;
        }
        assert_eq!(store.raw_data(), &[10, 20]);
    }
}
