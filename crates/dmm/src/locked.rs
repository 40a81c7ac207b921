//! A heap shared between threads behind a spin lock.

use spin::{Mutex, MutexGuard};

use crate::{Heap, HeapConfig, HeapPtr, HeapStats, InvariantViolation};

/// A [`Heap`] whose operations are serialized by one lock.
///
/// Suitable for a `static`:
///
/// ```
/// use dmm::{HeapConfig, LockedHeap};
///
/// static HEAP: LockedHeap = LockedHeap::new(HeapConfig::DEFAULT);
///
/// let ptr = HEAP.allocate(32).unwrap();
/// HEAP.with_payload_mut(ptr, |bytes| bytes.fill(0xAB));
/// HEAP.free(ptr);
/// ```
pub struct LockedHeap {
    heap: Mutex<Heap>,
}

impl Default for LockedHeap {
    fn default() -> Self {
        Self::new(HeapConfig::DEFAULT)
    }
}

impl LockedHeap {
    #[must_use]
    pub const fn new(config: HeapConfig) -> Self {
        Self {
            heap: Mutex::new(Heap::new(config)),
        }
    }

    /// Locks the heap for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock()
    }

    /// See [`Heap::allocate`].
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn allocate(&self, size: usize) -> Option<HeapPtr> {
        self.lock().allocate(size)
    }

    /// See [`Heap::free`].
    pub fn free(&self, ptr: HeapPtr) {
        self.lock().free(ptr);
    }

    /// Runs `f` on the payload of `ptr` while holding the lock.
    ///
    /// # Panics
    ///
    /// Panics if the heap is not initialized.
    pub fn with_payload_mut<F, T>(&self, ptr: HeapPtr, f: F) -> T
    where
        F: FnOnce(&mut [u8]) -> T,
    {
        f(self.lock().payload_mut(ptr))
    }

    /// See [`Heap::check`].
    pub fn check(&self) -> Result<HeapStats, InvariantViolation> {
        self.lock().check()
    }
}
