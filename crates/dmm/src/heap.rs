//! The allocator context: lazy initialization, allocation and release.

use core::num::NonZeroUsize;

use log::{debug, trace, warn};
use snafu::{ResultExt as _, Snafu};
use snafu_utils::{HasLocation, Location};

use crate::{
    config::HeapConfig,
    free_list::FreeList,
    region::{HeapRegion, ReserveError},
};

/// Handle to an allocated payload.
///
/// This is the byte offset of the payload from the start of the heap region.
/// It is never zero because every payload is preceded by a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{:#x}", _0)]
pub struct HeapPtr(NonZeroUsize);

impl HeapPtr {
    /// Offset of the payload from the start of the heap region.
    #[must_use]
    pub fn offset(self) -> usize {
        self.0.get()
    }
}

#[derive(Debug, Snafu)]
pub enum InitError {
    #[snafu(display("failed to reserve the heap region"))]
    Reserve {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: ReserveError,
    },
    #[snafu(display("heap region reservation failed earlier and is not retried"))]
    PreviouslyFailed {
        #[snafu(implicit)]
        location: Location,
    },
}

impl HasLocation for InitError {
    fn location(&self) -> Location {
        match self {
            Self::Reserve { location, .. } | Self::PreviouslyFailed { location } => *location,
        }
    }
}

#[derive(derive_more::IsVariant)]
enum HeapState {
    Uninit,
    Ready(FreeList),
    Failed,
}

/// A first-fit free-list allocator over one fixed-size region.
///
/// The region is reserved lazily by the first [`allocate`](Self::allocate)
/// (or an explicit [`init`](Self::init)) and never grows. All operations take
/// `&mut self`; share a heap between threads through
/// [`LockedHeap`](crate::LockedHeap).
pub struct Heap {
    config: HeapConfig,
    state: HeapState,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::DEFAULT)
    }
}

impl Heap {
    /// Creates a heap that will reserve its region on first use.
    #[must_use]
    pub const fn new(config: HeapConfig) -> Self {
        Self {
            config,
            state: HeapState::Uninit,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.is_ready()
    }

    /// Reserves the heap region and installs one free block spanning it.
    ///
    /// Does nothing if the heap is already initialized. A failed reservation
    /// is remembered: later calls return [`InitError::PreviouslyFailed`]
    /// until the heap is [`reset`](Self::reset).
    pub fn init(&mut self) -> Result<(), InitError> {
        match self.state {
            HeapState::Ready(_) => return Ok(()),
            HeapState::Failed => return PreviouslyFailedSnafu.fail(),
            HeapState::Uninit => {}
        }

        let bytes = self.config.reserved_bytes();
        let region = match HeapRegion::reserve(bytes).context(ReserveSnafu) {
            Ok(region) => region,
            Err(err) => {
                self.state = HeapState::Failed;
                return Err(err);
            }
        };
        let header_size = self.config.header_size();
        self.state = HeapState::Ready(FreeList::new(region, header_size));

        debug!(
            "heap initialized: reserved={bytes}, header_size={header_size}, alignment={}",
            self.config.alignment()
        );
        Ok(())
    }

    /// Releases the region and returns the heap to its uninitialized state.
    ///
    /// Every outstanding [`HeapPtr`] becomes meaningless.
    pub fn reset(&mut self) {
        self.state = HeapState::Uninit;
        debug!("heap reset");
    }

    /// Allocates a block with at least `size` bytes of payload.
    ///
    /// Returns `None` if no free block is large enough or if the heap region
    /// could not be reserved. The heap never grows.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn allocate(&mut self, size: usize) -> Option<HeapPtr> {
        assert!(size > 0, "allocation size must be greater than zero");

        if self.state.is_uninit() {
            if let Err(err) = self.init() {
                warn!("allocation of {size} bytes failed: {err}");
                return None;
            }
        }
        let HeapState::Ready(list) = &mut self.state else {
            return None;
        };

        let Some(aligned) = self.config.align(size) else {
            trace!("allocate size={size}: size overflows alignment");
            return None;
        };
        let Some(node) = list.take_first_fit(aligned) else {
            trace!("allocate size={size}: no free block of {aligned} bytes");
            return None;
        };

        let ptr = HeapPtr(payload_offset(node, list.header_size()));
        trace!("allocate size={size}: block={node:#x}, ptr={ptr}");
        Some(ptr)
    }

    /// Returns a block to the heap and merges it with adjacent free blocks.
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// heap and not freed since. This is not checked: a foreign or repeated
    /// handle leaves the free list in an unspecified state and may panic.
    pub fn free(&mut self, ptr: HeapPtr) {
        let HeapState::Ready(list) = &mut self.state else {
            return;
        };
        let node = ptr.offset() - list.header_size();
        list.release(node);
        trace!("free ptr={ptr}: block={node:#x}");
    }

    /// Payload bytes of an allocated block, sized to its aligned capacity.
    ///
    /// The payload starts at an aligned offset within the region, but the
    /// slice itself is only byte-aligned in memory.
    ///
    /// # Panics
    ///
    /// Panics if the heap is not initialized.
    #[must_use]
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let list = self.list().expect("heap is not initialized");
        list.payload(ptr.offset() - list.header_size())
    }

    /// Mutable payload bytes of an allocated block.
    ///
    /// # Panics
    ///
    /// Panics if the heap is not initialized.
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let HeapState::Ready(list) = &mut self.state else {
            panic!("heap is not initialized");
        };
        let node = ptr.offset() - list.header_size();
        list.payload_mut(node)
    }

    pub(crate) fn list(&self) -> Option<&FreeList> {
        match &self.state {
            HeapState::Ready(list) => Some(list),
            HeapState::Uninit | HeapState::Failed => None,
        }
    }
}

fn payload_offset(node: usize, header_size: usize) -> NonZeroUsize {
    NonZeroUsize::new(node + header_size).expect("block header size is never zero")
}
