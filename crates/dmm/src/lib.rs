//! A first-fit free-list dynamic memory allocator over one fixed heap region.
//!
//! A [`Heap`] reserves `align(max_heap_size)` bytes the first time it is asked
//! for memory and carves every allocation out of that region. It never grows:
//! once no free block is large enough, [`Heap::allocate`] returns `None` until
//! something is freed.
//!
//! # Algorithm
//!
//! Free blocks are kept in a doubly-linked list sorted by address.
//!
//! - **Allocation** takes the first free block large enough for the aligned
//!   request, splitting off the remainder when it can hold another header and
//!   at least one payload byte.
//! - **Deallocation** links the block back in address order and immediately
//!   merges it with whichever neighbors touch it in memory.
//!
//! ```text
//!   Heap region after allocate(A), allocate(B), allocate(C), free(B):
//!
//!   ┌─────┬──────┬─────┬──────┬─────┬──────┬─────┬──────────────────────┐
//!   │ hdr │  A   │ hdr │  B   │ hdr │  C   │ hdr │        free          │
//!   └─────┴──────┴─────┴──────┴─────┴──────┴─────┴──────────────────────┘
//!                  ▲                           ▲
//!                  └────── free list ──────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use dmm::{Heap, HeapConfig};
//!
//! let config = HeapConfig::new(8, 4096).unwrap();
//! let mut heap = Heap::new(config);
//!
//! let ptr = heap.allocate(100).unwrap();
//! heap.payload_mut(ptr).fill(0x2A);
//! assert_eq!(heap.payload(ptr).len(), 104);
//!
//! heap.free(ptr);
//! assert_eq!(heap.free_list().len(), 1);
//! heap.check().unwrap();
//! ```
//!
//! # Handles
//!
//! Allocations are identified by [`HeapPtr`], the offset of the payload in
//! the region, and their bytes are reached through [`Heap::payload`] and
//! [`Heap::payload_mut`]. Payload offsets and sizes are multiples of the
//! alignment boundary, but the region is a plain byte buffer: the address of a
//! payload slice carries no alignment guarantee. Store typed values through
//! byte conversions such as `u64::to_le_bytes` or a `dataview` view rather
//! than by casting the slice pointer. Freeing a handle twice or one from another heap is
//! not detected; it corrupts the free list but never memory outside it.
//!
//! # Thread Safety
//!
//! [`Heap`] is `Send` but its operations take `&mut self`. Use
//! [`LockedHeap`] to share one heap between threads.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use self::{
    check::{HeapStats, InvariantViolation},
    config::{ConfigError, DEFAULT_ALIGNMENT, DEFAULT_MAX_HEAP_SIZE, HeapConfig},
    dump::FreeListView,
    free_list::{FreeBlock, FreeBlocks},
    heap::{Heap, HeapPtr, InitError},
    locked::LockedHeap,
    region::ReserveError,
};

mod check;
pub mod config;
mod dump;
mod free_list;
mod header;
mod heap;
mod locked;
mod region;
