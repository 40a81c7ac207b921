//! Heap consistency checking.
//!
//! [`Heap::check`] walks every block of the region in address order, using
//! only the headers of live blocks, and cross-references the free list. It
//! verifies that:
//!
//! 1. every stored size is a multiple of the alignment boundary,
//! 2. free blocks are linked in strictly increasing offset order,
//! 3. no two free blocks touch each other,
//! 4. headers and payloads of all blocks tile the region exactly.

use std::collections::BTreeSet;

use crate::{Heap, free_list::FreeList};

/// The kinds of inconsistencies [`Heap::check`] can report.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum InvariantViolation {
    #[display("block size is not aligned: block={block:#x}, size={size}, alignment={alignment}")]
    Misaligned {
        block: usize,
        size: usize,
        alignment: usize,
    },
    #[display("free list is not sorted: block={block:#x}, next={next:#x}")]
    Unordered { block: usize, next: usize },
    #[display("adjacent free blocks were not merged: block={block:#x}, next={next:#x}")]
    Adjacent { block: usize, next: usize },
    #[display("free list links are inconsistent: block={block:#x}")]
    BrokenLink { block: usize },
    #[display("block runs past the end of the region: block={block:#x}, end={end:#x}, region={region:#x}")]
    OutOfBounds {
        block: usize,
        end: usize,
        region: usize,
    },
    #[display("blocks do not cover the region: covered={covered}, reserved={reserved}")]
    Conservation { covered: usize, reserved: usize },
    #[display("free list node is not a block boundary: block={block:#x}")]
    UnknownFreeBlock { block: usize },
}

/// Occupancy figures of a heap that passed [`Heap::check`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub reserved_bytes: usize,
    pub header_size: usize,
    pub free_blocks: usize,
    /// Payload bytes held by free blocks.
    pub free_bytes: usize,
    pub allocated_blocks: usize,
    /// Payload bytes held by allocated blocks, including alignment padding.
    pub allocated_bytes: usize,
    pub largest_free: usize,
}

impl HeapStats {
    /// Header bytes spent on all blocks.
    #[must_use]
    pub fn overhead_bytes(&self) -> usize {
        (self.free_blocks + self.allocated_blocks) * self.header_size
    }
}

impl Heap {
    /// Verifies the heap invariants and returns occupancy figures.
    ///
    /// An uninitialized heap reports default stats.
    pub fn check(&self) -> Result<HeapStats, InvariantViolation> {
        let Some(list) = self.list() else {
            return Ok(HeapStats::default());
        };
        let free = check_free_list(list)?;
        walk_blocks(list, self.config().alignment(), &free)
    }
}

/// Checks order and adjacency of the free list and returns its offsets.
fn check_free_list(list: &FreeList) -> Result<BTreeSet<usize>, InvariantViolation> {
    let header_size = list.header_size();
    let mut offsets = BTreeSet::new();
    let mut prev = None;
    for block in list.iter() {
        if block.prev != prev {
            return Err(InvariantViolation::BrokenLink {
                block: block.offset,
            });
        }
        if let Some(next) = block.next {
            if next <= block.offset {
                return Err(InvariantViolation::Unordered {
                    block: block.offset,
                    next,
                });
            }
            if block.end(header_size) >= next {
                return Err(InvariantViolation::Adjacent {
                    block: block.offset,
                    next,
                });
            }
        }
        offsets.insert(block.offset);
        prev = Some(block.offset);
    }
    Ok(offsets)
}

/// Walks every block from offset zero and accumulates stats.
fn walk_blocks(
    list: &FreeList,
    alignment: usize,
    free: &BTreeSet<usize>,
) -> Result<HeapStats, InvariantViolation> {
    let header_size = list.header_size();
    let region = list.region_len();
    let mut stats = HeapStats {
        reserved_bytes: region,
        header_size,
        ..HeapStats::default()
    };

    let mut offset = 0;
    let mut seen_free = 0;
    while offset + header_size <= region {
        let size = list.size(offset);
        if size % alignment != 0 {
            return Err(InvariantViolation::Misaligned {
                block: offset,
                size,
                alignment,
            });
        }
        let end = offset
            .checked_add(header_size + size)
            .filter(|&end| end <= region)
            .ok_or(InvariantViolation::OutOfBounds {
                block: offset,
                end: offset.saturating_add(header_size).saturating_add(size),
                region,
            })?;

        if free.contains(&offset) {
            seen_free += 1;
            stats.free_blocks += 1;
            stats.free_bytes += size;
            stats.largest_free = stats.largest_free.max(size);
        } else {
            stats.allocated_blocks += 1;
            stats.allocated_bytes += size;
        }
        offset = end;
    }

    if offset != region {
        return Err(InvariantViolation::Conservation {
            covered: offset,
            reserved: region,
        });
    }
    if seen_free != free.len() {
        let block = free
            .iter()
            .copied()
            .find(|&block| !is_block_boundary(list, block))
            .unwrap_or_default();
        return Err(InvariantViolation::UnknownFreeBlock { block });
    }
    Ok(stats)
}

fn is_block_boundary(list: &FreeList, target: usize) -> bool {
    let header_size = list.header_size();
    let mut offset = 0;
    while offset < target {
        offset += header_size + list.size(offset);
    }
    offset == target
}
