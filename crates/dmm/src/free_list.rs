//! Address-ordered free list over a heap region.
//!
//! The free list keeps every unallocated block of the region in a
//! doubly-linked list sorted by offset. Links are byte offsets from the start
//! of the region, so no raw pointers are involved and every access is
//! bounds-checked.
//!
//! # Algorithm
//!
//! - **Allocation**: scans from the head for the first block whose capacity
//!   is large enough (first fit). The block is split when the leftover can
//!   hold another header plus at least one payload byte, then unlinked.
//! - **Deallocation**: the released block is linked between the two free
//!   blocks that bracket its offset, then merged eagerly with whichever of
//!   them touch it in memory.
//!
//! # Memory Layout
//!
//! Every block, free or allocated, starts with a [`BlockHeader`] padded to
//! the header size. The payload handed out to callers follows immediately.
//!
//! ```text
//! Block Layout:
//! ┌───────────────────────────────────────┬──────────────────────────┐
//! │ BlockHeader (header_size bytes)       │ Payload (size bytes)     │
//! │ ┌────────────┬────────────┬─────────┐ │                          │
//! │ │ size       │ next       │ prev    │ │                          │
//! │ └────────────┴────────────┴─────────┘ │                          │
//! └───────────────────────────────────────┴──────────────────────────┘
//! ```
//!
//! `next` and `prev` are only meaningful while the block is free.

use log::trace;

use crate::{
    header::{self, BlockHeader},
    region::HeapRegion,
};

/// A snapshot of one node of the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Offset of the block header from the start of the region.
    pub offset: usize,
    /// Payload capacity in bytes, excluding the header.
    pub size: usize,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl FreeBlock {
    /// Offset one past the last payload byte.
    #[must_use]
    pub fn end(&self, header_size: usize) -> usize {
        self.offset + header_size + self.size
    }
}

pub(crate) struct FreeList {
    region: HeapRegion,
    header_size: usize,
    head: Option<usize>,
}

impl FreeList {
    /// Installs a single free block spanning the whole region.
    pub(crate) fn new(region: HeapRegion, header_size: usize) -> Self {
        assert!(
            region.len() > header_size,
            "region must be larger than one block header"
        );
        let size = region.len() - header_size;
        let mut list = Self {
            region,
            header_size,
            head: None,
        };
        list.write_header(0, BlockHeader::unlinked(size));
        list.head = Some(0);
        list
    }

    pub(crate) fn header_size(&self) -> usize {
        self.header_size
    }

    pub(crate) fn region_len(&self) -> usize {
        self.region.len()
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    /// Size stored in the header at `node`, whether free or allocated.
    pub(crate) fn size(&self, node: usize) -> usize {
        self.header(node).size
    }

    pub(crate) fn block(&self, node: usize) -> FreeBlock {
        let header = self.header(node);
        FreeBlock {
            offset: node,
            size: header.size,
            prev: header::link(header.prev),
            next: header::link(header.next),
        }
    }

    pub(crate) fn iter(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            list: Some(self),
            current: self.head,
        }
    }

    pub(crate) fn payload(&self, node: usize) -> &[u8] {
        let start = node + self.header_size;
        let end = start + self.size(node);
        &self.region.bytes()[start..end]
    }

    pub(crate) fn payload_mut(&mut self, node: usize) -> &mut [u8] {
        let start = node + self.header_size;
        let end = start + self.size(node);
        &mut self.region.bytes_mut()[start..end]
    }

    /// Removes the first block able to hold `size` bytes and returns its
    /// offset.
    ///
    /// `size` must already be aligned. The chosen block is split first when
    /// the remainder can hold a header plus a non-empty payload.
    pub(crate) fn take_first_fit(&mut self, size: usize) -> Option<usize> {
        let node = self.iter().find(|block| block.size >= size)?.offset;
        if self.size(node) - size > self.header_size {
            self.split(node, size);
        }
        self.unlink(node);
        Some(node)
    }

    /// Puts the block at `node` back on the list and merges it with adjacent
    /// free blocks.
    pub(crate) fn release(&mut self, node: usize) {
        let (prev, next) = self.position_for(node);
        self.link_between(prev, node, next);

        // the lower block survives each merge
        if let Some(next) = next {
            self.merge(node, next);
        }
        if let Some(prev) = prev {
            self.merge(prev, node);
        }
    }

    /// Carves `node` into an allocated part of `size` bytes and a free
    /// remainder placed right after it.
    fn split(&mut self, node: usize, size: usize) {
        let header = self.header(node);
        assert!(header.size - size > self.header_size);

        let remainder = node + self.header_size + size;
        let remainder_size = header.size - size - self.header_size;
        self.write_header(
            remainder,
            BlockHeader {
                size: remainder_size,
                next: header.next,
                prev: node,
            },
        );
        self.set_prev(header::link(header.next), Some(remainder));
        self.write_header(
            node,
            BlockHeader {
                size,
                next: remainder,
                prev: header.prev,
            },
        );

        trace!("split block={node:#x}, size={size}, remainder={remainder:#x}, remainder_size={remainder_size}");
    }

    /// Absorbs `upper` into `lower` if `lower` ends exactly where `upper`
    /// starts. Both must be linked and consecutive on the list.
    fn merge(&mut self, lower: usize, upper: usize) -> bool {
        let lower_header = self.header(lower);
        if lower + self.header_size + lower_header.size != upper {
            return false;
        }
        debug_assert_eq!(lower_header.next, upper);

        let upper_size = self.size(upper);
        self.unlink(upper);
        let merged_size = lower_header.size + self.header_size + upper_size;
        self.update(lower, |header| header.size = merged_size);

        trace!("merge block={lower:#x} <- block={upper:#x}, size={merged_size}");
        true
    }

    /// Finds the free blocks that bracket `node`.
    fn position_for(&self, node: usize) -> (Option<usize>, Option<usize>) {
        let mut prev = None;
        let mut current = self.head;
        while let Some(offset) = current {
            if offset > node {
                break;
            }
            prev = Some(offset);
            current = header::link(self.header(offset).next);
        }
        (prev, current)
    }

    /// Links `node` between `prev` and `next`. A missing `prev` stands for the
    /// list head and a missing `next` for the tail.
    fn link_between(&mut self, prev: Option<usize>, node: usize, next: Option<usize>) {
        self.update(node, |header| {
            header.prev = header::raw_link(prev);
            header.next = header::raw_link(next);
        });
        self.set_next(prev, Some(node));
        self.set_prev(next, Some(node));
    }

    fn unlink(&mut self, node: usize) {
        let header = self.header(node);
        let prev = header::link(header.prev);
        let next = header::link(header.next);
        self.set_next(prev, next);
        self.set_prev(next, prev);
        self.update(node, |header| {
            header.prev = header::NIL;
            header.next = header::NIL;
        });
    }

    /// Points the forward link of `node` (or the head when `None`) at `next`.
    fn set_next(&mut self, node: Option<usize>, next: Option<usize>) {
        match node {
            Some(node) => self.update(node, |header| header.next = header::raw_link(next)),
            None => self.head = next,
        }
    }

    /// Points the backward link of `node` at `prev`; a `None` node is the
    /// position past the tail and has nothing to update.
    fn set_prev(&mut self, node: Option<usize>, prev: Option<usize>) {
        if let Some(node) = node {
            self.update(node, |header| header.prev = header::raw_link(prev));
        }
    }

    fn header(&self, node: usize) -> BlockHeader {
        BlockHeader::read(self.region.bytes(), node)
    }

    fn write_header(&mut self, node: usize, header: BlockHeader) {
        header.write(self.region.bytes_mut(), node);
    }

    fn update<F>(&mut self, node: usize, f: F)
    where
        F: FnOnce(&mut BlockHeader),
    {
        let mut header = self.header(node);
        f(&mut header);
        self.write_header(node, header);
    }
}

/// Iterator over the free list from head to tail.
pub struct FreeBlocks<'a> {
    list: Option<&'a FreeList>,
    current: Option<usize>,
}

impl FreeBlocks<'_> {
    pub(crate) fn empty() -> Self {
        Self {
            list: None,
            current: None,
        }
    }
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.list?.block(self.current?);
        self.current = block.next;
        Some(block)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_SIZE: usize = 32;

    fn with_test_list<F>(region_size: usize, test_fn: F)
    where
        F: FnOnce(&mut FreeList),
    {
        let region = HeapRegion::reserve(region_size).unwrap();
        let mut list = FreeList::new(region, HEADER_SIZE);
        test_fn(&mut list);
    }

    fn offsets_and_sizes(list: &FreeList) -> Vec<(usize, usize)> {
        list.iter().map(|block| (block.offset, block.size)).collect()
    }

    fn assert_links_consistent(list: &FreeList) {
        let blocks = list.iter().collect::<Vec<_>>();
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].next, Some(pair[1].offset));
            assert_eq!(pair[1].prev, Some(pair[0].offset));
        }
        if let Some(first) = blocks.first() {
            assert_eq!(first.prev, None);
        }
        if let Some(last) = blocks.last() {
            assert_eq!(last.next, None);
        }
    }

    #[test]
    fn test_new_list_spans_region() {
        with_test_list(1024, |list| {
            assert_eq!(offsets_and_sizes(list), [(0, 1024 - HEADER_SIZE)]);
            assert_links_consistent(list);
        });
    }

    #[test]
    fn test_take_splits_block() {
        with_test_list(1024, |list| {
            let node = list.take_first_fit(64).unwrap();
            assert_eq!(node, 0);
            assert_eq!(list.size(node), 64);
            assert_eq!(
                offsets_and_sizes(list),
                [(HEADER_SIZE + 64, 1024 - 2 * HEADER_SIZE - 64)]
            );
            assert_links_consistent(list);
        });
    }

    #[test]
    fn test_take_whole_block_when_tight() {
        with_test_list(1024, |list| {
            // leftover equals one header: no room for a payload byte
            let size = 1024 - 2 * HEADER_SIZE;
            let node = list.take_first_fit(size).unwrap();
            assert_eq!(list.size(node), 1024 - HEADER_SIZE);
            assert_eq!(list.head(), None);
            assert!(list.take_first_fit(8).is_none());
        });
    }

    #[test]
    fn test_release_into_empty_list() {
        with_test_list(256, |list| {
            let node = list.take_first_fit(256 - HEADER_SIZE).unwrap();
            assert_eq!(list.head(), None);

            list.release(node);
            assert_eq!(offsets_and_sizes(list), [(0, 256 - HEADER_SIZE)]);
            assert_links_consistent(list);
        });
    }

    #[test]
    fn test_release_orders_by_offset() {
        with_test_list(1024, |list| {
            let a = list.take_first_fit(32).unwrap();
            let b = list.take_first_fit(32).unwrap();
            let c = list.take_first_fit(32).unwrap();
            let d = list.take_first_fit(32).unwrap();
            let tail = list.head().unwrap();

            list.release(c);
            list.release(a);
            assert_eq!(
                list.iter().map(|block| block.offset).collect::<Vec<_>>(),
                [a, c, tail]
            );
            assert_links_consistent(list);

            list.release(b);
            list.release(d);
            assert_eq!(offsets_and_sizes(list), [(0, 1024 - HEADER_SIZE)]);
        });
    }

    #[test]
    fn test_merge_with_both_neighbors() {
        with_test_list(1024, |list| {
            let a = list.take_first_fit(64).unwrap();
            let b = list.take_first_fit(64).unwrap();
            let c = list.take_first_fit(64).unwrap();
            let _guard = list.take_first_fit(64).unwrap();

            list.release(a);
            list.release(c);
            assert_eq!(list.iter().count(), 3);

            list.release(b);
            let blocks = offsets_and_sizes(list);
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks[0], (a, 3 * 64 + 2 * HEADER_SIZE));
            assert_links_consistent(list);
        });
    }

    #[test]
    fn test_payload_bounds() {
        with_test_list(512, |list| {
            let node = list.take_first_fit(40).unwrap();
            list.payload_mut(node).fill(0xAB);
            assert_eq!(list.payload(node).len(), 40);
            // header of the remainder must survive payload writes
            let remainder = list.head().unwrap();
            assert_eq!(remainder, HEADER_SIZE + 40);
            assert_eq!(list.size(remainder), 512 - 2 * HEADER_SIZE - 40);
        });
    }
}
