#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

use dmm::{FreeBlock, Heap, HeapConfig, HeapPtr};
use pretty_assertions::assert_eq;

fn heap(size: usize) -> Heap {
    Heap::new(HeapConfig::new(8, size).unwrap())
}

fn free_blocks(heap: &Heap) -> Vec<(usize, usize)> {
    heap.free_list()
        .iter()
        .map(|FreeBlock { offset, size, .. }| (offset, size))
        .collect()
}

fn block_of(heap: &Heap, ptr: HeapPtr) -> usize {
    ptr.offset() - heap.config().header_size()
}

#[test]
fn three_quarters_fit_and_a_fourth_does_not() {
    let mut heap = heap(4096);
    let quarter = 4096 / 4;
    for _ in 0..3 {
        assert!(heap.allocate(quarter).is_some());
    }
    assert!(heap.allocate(quarter).is_none());
    heap.check().unwrap();
}

#[test]
fn split_leaves_remainder_after_allocated_block() {
    let mut heap = heap(4096);
    heap.init().unwrap();
    let h = heap.config().header_size();
    let capacity = 4096 - h;

    let ptr = heap.allocate(100).unwrap();
    let block = block_of(&heap, ptr);
    assert_eq!(free_blocks(&heap), [(block + h + 104, capacity - 104 - h)]);
}

#[test]
fn tight_fit_consumes_whole_block() {
    let mut heap = heap(4096);
    let h = heap.config().header_size();
    let capacity = 4096 - h;

    // leftover of exactly one header cannot hold a payload
    let ptr = heap.allocate(capacity - h).unwrap();
    assert_eq!(heap.payload(ptr).len(), capacity);
    assert!(free_blocks(&heap).is_empty());

    heap.free(ptr);
    // leftover of one header plus one aligned unit is split off
    let ptr = heap.allocate(capacity - h - 8).unwrap();
    assert_eq!(heap.payload(ptr).len(), capacity - h - 8);
    assert_eq!(free_blocks(&heap), [(capacity - 8, 8)]);
}

#[test]
fn merge_is_symmetric_in_outer_free_order() {
    for outer_first in [true, false] {
        let mut heap = heap(4096);
        let h = heap.config().header_size();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();
        let c = heap.allocate(100).unwrap();
        let _guard = heap.allocate(8).unwrap();

        if outer_first {
            heap.free(a);
            heap.free(c);
        } else {
            heap.free(c);
            heap.free(a);
        }
        heap.free(b);

        let blocks = free_blocks(&heap);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], (block_of(&heap, a), 3 * 104 + 2 * h));
        heap.check().unwrap();
    }
}

#[test]
fn three_frees_coalesce_into_one_node() {
    let mut heap = heap(4096);
    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(100).unwrap();
    let c = heap.allocate(100).unwrap();

    heap.free(a);
    heap.free(c);
    heap.free(b);
    assert_eq!(heap.free_list().len(), 1);
    assert_eq!(
        free_blocks(&heap),
        [(0, 4096 - heap.config().header_size())]
    );
}

#[test]
fn allocate_then_free_restores_previous_state() {
    let mut heap = heap(4096);
    let _kept = heap.allocate(200).unwrap();
    let before = free_blocks(&heap);

    for size in [1, 8, 100, 1000, 3000] {
        let ptr = heap.allocate(size).unwrap();
        heap.free(ptr);
        assert_eq!(free_blocks(&heap), before);
    }
}

#[test]
fn round_trip_through_middle_hole() {
    let mut heap = heap(4096);
    let h = heap.config().header_size();
    let _a = heap.allocate(64).unwrap();
    let b = heap.allocate(256).unwrap();
    let _c = heap.allocate(64).unwrap();
    heap.free(b);
    let before = free_blocks(&heap);
    assert_eq!(before.len(), 2);
    assert_eq!(before[0], (block_of(&heap, b), 256));

    // split from the hole, leaving a remainder in the middle
    let ptr = heap.allocate(100).unwrap();
    assert_eq!(ptr, b);
    assert_eq!(free_blocks(&heap)[0], (block_of(&heap, b) + h + 104, 256 - 104 - h));
    heap.free(ptr);
    assert_eq!(free_blocks(&heap), before);

    // consume the hole whole
    let ptr = heap.allocate(256).unwrap();
    assert_eq!(ptr, b);
    assert_eq!(free_blocks(&heap).len(), 1);
    heap.free(ptr);
    assert_eq!(free_blocks(&heap), before);
}

#[test]
fn first_fit_prefers_lowest_address() {
    let mut heap = heap(4096);
    let a = heap.allocate(64).unwrap();
    let _b = heap.allocate(64).unwrap();
    let c = heap.allocate(256).unwrap();
    let _d = heap.allocate(64).unwrap();
    heap.free(a);
    heap.free(c);

    // both holes fit; the lower one wins
    assert_eq!(heap.allocate(32).unwrap(), a);
    // only the second hole fits
    assert_eq!(heap.allocate(200).unwrap(), c);
}

#[test]
fn scripted_sequence() {
    const HEAP_SIZE: usize = 1024 * 1024;
    let mut heap = heap(HEAP_SIZE);
    let h = heap.config().header_size();
    let capacity = HEAP_SIZE - h;
    let size = HEAP_SIZE / 4;

    let mut ptr = [None; 6];
    for slot in &mut ptr[..3] {
        *slot = heap.allocate(size);
        assert!(slot.is_some());
    }
    assert!(heap.allocate(size).is_none());

    heap.free(ptr[0].unwrap());
    heap.free(ptr[2].unwrap());
    heap.free(ptr[1].unwrap());
    assert_eq!(free_blocks(&heap), [(0, capacity)]);

    ptr[0] = heap.allocate(size);
    ptr[1] = heap.allocate(size / 2);
    assert_eq!(heap.free_list().len(), 1);
    heap.free(ptr[0].unwrap());
    heap.free(ptr[1].unwrap());
    assert_eq!(free_blocks(&heap), [(0, capacity)]);

    ptr[0] = heap.allocate(size - 1);
    assert_eq!(heap.payload(ptr[0].unwrap()).len(), size);
    heap.free(ptr[0].unwrap());
    assert_eq!(free_blocks(&heap), [(0, capacity)]);

    for slot in &mut ptr {
        *slot = heap.allocate(100);
    }
    let ptr = ptr.map(Option::unwrap);

    heap.free(ptr[0]);
    heap.free(ptr[2]);
    heap.free(ptr[4]);
    assert_eq!(heap.free_list().len(), 4);

    heap.free(ptr[1]);
    assert_eq!(heap.free_list().len(), 3);
    assert_eq!(free_blocks(&heap)[0], (0, 3 * 104 + 2 * h));

    heap.free(ptr[5]);
    assert_eq!(heap.free_list().len(), 2);

    heap.free(ptr[3]);
    assert_eq!(free_blocks(&heap), [(0, capacity)]);
    heap.check().unwrap();
}
