//! The fixed allocate/free sequence.
//!
//! Every step prints the free list and checks the heap. A step whose outcome
//! differs from the expected one aborts the run with an error.

use argh::FromArgs;
use dmm::{Heap, HeapConfig, HeapPtr};
use log::info;
use snafu::{ResultExt as _, ensure_whatever, whatever};
use snafu_utils::GenericError;

/// Smallest heap the sequence is laid out for.
pub const MIN_HEAP_SIZE: usize = 4096;

/// Run the fixed allocate/free sequence and verify every step.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "scripted")]
pub struct Args {}

struct Driver {
    heap: Heap,
    step: usize,
}

impl Driver {
    fn new(config: HeapConfig) -> Result<Self, GenericError> {
        let mut heap = Heap::new(config);
        heap.init().whatever_context("cannot initialize heap")?;
        Ok(Self { heap, step: 0 })
    }

    fn allocate(&mut self, size: usize) -> Result<HeapPtr, GenericError> {
        let Some(ptr) = self.heap.allocate(size) else {
            whatever!("allocation unexpectedly failed, size={size}");
        };
        self.checkpoint(format_args!("allocate({size}) = {ptr}"))?;
        Ok(ptr)
    }

    fn allocate_fails(&mut self, size: usize) -> Result<(), GenericError> {
        if let Some(ptr) = self.heap.allocate(size) {
            whatever!("allocation beyond capacity unexpectedly succeeded, size={size}, ptr={ptr}");
        }
        self.checkpoint(format_args!("allocate({size}) = none"))
    }

    fn free(&mut self, ptr: HeapPtr) -> Result<(), GenericError> {
        self.heap.free(ptr);
        self.checkpoint(format_args!("free({ptr})"))
    }

    fn checkpoint(&mut self, what: core::fmt::Arguments<'_>) -> Result<(), GenericError> {
        self.step += 1;
        println!("step {}: {what}", self.step);
        print!("{}", self.heap.free_list());
        self.heap.dump();
        self.heap
            .check()
            .with_whatever_context(|_| format!("heap is inconsistent after step {}", self.step))?;
        Ok(())
    }

    fn expect_free_blocks(&self, expected: usize) -> Result<(), GenericError> {
        let actual = self.heap.free_list().len();
        ensure_whatever!(
            actual == expected,
            "unexpected free block count after step {}, expected={expected}, actual={actual}",
            self.step
        );
        Ok(())
    }

    fn expect_all_free(&self) -> Result<(), GenericError> {
        self.expect_free_blocks(1)?;
        let config = self.heap.config();
        let capacity = config.reserved_bytes() - config.header_size();
        let largest = self.heap.free_list().iter().map(|block| block.size).max();
        ensure_whatever!(
            largest == Some(capacity),
            "heap did not return to one full block after step {}, capacity={capacity}",
            self.step
        );
        Ok(())
    }
}

pub fn run(config: HeapConfig) -> Result<(), GenericError> {
    ensure_whatever!(
        config.max_heap_size() >= MIN_HEAP_SIZE,
        "heap too small for the scripted sequence, heap_size={}, min={MIN_HEAP_SIZE}",
        config.max_heap_size()
    );

    let mut driver = Driver::new(config)?;
    let size = config.max_heap_size() / 4;

    info!("three quarters fit, a fourth does not");
    let mut ptr = [
        driver.allocate(size)?,
        driver.allocate(size)?,
        driver.allocate(size)?,
    ];
    driver.allocate_fails(size)?;

    info!("freeing in the order 0, 2, 1 coalesces everything");
    driver.free(ptr[0])?;
    driver.free(ptr[2])?;
    driver.free(ptr[1])?;
    driver.expect_all_free()?;

    info!("allocations with a split remainder");
    ptr[0] = driver.allocate(size)?;
    ptr[1] = driver.allocate(size / 2)?;
    driver.expect_free_blocks(1)?;
    driver.free(ptr[0])?;
    driver.free(ptr[1])?;
    driver.expect_all_free()?;

    info!("unaligned request is rounded up");
    let unaligned = driver.allocate(size - 1)?;
    let payload = driver.heap.payload(unaligned).len();
    let expected = config.align(size - 1).unwrap_or(size);
    ensure_whatever!(
        payload == expected,
        "unexpected payload size, expected={expected}, actual={payload}"
    );
    driver.free(unaligned)?;
    driver.expect_all_free()?;

    info!("interleaved frees of small blocks");
    let mut small = Vec::with_capacity(6);
    for _ in 0..6 {
        small.push(driver.allocate(100)?);
    }
    for (index, expected) in [(0, 2), (2, 3), (4, 4), (1, 3), (5, 2), (3, 1)] {
        driver.free(small[index])?;
        driver.expect_free_blocks(expected)?;
    }
    driver.expect_all_free()?;

    println!("scripted sequence passed in {} steps", driver.step);
    Ok(())
}
