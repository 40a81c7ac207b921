//! Randomized allocate/free rounds over a fixed set of slots.

use core::fmt;
use std::time::{Duration, Instant};

use argh::FromArgs;
use dmm::{Heap, HeapConfig, HeapPtr};
use log::{debug, info, trace};
use rand::{Rng, SeedableRng as _, rngs::StdRng};
use snafu::{ResultExt as _, ensure_whatever};
use snafu_utils::GenericError;

/// Smallest heap a randomized run accepts.
pub const MIN_HEAP_SIZE: usize = 1024 * 1024;

/// Probability that a round tries to allocate rather than free.
const ALLOC_PROBABILITY: f64 = 0.5;

/// Run randomized allocate/free rounds.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "random")]
pub struct Args {
    /// number of rounds
    #[argh(option, default = "50_000")]
    pub loops: usize,
    /// number of allocation slots
    #[argh(option, default = "1000")]
    pub slots: usize,
    /// seed for a reproducible run (random if omitted)
    #[argh(option)]
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub seed: u64,
    pub loops: usize,
    pub allocations: usize,
    pub failed_allocations: usize,
    pub frees: usize,
    pub elapsed: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seed={}, loops={}, allocations={}, succeeded={}, failed={}, frees={}, elapsed={:?}",
            self.seed,
            self.loops,
            self.allocations,
            self.allocations - self.failed_allocations,
            self.failed_allocations,
            self.frees,
            self.elapsed,
        )
    }
}

pub fn run(config: HeapConfig, args: &Args) -> Result<Summary, GenericError> {
    ensure_whatever!(
        config.max_heap_size() >= MIN_HEAP_SIZE,
        "heap too small for a randomized run, heap_size={}, min={MIN_HEAP_SIZE}",
        config.max_heap_size()
    );
    ensure_whatever!(args.slots > 0, "at least one slot is required");

    let seed = args.seed.unwrap_or_else(rand::random);
    info!(
        "random run: seed={seed}, loops={}, slots={}",
        args.loops, args.slots
    );

    let mut heap = Heap::new(config);
    heap.init().whatever_context("cannot initialize heap")?;

    let mut rng = StdRng::seed_from_u64(seed);
    let max_size = config.max_heap_size() / 100;
    let mut slots: Vec<Option<HeapPtr>> = vec![None; args.slots];
    let mut summary = Summary {
        seed,
        loops: args.loops,
        ..Summary::default()
    };

    let start = Instant::now();
    for round in 0..args.loops {
        let index = rng.gen_range(0..args.slots);
        let allocate = rng.gen_bool(ALLOC_PROBABILITY);
        match (allocate, slots[index]) {
            (true, None) => {
                let size = request_size(&mut rng, max_size);
                summary.allocations += 1;
                match heap.allocate(size) {
                    Some(ptr) => {
                        trace!("round {round}: slot {index} <- allocate({size}) = {ptr}");
                        slots[index] = Some(ptr);
                    }
                    None => {
                        debug!("round {round}: allocate({size}) failed");
                        summary.failed_allocations += 1;
                    }
                }
            }
            (false, Some(ptr)) => {
                trace!("round {round}: slot {index} -> free({ptr})");
                heap.free(ptr);
                slots[index] = None;
                summary.frees += 1;
            }
            _ => {}
        }
    }

    for ptr in slots.iter_mut().filter_map(Option::take) {
        heap.free(ptr);
        summary.frees += 1;
    }
    summary.elapsed = start.elapsed();

    heap.dump();
    print!("{}", heap.free_list());
    let stats = heap
        .check()
        .whatever_context("heap is inconsistent after randomized run")?;
    ensure_whatever!(
        stats.allocated_blocks == 0 && stats.free_blocks == 1,
        "heap did not coalesce back to one block, free_blocks={}, allocated_blocks={}",
        stats.free_blocks,
        stats.allocated_blocks
    );

    Ok(summary)
}

/// Draws a request size in `1..max_size`; zero is never requested.
fn request_size<R: Rng>(rng: &mut R, max_size: usize) -> usize {
    rng.gen_range(1..max_size)
}
