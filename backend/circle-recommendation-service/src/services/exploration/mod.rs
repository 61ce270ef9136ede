// ============================================
// Exploration (探索)
// ============================================
//
// Optional explore-exploit step between ranking and feedback adjustment.
// Each result slot after the first is swapped, with probability `rate`,
// for a random candidate from beyond the cut-off.
//
// Randomness comes from a StdRng seeded per request, so the same seed
// always yields the same list.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub struct SeededExplorer {
    rate: f64,
}

impl SeededExplorer {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Take the first `limit` items of `pool`, with exploration swaps applied
    pub fn explore<T>(&self, mut pool: Vec<T>, limit: usize, seed: u64) -> Vec<T> {
        if !self.is_enabled() || pool.len() <= limit {
            pool.truncate(limit);
            return pool;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let tail_len = pool.len() - limit;
        let mut swaps = 0;

        for slot in 1..limit {
            if rng.gen_bool(self.rate) {
                let pick = limit + rng.gen_range(0..tail_len);
                pool.swap(slot, pick);
                swaps += 1;
            }
        }

        pool.truncate(limit);
        debug!(seed = seed, swaps = swaps, "Exploration applied");
        pool
    }
}
