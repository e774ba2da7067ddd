use hsbm_types::WeightT;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Deterministic, seedable source of randomness for the engine.
///
/// Two samplers built from the same seed and driven through the same
/// sequence of calls produce bit-identical draws. This is load-bearing for
/// reproducing a run and for the sampler's own determinism tests.
#[derive(Clone)]
pub struct Sampler {
    rng: SmallRng,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Draw a uniform value in `[0, 1)`.
    pub fn draw_unif(&mut self) -> WeightT {
        self.rng.gen_range(0.0, 1.0)
    }

    /// Draw a uniform integer in the inclusive range `[0, n]`.
    pub fn rand_int(&mut self, n: usize) -> usize {
        self.rng.gen_range(0, n + 1)
    }

    /// Pick a uniformly random element of `items`.
    ///
    /// # Panics
    /// Panics if `items` is empty, matching the precondition that callers
    /// never sample from an empty candidate set.
    pub fn sample<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let idx = self.rand_int(items.len() - 1);
        &items[idx]
    }

    /// Pick a uniformly random element across a vector of groups, treating
    /// the whole flattened collection as the sampling domain rather than
    /// picking a group first.
    pub fn sample_nested<'a, T>(&mut self, groups: &'a [Vec<T>]) -> &'a T {
        let total: usize = groups.iter().map(Vec::len).sum();
        let mut idx = self.rand_int(total - 1);
        for group in groups {
            if idx < group.len() {
                return &group[idx];
            }
            idx -= group.len();
        }
        unreachable!("flattened index exceeded total element count")
    }

    /// Pick an index with probability proportional to `weights`.
    ///
    /// # Panics
    /// Panics if `weights` is empty or sums to zero.
    pub fn sample_weighted(&mut self, weights: &[WeightT]) -> usize {
        let total: WeightT = weights.iter().sum();
        assert!(total > 0.0, "sample_weighted requires a positive total weight");
        let draw = self.draw_unif() * total;
        let mut acc = 0.0;
        for (idx, w) in weights.iter().enumerate() {
            acc += w;
            if draw < acc {
                return idx;
            }
        }
        weights.len() - 1
    }

    /// Shuffle `items` in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}
