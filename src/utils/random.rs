//! Seeded pseudo-random number generator.
//!
//! Every random decision the learning algorithms make (potential pool
//! sampling, initial permanences, least-used-cell tie-breaks, synapse growth
//! candidates) is drawn from a [`Random`], so two runs built from the same
//! seed follow the same learning trajectory.

use crate::types::{Permanence, Real};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A deterministic pseudo-random number generator.
///
/// Uses ChaCha20, which produces the same stream on every platform for a
/// given seed.
///
/// # Example
///
/// ```rust
/// use neocortex::utils::Random;
///
/// let mut a = Random::new(7);
/// let mut b = Random::new(7);
/// assert_eq!(a.index_below(100), b.index_below(100));
/// assert_eq!(a.sample_sorted((0..10u32).collect(), 3).len(), 3);
/// ```
#[derive(Clone)]
pub struct Random {
    rng: ChaCha20Rng,
    seed: u64,
}

impl Random {
    /// Creates a generator from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Uniform index in `[0, n)`; 0 when `n` is 0.
    pub fn index_below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// Uniform permanence in `[0, 1)`.
    pub fn permanence(&mut self) -> Permanence {
        self.rng.gen()
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: Real) -> bool {
        Real::from(self.permanence()) < p
    }

    /// Draws `k` distinct items, in draw order. All of them when
    /// `k >= items.len()`.
    pub fn sample<T: Clone>(&mut self, mut items: Vec<T>, k: usize) -> Vec<T> {
        let (picked, _) = items.partial_shuffle(&mut self.rng, k);
        picked.to_vec()
    }

    /// [`Random::sample`] in ascending order.
    pub fn sample_sorted<T: Clone + Ord>(&mut self, items: Vec<T>, k: usize) -> Vec<T> {
        let mut picked = self.sample(items, k);
        picked.sort_unstable();
        picked
    }
}

impl std::fmt::Debug for Random {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Random")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
