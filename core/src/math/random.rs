//! Seeded random source shared by the stochastic solvers
//!
//! Every random decision made by the network generator and by the heuristic
//! solvers is drawn from a single [`RandomSource`]. Two runs seeded with the
//! same value and driven with identical parameters therefore draw the same
//! sequence and produce identical statistics.
//!
//! The generator is Xoshiro256++, seeded from a `u64`. When no seed is
//! supplied one is drawn from the thread RNG and kept so that the run can be
//! replayed.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::math::range::Interval;

/// Reproducible pseudo-random generator
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    rng: Xoshiro256PlusPlus,
}

impl RandomSource {
    /// Create a source with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Create a source seeded from the thread RNG
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    /// Seed this source was created with
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from the original seed
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Uniform integer in the closed interval
    pub fn get_int(&mut self, range: Interval<i64>) -> i64 {
        self.rng.gen_range(range.min()..=range.max())
    }

    /// Uniform index in `0..len`; `len` must be positive
    pub fn get_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "cannot draw an index from an empty range");
        self.rng.gen_range(0..len)
    }

    /// Uniform double in `[min, max)`, or `min` for a degenerate interval
    pub fn get_double(&mut self, range: Interval<f64>) -> f64 {
        if range.min() >= range.max() {
            return range.min();
        }
        self.rng.gen_range(range.min()..range.max())
    }

    /// Bernoulli trial; `p <= 0` never succeeds and `p >= 1` always does
    pub fn prob(&mut self, p: f64) -> bool {
        if p.is_nan() || p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.rng.gen::<f64>() < p
        }
    }

    /// Draw an index with probability proportional to its weight.
    ///
    /// Returns `None` when no weight is positive or any weight is negative
    /// or not finite.
    pub fn sample_discrete(&mut self, weights: &[f64]) -> Option<usize> {
        WeightedIndex::new(weights)
            .ok()
            .map(|distribution| distribution.sample(&mut self.rng))
    }

    /// Select an index from a score vector.
    ///
    /// Deterministic mode returns the first maximum; otherwise the index is
    /// sampled proportionally to the scores.
    pub fn argmax(&mut self, scores: &[f64], deterministic: bool) -> Option<usize> {
        if deterministic {
            scores
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
                    Some((_, b)) if b >= s => best,
                    _ => Some((i, s)),
                })
                .map(|(i, _)| i)
        } else {
            self.sample_discrete(scores)
        }
    }

    /// Swap each position, with probability `p`, with a uniformly chosen
    /// position. Returns the number of swaps performed.
    pub fn shuffle_with_probability<T>(&mut self, values: &mut [T], p: f64) -> usize {
        let n = values.len();
        if n == 0 {
            return 0;
        }
        let mut swaps = 0;
        for i in 0..n {
            if self.prob(p) {
                let j = self.get_index(n);
                values.swap(i, j);
                swaps += 1;
            }
        }
        swaps
    }
}
