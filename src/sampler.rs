//! Exponential inter-event gap sampling
//!
//! Both stochastic processes in the simulation (block mining and transaction
//! arrival) are Poisson processes, so the gap between consecutive events is
//! exponentially distributed. The sampler wraps a single `StdRng` seeded once
//! per process; statistical quality matters here, cryptographic
//! unpredictability does not, and millions of draws happen per run.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Draws exponential inter-event gaps from a uniform random source
pub struct PoissonSampler {
    rng: StdRng,
    seed: [u8; 32],
}

impl PoissonSampler {
    /// Create a sampler from an explicit seed, or from entropy when `None`
    pub fn new(seed: Option<[u8; 32]>) -> Self {
        let seed = resolve_seed(seed);
        Self {
            rng: StdRng::from_seed(seed),
            seed,
        }
    }

    /// Seed this sampler was built with
    pub fn seed(&self) -> [u8; 32] {
        self.seed
    }

    /// Draw one inter-event gap in seconds for a process with `rate`
    /// events per second.
    ///
    /// `rate` must be strictly positive; the engine guards zero-load
    /// windows before reaching the sampler.
    pub fn draw_gap(&mut self, rate: f64) -> f64 {
        debug_assert!(rate > 0.0, "draw_gap called with rate {}", rate);

        // u in [0, 1); 1-u in (0, 1] keeps the log finite
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / rate
    }
}

/// Get or generate a 32-byte seed
pub fn resolve_seed(seed: Option<[u8; 32]>) -> [u8; 32] {
    seed.unwrap_or_else(|| {
        let mut temp_rng = StdRng::from_entropy();
        let mut seed = [0u8; 32];
        temp_rng.fill_bytes(&mut seed);
        seed
    })
}
