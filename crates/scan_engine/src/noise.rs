//! Gaussian range noise
//!
//! Box–Muller over a `SmallRng`. A non-zero seed is reproducible; seed 0
//! draws its seed from the wall clock.

use std::f64::consts::TAU;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct RangeNoise {
    std_dev: f32,
    seed: u64,
    rng: SmallRng,
}

impl RangeNoise {
    pub fn new(std_dev: f32, seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::seed_from_u64(time_seed())
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { std_dev, seed, rng }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.std_dev > 0.0
    }

    /// True when this generator was built from the same parameters
    pub fn matches(&self, std_dev: f32, seed: u64) -> bool {
        self.std_dev == std_dev && self.seed == seed
    }

    /// Standard normal sample from two uniform draws
    pub fn standard_normal(&mut self) -> f64 {
        // shift [0, 1) to (0, 1] so ln never sees zero
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    /// Perturb a finite range and clamp it back into `[min, max]`.
    ///
    /// Non-finite ranges pass through untouched.
    pub fn perturb(&mut self, range: f32, min: f32, max: f32) -> f32 {
        if !self.is_active() || !range.is_finite() {
            return range;
        }
        let noisy = range as f64 + self.std_dev as f64 * self.standard_normal();
        (noisy as f32).clamp(min, max)
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0x5eed_1d4a)
}
