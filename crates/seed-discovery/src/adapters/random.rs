//! Random Source Adapters

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::ports::RandomSource;

/// Production random source seeded from OS entropy.
#[derive(Debug)]
pub struct OsRandomSource {
    rng: Mutex<StdRng>,
}

impl OsRandomSource {
    /// Create a new OS-seeded random source.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for OsRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for OsRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..max)
    }

    fn random_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }
}

/// Deterministic random source for reproducible tests.
///
/// # Example
///
/// ```rust
/// use seed_discovery::adapters::SeededRandomSource;
/// use seed_discovery::ports::RandomSource;
///
/// let a = SeededRandomSource::new(7);
/// let b = SeededRandomSource::new(7);
/// assert_eq!(a.random_usize(1000), b.random_usize(1000));
/// ```
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    /// Create a source that always produces the same sequence for `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..max)
    }

    fn random_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }
}
