use std::ops::Range;
use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Single source of randomness for every component. All probability draws in
/// the engine go through one of these methods; fixing the seed makes a whole
/// run replayable.
pub struct RandomSource {
    inner: Mutex<ChaCha8Rng>,
}

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Uniform f64 in `[0, 1)`.
    pub fn ratio(&self) -> f64 {
        self.lock().r#gen::<f64>()
    }

    /// True with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        debug_assert!((0.0..=1.0).contains(&p), "probability out of range: {p}");
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.lock().gen_bool(p)
    }

    pub fn range_u64(&self, range: Range<u64>) -> u64 {
        if range.is_empty() {
            return range.start;
        }
        self.lock().gen_range(range)
    }

    pub fn range_f64(&self, range: Range<f64>) -> f64 {
        if range.start >= range.end {
            return range.start;
        }
        self.lock().gen_range(range)
    }

    /// Uniform index into a collection of `len` elements; `None` when empty.
    pub fn pick_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.lock().gen_range(0..len))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChaCha8Rng> {
        // Held only for single non-awaiting draws, so poisoning can't happen
        // short of a panic inside rand itself.
        self.inner.lock().expect("rng mutex poisoned")
    }
}
