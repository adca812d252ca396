//! Random number choice for quick pick.

use crate::types::TicketNumber;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

/// Chooses ticket numbers uniformly at random from a pool
pub trait NumberPicker: Send + Sync {
    /// Up to `count` distinct numbers from `pool`, in the order they were drawn
    fn pick(&self, pool: &[TicketNumber], count: usize) -> Vec<TicketNumber>;
}

/// Picker backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPicker;

impl NumberPicker for RandomPicker {
    fn pick(&self, pool: &[TicketNumber], count: usize) -> Vec<TicketNumber> {
        pool.choose_multiple(&mut rand::thread_rng(), count).copied().collect()
    }
}

/// Reproducible picker for tests and demos
#[derive(Debug)]
pub struct SeededPicker {
    rng: Mutex<StdRng>,
}

impl SeededPicker {
    /// Picker whose sequence is fully determined by `seed`
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl NumberPicker for SeededPicker {
    fn pick(&self, pool: &[TicketNumber], count: usize) -> Vec<TicketNumber> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pool.choose_multiple(&mut *rng, count).copied().collect()
    }
}
