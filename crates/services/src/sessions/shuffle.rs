use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{SeedableRng, rng};

use quiz_core::model::Question;

/// Orders a candidate pool before a session takes its slice.
pub trait ShuffleSource: Send + Sync {
    fn shuffle(&self, questions: &mut [Question]);
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngShuffle;

impl ShuffleSource for ThreadRngShuffle {
    fn shuffle(&self, questions: &mut [Question]) {
        questions.shuffle(&mut rng());
    }
}

/// Reproducible source: the same seed yields the same sequence of orders.
#[derive(Debug)]
pub struct SeededShuffle {
    rng: Mutex<StdRng>,
}

impl SeededShuffle {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ShuffleSource for SeededShuffle {
    fn shuffle(&self, questions: &mut [Question]) {
        // A poisoned lock still holds a usable RNG.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        questions.shuffle(&mut *rng);
    }
}

/// Leaves the pool in storage order.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityShuffle;

impl ShuffleSource for IdentityShuffle {
    fn shuffle(&self, _questions: &mut [Question]) {}
}
