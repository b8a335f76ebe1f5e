use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Process-wide random source. Services fork a private `StdRng` per
/// operation so no lock is held across an await or a long computation.
#[derive(Debug)]
pub struct SharedRng(Mutex<StdRng>);

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self(Mutex::new(StdRng::from_entropy()))
    }

    pub fn seeded(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    pub fn fork(&self) -> StdRng {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        StdRng::seed_from_u64(guard.gen())
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
