//! Deterministic random source injection.
//!
//! The simulation's only genuinely random decisions are: per-tick clock
//! jitter, a worker's `maxClaim` sample at admission, and a worker's
//! request/release/terminate policy rolls. All of them go through this
//! trait so tests can swap in a fixed-seed generator (source design note:
//! "tests must inject a deterministic generator").

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RngSource: Send {
    fn gen_range_u64(&mut self, lo: u64, hi_inclusive: u64) -> u64;
    fn gen_range_u32(&mut self, lo: u32, hi_inclusive: u32) -> u32;
    fn gen_percent(&mut self) -> u8;
}

/// The production RNG: `rand`'s OS-seeded `StdRng`.
pub struct SystemRng(StdRng);

impl SystemRng {
    pub fn from_entropy() -> Self {
        SystemRng(StdRng::from_entropy())
    }

    pub fn from_seed(seed: u64) -> Self {
        SystemRng(StdRng::seed_from_u64(seed))
    }
}

impl RngSource for SystemRng {
    fn gen_range_u64(&mut self, lo: u64, hi_inclusive: u64) -> u64 {
        self.0.gen_range(lo..=hi_inclusive)
    }

    fn gen_range_u32(&mut self, lo: u32, hi_inclusive: u32) -> u32 {
        self.0.gen_range(lo..=hi_inclusive)
    }

    fn gen_percent(&mut self) -> u8 {
        self.0.gen_range(0..100)
    }
}

/// Deterministic generator for tests, including the integration suite
/// under `tests/`. Not behind `#[cfg(test)]`: an external test crate
/// compiles this library without that cfg active.
#[doc(hidden)]
pub mod test_support {
    use super::RngSource;

    /// A fully deterministic source that cycles through a fixed sequence,
    /// for tests that need to steer specific branches (e.g. force a
    /// release roll, or a particular resource id).
    pub struct ScriptedRng {
        values: Vec<u64>,
        pos: usize,
    }

    impl ScriptedRng {
        pub fn new(values: Vec<u64>) -> Self {
            ScriptedRng { values, pos: 0 }
        }

        fn next(&mut self) -> u64 {
            let v = self.values[self.pos % self.values.len()];
            self.pos += 1;
            v
        }
    }

    impl RngSource for ScriptedRng {
        fn gen_range_u64(&mut self, lo: u64, hi_inclusive: u64) -> u64 {
            let span = hi_inclusive - lo + 1;
            lo + (self.next() % span)
        }

        fn gen_range_u32(&mut self, lo: u32, hi_inclusive: u32) -> u32 {
            let span = (hi_inclusive - lo + 1) as u64;
            lo + (self.next() % span) as u32
        }

        fn gen_percent(&mut self) -> u8 {
            (self.next() % 100) as u8
        }
    }
}
