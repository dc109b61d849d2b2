//! `RandomSource` collaborator: a swappable `RngCore` seam rather than an
//! inlined `OsRng`, since id uniqueness must hold under test as well as in
//! production.

use rand::rngs::OsRng;
use rand::RngCore;

pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Deterministic source for tests: a counter-seeded xorshift-ish stream.
/// Never used outside `#[cfg(test)]` code.
#[derive(Debug)]
pub struct FixedRandom {
    seed: std::sync::atomic::AtomicU64,
}

impl FixedRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            // xorshift64 has a fixed point at 0; nudge it off that point
            // with a constant so `FixedRandom::new(0)` is still useful.
            seed: std::sync::atomic::AtomicU64::new(seed ^ 0x9E37_79B9_7F4A_7C15),
        }
    }
}

impl RandomSource for FixedRandom {
    fn fill(&self, buf: &mut [u8]) {
        use std::sync::atomic::Ordering;
        for byte in buf.iter_mut() {
            let mut x = self.seed.load(Ordering::Relaxed);
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.seed.store(x, Ordering::Relaxed);
            *byte = (x & 0xff) as u8;
        }
    }
}
