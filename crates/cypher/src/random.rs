//! Randomness source abstraction
//!
//! The service takes its randomness as an explicit dependency so tests
//! can substitute a deterministic source; production code uses
//! [`OsRandom`].

use rand::rngs::OsRng;
use rand::RngCore;

/// Source of cryptographically secure random bytes
pub trait RandomSource: Send + Sync {
    /// Fill the buffer with random bytes
    fn fill(&self, buffer: &mut [u8]);
}

/// Operating-system randomness
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}
