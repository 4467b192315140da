//! Mask key sources
//!
//! RFC 6455 asks for unpredictable mask keys but they carry no security
//! weight here, so any uniform source will do. Tests inject fixed sources.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt;

/// Supplies one masking key per outgoing frame
pub trait MaskKeySource: Send + fmt::Debug {
    /// Key for the next masked frame
    fn next_mask_key(&mut self) -> u32;
}

/// Uniform random 31-bit keys from a seeded `StdRng`
#[derive(Debug)]
pub struct RandomMaskKeys {
    rng: StdRng,
}

impl RandomMaskKeys {
    /// Seed from operating system entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for reproducible runs
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomMaskKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskKeySource for RandomMaskKeys {
    fn next_mask_key(&mut self) -> u32 {
        self.rng.gen_range(0..=i32::MAX as u32)
    }
}

/// Always yields 0, which leaves payloads unchanged on the wire.
///
/// Only meant for tests and traffic inspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroMaskKey;

impl MaskKeySource for ZeroMaskKey {
    fn next_mask_key(&mut self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_keys_are_31_bit() {
        let mut keys = RandomMaskKeys::new();
        for _ in 0..1000 {
            assert_eq!(keys.next_mask_key() & 0x8000_0000, 0);
        }
    }

    #[test]
    fn test_seeded_keys_repeat() {
        let mut a = RandomMaskKeys::from_seed(7);
        let mut b = RandomMaskKeys::from_seed(7);
        let first: Vec<u32> = (0..8).map(|_| a.next_mask_key()).collect();
        let second: Vec<u32> = (0..8).map(|_| b.next_mask_key()).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|&key| key != 0));
    }

    #[test]
    fn test_zero_key() {
        assert_eq!(ZeroMaskKey.next_mask_key(), 0);
    }
}
