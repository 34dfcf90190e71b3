//! Referral code generation.
//!
//! Codes are short, uppercase, human-shareable tokens: up to four alphanumeric
//! characters taken from the seed (the username), plus a random suffix. The
//! caller passes back codes known to collide and the generator retries with a
//! fresh suffix, up to a bounded attempt cap.

use std::collections::HashSet;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default maximum generation attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default length of the seed-derived prefix.
pub const DEFAULT_SEED_LEN: usize = 4;
/// Default length of the random suffix.
pub const DEFAULT_SUFFIX_LEN: usize = 4;

/// Errors from code generation.
#[derive(Debug, thiserror::Error)]
pub enum CodeGenError {
    /// Every candidate collided within the attempt cap. This indicates a
    /// degenerate seed space and is worth alerting on, so it is surfaced
    /// rather than swallowed.
    #[error("referral code generation exhausted after {attempts} attempts (seed: {seed})")]
    Exhausted { seed: String, attempts: u32 },
}

/// Collision-avoiding referral code generator.
pub struct ReferralCodeGenerator {
    seed_len: usize,
    suffix_len: usize,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl Default for ReferralCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_LEN, DEFAULT_SUFFIX_LEN, DEFAULT_MAX_ATTEMPTS)
    }
}

impl ReferralCodeGenerator {
    pub fn new(seed_len: usize, suffix_len: usize, max_attempts: u32) -> Self {
        Self {
            seed_len,
            suffix_len,
            max_attempts,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// The bounded attempt cap shared by generation and insert retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Generator with a fixed RNG seed, for deterministic tests.
    pub fn seeded(seed_len: usize, suffix_len: usize, max_attempts: u32, rng_seed: u64) -> Self {
        Self {
            seed_len,
            suffix_len,
            max_attempts,
            rng: Mutex::new(StdRng::seed_from_u64(rng_seed)),
        }
    }

    /// Produce a code derived from `seed` that is not in `avoid`.
    ///
    /// `avoid` holds codes the caller has already seen collide (for example
    /// after a failed uniqueness check at insert time). Degenerate seeds with
    /// no alphanumeric characters still produce suffix-only codes.
    pub fn generate(&self, seed: &str, avoid: &HashSet<String>) -> Result<String, CodeGenError> {
        for _ in 0..self.max_attempts {
            let candidate = self.candidate(seed);
            if !avoid.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(CodeGenError::Exhausted {
            seed: seed.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn candidate(&self, seed: &str) -> String {
        let prefix: String = seed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(self.seed_len)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        let suffix: String = (0..self.suffix_len)
            .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
            .collect();

        format!("{prefix}{suffix}")
    }
}
