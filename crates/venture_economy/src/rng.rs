//! # Seeded Randomness
//!
//! Every random draw in the simulation core comes from a generator the caller
//! owns. Sessions and exploration calls get their own `ChaCha8Rng`, seeded by
//! SipHash-2-4 over a server secret, the player id and a monotonic nonce, so a
//! player cannot predict rolls without the secret and a replay with the same
//! secret reproduces a session exactly.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use siphasher::sip128::{Hasher128, SipHasher24};
use std::hash::Hasher;

/// Generator type owned by sessions and exploration calls.
pub type GameRng = ChaCha8Rng;

/// Rolls a success with probability `chance`, clamped to `[0, 1]`.
///
/// Returns the drawn roll alongside the outcome so callers can log it.
pub fn roll_chance<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> (bool, f64) {
    let roll: f64 = rng.gen();
    (roll < chance.clamp(0.0, 1.0), roll)
}

/// Derives per-player generators from a server secret.
#[derive(Clone)]
pub struct SeedDeriver {
    /// Server-side secret. Never exposed to clients.
    secret: [u64; 4],
}

impl SeedDeriver {
    /// Creates a deriver from 32 secret bytes.
    #[must_use]
    pub fn new(secret: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(secret.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        Self { secret: words }
    }

    /// Creates a test deriver (NOT FOR PRODUCTION).
    #[must_use]
    pub const fn test_seed() -> Self {
        Self {
            secret: [
                0x1234_5678_9ABC_DEF0,
                0xFEDC_BA98_7654_3210,
                0xAAAA_BBBB_CCCC_DDDD,
                0x1111_2222_3333_4444,
            ],
        }
    }

    /// Derives the 256-bit seed for `(player_id, nonce)`.
    #[must_use]
    pub fn derive_seed(&self, player_id: u64, nonce: u64) -> [u8; 32] {
        let mut seed = [0u8; 32];
        let halves = [
            (self.secret[0], self.secret[1]),
            (self.secret[2], self.secret[3]),
        ];
        for (chunk, (k0, k1)) in seed.chunks_exact_mut(16).zip(halves) {
            let mut hasher = SipHasher24::new_with_keys(k0, k1);
            hasher.write_u64(player_id);
            hasher.write_u64(nonce);
            chunk.copy_from_slice(&hasher.finish128().as_bytes());
        }
        seed
    }

    /// A generator for `(player_id, nonce)`.
    #[must_use]
    pub fn rng_for(&self, player_id: u64, nonce: u64) -> GameRng {
        GameRng::from_seed(self.derive_seed(player_id, nonce))
    }
}

impl Default for SeedDeriver {
    fn default() -> Self {
        Self::test_seed()
    }
}

impl std::fmt::Debug for SeedDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // NEVER expose the secret in debug output
        f.debug_struct("SeedDeriver")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
