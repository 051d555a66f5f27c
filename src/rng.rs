//! Deterministic per-iteration randomness.
//!
//! All user-visible randomness (panic rolls, delay picks, failure draws,
//! cancellation decisions) must consult the iteration RNG rather than
//! wall-clock or ambient entropy when a scenario seed is set (invariant,
//! `spec.md` §3, §9). The seed-to-RNG derivation is a pure function of
//! `(seed, iteration_index)`, hashed with `sha2` the way `version_control`
//! in the teacher crate hashes content for commit identity — repurposed
//! here for deterministic seeding instead of content addressing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Derive a reproducible 64-bit seed from a scenario seed and iteration
/// index. Two calls with the same inputs always return the same value.
pub fn derive_seed(seed: i64, iteration: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(iteration.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().expect("sha256 digest >= 8 bytes"))
}

/// Build the RNG for one iteration.
///
/// When `seed` is `Some`, the returned generator is a pure function of
/// `(seed, iteration)`. When `seed` is `None`, the generator is seeded
/// from the OS entropy source and carries no reproducibility guarantee.
pub fn iteration_rng(seed: Option<i64>, iteration: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(derive_seed(seed, iteration)),
        None => StdRng::seed_from_u64(rand::rng().random::<u64>()),
    }
}

/// A deterministic Bernoulli draw consuming one `f64` from the iteration
/// RNG, used by the `should_fail` probe.
pub fn bernoulli(rng: &mut StdRng, probability: f64) -> bool {
    if probability <= 0.0 {
        return false;
    }
    if probability >= 1.0 {
        return true;
    }
    rng.random::<f64>() < probability
}
