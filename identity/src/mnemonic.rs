//! BIP39 seed-phrase generation.
//!
//! Each seed is a 24-word mnemonic encoding 32 bytes drawn from the operating
//! system's CSPRNG. At 256 bits of entropy, collisions within a run are not a
//! practical concern, so no uniqueness check is made.

use bip39::Mnemonic;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

use votestorm_types::SeedPhrase;

/// Bytes of entropy behind every generated phrase.
pub const SEED_ENTROPY_BYTES: usize = 32;

/// Errors arising from mnemonic operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("mnemonic generation failed: {0}")]
    Generation(String),
}

/// Generate a new 24-word BIP39 seed phrase.
pub fn generate_seed() -> Result<SeedPhrase, IdentityError> {
    let mut entropy = [0u8; SEED_ENTROPY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic =
        Mnemonic::from_entropy(&entropy).map_err(|e| IdentityError::Generation(e.to_string()));
    entropy.zeroize();
    Ok(SeedPhrase::new(mnemonic?.to_string()))
}

/// Whether `phrase` is a valid BIP39 mnemonic.
pub fn validate_seed(phrase: &str) -> bool {
    Mnemonic::parse_normalized(phrase).is_ok()
}

/// Produces identity material for the accounts of a run.
///
/// Stateless today; kept as a value so callers hold one factory per run and
/// tests can count what it produced.
#[derive(Debug, Default)]
pub struct IdentityFactory {
    generated: std::sync::atomic::AtomicU64,
}

impl IdentityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_seed(&self) -> Result<SeedPhrase, IdentityError> {
        let seed = generate_seed()?;
        self.generated
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(seed)
    }

    /// Number of seeds handed out so far.
    pub fn generated(&self) -> u64 {
        self.generated.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_24_words() {
        let seed = generate_seed().unwrap();
        assert_eq!(seed.word_count(), 24);
    }

    #[test]
    fn generated_seed_is_valid() {
        let seed = generate_seed().unwrap();
        assert!(validate_seed(seed.expose()));
    }

    #[test]
    fn consecutive_seeds_differ() {
        let factory = IdentityFactory::new();
        let a = factory.generate_seed().unwrap();
        let b = factory.generate_seed().unwrap();
        assert_ne!(a.expose(), b.expose());
        assert_eq!(factory.generated(), 2);
    }

    #[test]
    fn invalid_seed_rejected() {
        assert!(!validate_seed("not a valid mnemonic phrase"));
        assert!(!validate_seed(""));
    }

    #[test]
    fn known_decoding_seed_is_valid() {
        assert!(validate_seed(
            "stool rich together paddle together pool raccoon promote attitude peasant latin concert"
        ));
    }
}
