//! Secret phrases: account seeds and the election decoding seed.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A BIP39 seed phrase from which the backend derives an account's keys.
///
/// The phrase is zeroized on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SeedPhrase(String);

impl SeedPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase(<{} words>)", self.word_count())
    }
}

/// The election's decoding secret, shared out of band with the backend.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodingSeed(String);

impl DecodingSeed {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DecodingSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecodingSeed(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_the_phrase() {
        let seed = SeedPhrase::new("stool rich together paddle");
        let rendered = format!("{seed:?}");
        assert!(!rendered.contains("stool"));
        assert!(rendered.contains("4 words"));

        let decoding = DecodingSeed::new("latin concert");
        assert!(!format!("{decoding:?}").contains("latin"));
    }
}
