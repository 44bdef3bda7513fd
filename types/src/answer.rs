//! Encoded-answer wire format.
//!
//! A vote's content is a sequence of small integers. Each is reduced modulo
//! 256 and rendered as exactly two lowercase hex digits; the digits are
//! concatenated in order with no separator, so `[1, 2, 3]` becomes `"010203"`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hex-encoded vote payload, ready to be sent as `voteContent`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedAnswer(String);

impl EncodedAnswer {
    /// Encode a sequence of integers. Values outside `0..=255` wrap modulo 256.
    pub fn encode<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<u64>,
    {
        let bytes: Vec<u8> = values
            .into_iter()
            .map(|v| (v.into() % 256) as u8)
            .collect();
        Self(hex::encode(bytes))
    }

    /// The synthetic load-generation answer for a 1-based account index:
    /// the bytes `[i, i + 1, i + 2]`.
    pub fn synthetic(index: u32) -> Self {
        let i = u64::from(index);
        Self::encode([i, i + 1, i + 2])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of encoded bytes (half the string length).
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }
}

impl fmt::Display for EncodedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`EncodedAnswer::encode`] returning the bare string.
pub fn encode_answer(values: &[u64]) -> String {
    EncodedAnswer::encode(values.iter().copied()).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_in_order_with_two_digits_each() {
        assert_eq!(encode_answer(&[1, 2, 3]), "010203");
        assert_eq!(encode_answer(&[5, 6, 7]), "050607");
        assert_eq!(encode_answer(&[255, 16, 0]), "ff1000");
    }

    #[test]
    fn wraps_modulo_256() {
        assert_eq!(encode_answer(&[256, 257, 511]), "0001ff");
    }

    #[test]
    fn empty_sequence_encodes_to_empty_string() {
        assert_eq!(encode_answer(&[]), "");
        assert_eq!(EncodedAnswer::encode(Vec::<u8>::new()).byte_len(), 0);
    }

    #[test]
    fn synthetic_answer_follows_account_index() {
        assert_eq!(EncodedAnswer::synthetic(1).as_str(), "010203");
        assert_eq!(EncodedAnswer::synthetic(2).as_str(), "020304");
        assert_eq!(EncodedAnswer::synthetic(254).as_str(), "feff00");
    }
}
