use proptest::prelude::*;

use votestorm_types::{encode_answer, EncodedAnswer, VoteWeight};

proptest! {
    /// Encoding is total: two lowercase hex digits per input value.
    #[test]
    fn encoded_length_is_twice_input(values in prop::collection::vec(any::<u64>(), 0..64)) {
        let encoded = encode_answer(&values);
        prop_assert_eq!(encoded.len(), values.len() * 2);
        prop_assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Encoding is deterministic.
    #[test]
    fn encoding_is_deterministic(values in prop::collection::vec(any::<u64>(), 0..64)) {
        prop_assert_eq!(encode_answer(&values), encode_answer(&values));
    }

    /// Each pair of digits is the value reduced modulo 256, in input order.
    #[test]
    fn digit_pairs_match_values_mod_256(values in prop::collection::vec(any::<u64>(), 1..32)) {
        let encoded = encode_answer(&values);
        for (i, value) in values.iter().enumerate() {
            let pair = &encoded[i * 2..i * 2 + 2];
            prop_assert_eq!(u64::from_str_radix(pair, 16).unwrap(), value % 256);
        }
    }

    /// Synthetic answers are always three bytes long.
    #[test]
    fn synthetic_answers_have_three_bytes(index in 1u32..100_000) {
        prop_assert_eq!(EncodedAnswer::synthetic(index).byte_len(), 3);
    }

    /// Display/parse agree for every representable amount.
    #[test]
    fn vote_weight_display_parses_back(zats in any::<u64>()) {
        let weight = VoteWeight::from_zats(zats);
        let parsed: VoteWeight = weight.to_string().parse().unwrap();
        prop_assert_eq!(parsed, weight);
    }

    /// Scaling a per-index amount never wraps silently.
    #[test]
    fn checked_mul_matches_integer_math(base in 0u64..1_000_000, factor in 0u64..10_000) {
        let weight = VoteWeight::from_zats(base);
        prop_assert_eq!(weight.checked_mul(factor).unwrap().zats(), base * factor);
    }
}
