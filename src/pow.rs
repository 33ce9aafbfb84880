//! Proof-of-work difficulty evaluation
//!
//! A digest's HashPower score is its count of leading zero bits. Templates
//! carry a minimum score (`hashpower_limit`) a solution must reach.

/// Count the leading zero bits of a digest.
///
/// Whole zero bytes contribute 8 bits each; the first non-zero byte
/// contributes its own leading zeros and ends the scan. An all-zero digest
/// scores `8 * len`.
pub fn hash_power(digest: &[u8]) -> u64 {
    let mut score = 0u64;
    for &byte in digest {
        if byte == 0 {
            score += 8;
        } else {
            return score + byte.leading_zeros() as u64;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_zero_digest() {
        assert_eq!(hash_power(&[0u8; 32]), 256);
        assert_eq!(hash_power(&[0u8; 4]), 32);
        assert_eq!(hash_power(&[]), 0);
    }

    #[test]
    fn test_first_nonzero_byte() {
        assert_eq!(hash_power(&[0x80]), 0);
        assert_eq!(hash_power(&[0x01]), 7);
        assert_eq!(hash_power(&[0x00, 0x40]), 9);
        assert_eq!(hash_power(&[0x00, 0x00, 0x01, 0xff]), 23);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        // Only bytes up to and including the first non-zero one matter.
        assert_eq!(hash_power(&[0x00, 0x10, 0x00]), hash_power(&[0x00, 0x10, 0xff]));
    }

    proptest! {
        /// More leading zero bits never yields a lower score.
        #[test]
        fn monotonic_in_leading_zeros(zeros in 0usize..255, rest in any::<u8>()) {
            let mut more = vec![0u8; 32];
            let mut fewer = vec![0u8; 32];

            let byte = zeros / 8;
            let bit = zeros % 8;
            // `fewer` has a set bit at position `zeros`; `more` one bit later.
            fewer[byte] = 0x80 >> bit;
            let next = zeros + 1;
            more[next / 8] = 0x80 >> (next % 8);
            // Noise below the leading bit must not change the ordering.
            if byte + 1 < 32 {
                fewer[byte + 1] |= rest;
                more[byte + 1] |= rest & (0xff >> (next % 8 + 1).min(7));
            }

            prop_assert!(hash_power(&more) >= hash_power(&fewer));
        }
    }
}
