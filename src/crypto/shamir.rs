//! Shamir secret sharing over GF(2^8).
//!
//! Each secret byte gets its own random polynomial of degree `threshold - 1`
//! with the byte as constant term. A share is the polynomial values at one
//! x-coordinate followed by that coordinate:
//!
//! ```text
//! y_0 || y_1 || ... || y_{len-1} || x
//! ```
//!
//! X-coordinates are distinct, non-zero and drawn in random order, so a share
//! doesn't reveal its position. Fewer than `threshold` shares are independent
//! of the secret.

use rand::{rngs::OsRng, seq::SliceRandom, RngCore};
use zeroize::Zeroizing;

use super::{CryptoError, CryptoResult, SecretBytes};

/// Smallest threshold that still splits anything.
pub const MIN_THRESHOLD: usize = 2;

/// GF(2^8) has 255 non-zero x-coordinates.
pub const MAX_SHARES: usize = 255;

/// Arithmetic in GF(2^8) with the AES polynomial x^8 + x^4 + x^3 + x + 1.
mod gf256 {
    pub const fn mul(mut a: u8, mut b: u8) -> u8 {
        let mut result: u8 = 0;
        let mut i = 0;
        while i < 8 {
            if b & 1 != 0 {
                result ^= a;
            }
            let carry = a & 0x80;
            a <<= 1;
            if carry != 0 {
                a ^= 0x1B;
            }
            b >>= 1;
            i += 1;
        }
        result
    }

    /// a^254, which is a^-1 for non-zero a.
    pub const fn inv(a: u8) -> u8 {
        let mut result = 1u8;
        let mut base = a;
        let mut exp = 254u8;
        while exp > 0 {
            if exp & 1 != 0 {
                result = mul(result, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Horner evaluation, `coeffs[0]` is the constant term.
    pub fn eval(coeffs: &[u8], x: u8) -> u8 {
        coeffs.iter().rev().fold(0u8, |acc, &c| mul(acc, x) ^ c)
    }
}

/// Split `secret` into `total` shares, any `threshold` of which recombine it.
pub fn split(secret: &SecretBytes, total: usize, threshold: usize) -> CryptoResult<Vec<SecretBytes>> {
    if threshold < MIN_THRESHOLD || threshold > total || total > MAX_SHARES {
        return Err(CryptoError::InvalidThresholdParameters { threshold, total });
    }
    if secret.is_empty() {
        return Err(CryptoError::EmptySecret);
    }

    let secret = secret.expose();
    let mut xs: Vec<u8> = (1..=MAX_SHARES as u8).collect();
    xs.shuffle(&mut OsRng);
    xs.truncate(total);

    // Wiped on every exit, including an RNG failure halfway through.
    let mut outputs: Vec<Zeroizing<Vec<u8>>> = xs
        .iter()
        .map(|&x| {
            let mut share = Zeroizing::new(vec![0u8; secret.len() + 1]);
            share[secret.len()] = x;
            share
        })
        .collect();

    let mut coeffs = Zeroizing::new(vec![0u8; threshold]);
    for (idx, &byte) in secret.iter().enumerate() {
        coeffs[0] = byte;
        OsRng
            .try_fill_bytes(&mut coeffs[1..])
            .map_err(|e| CryptoError::Rng(e.to_string()))?;

        for (share, &x) in outputs.iter_mut().zip(&xs) {
            share[idx] = gf256::eval(&coeffs, x);
        }
    }

    Ok(outputs.into_iter().map(SecretBytes::from).collect())
}

/// Recombine a secret from shares produced by [`split`].
///
/// Structurally broken sets (too few, mixed lengths, repeated or zero
/// x-coordinates) fail. A well-formed set from the wrong split, or one with
/// fewer shares than the split's threshold, yields a wrong value; callers must
/// verify the result.
pub fn combine(shares: &[SecretBytes]) -> CryptoResult<SecretBytes> {
    if shares.len() < MIN_THRESHOLD {
        return Err(CryptoError::InvalidShares("at least two shares are required"));
    }

    let share_len = shares[0].len();
    if share_len < 2 {
        return Err(CryptoError::InvalidShares("share too short"));
    }
    if shares.iter().any(|s| s.len() != share_len) {
        return Err(CryptoError::InvalidShares("shares have different lengths"));
    }

    let xs: Vec<u8> = shares.iter().map(|s| s.expose()[share_len - 1]).collect();
    if xs.contains(&0) {
        return Err(CryptoError::InvalidShares("zero x-coordinate"));
    }
    let mut sorted = xs.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(CryptoError::InvalidShares("duplicate share"));
    }

    // Lagrange basis at x = 0; subtraction is XOR in GF(2^8).
    let basis: Vec<u8> = (0..xs.len())
        .map(|j| {
            let (num, den) = xs
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .fold((1u8, 1u8), |(num, den), (_, &xk)| {
                    (gf256::mul(num, xk), gf256::mul(den, xs[j] ^ xk))
                });
            gf256::mul(num, gf256::inv(den))
        })
        .collect();

    let secret: Zeroizing<Vec<u8>> = Zeroizing::new(
        (0..share_len - 1)
            .map(|idx| {
                shares
                    .iter()
                    .zip(&basis)
                    .fold(0u8, |acc, (share, &b)| acc ^ gf256::mul(share.expose()[idx], b))
            })
            .collect(),
    );

    Ok(SecretBytes::from(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secret() -> SecretBytes {
        SecretBytes::new((0u8..32).collect())
    }

    #[test]
    fn test_gf256_inverse_exhaustive() {
        for a in 1..=255u8 {
            assert_eq!(gf256::mul(a, gf256::inv(a)), 1, "a={a}");
        }
    }

    #[test]
    fn test_gf256_eval_constant_and_linear() {
        assert_eq!(gf256::eval(&[42], 200), 42);
        assert_eq!(gf256::eval(&[5, 3], 1), 5 ^ 3);
        assert_eq!(gf256::eval(&[5, 3], 0), 5);
    }

    #[test]
    fn test_split_layout() {
        let shares = split(&secret(), 5, 3).unwrap();
        assert_eq!(shares.len(), 5);
        for share in &shares {
            assert_eq!(share.len(), 33);
            assert_ne!(share.expose()[32], 0);
        }
        let mut xs: Vec<u8> = shares.iter().map(|s| s.expose()[32]).collect();
        xs.sort_unstable();
        xs.dedup();
        assert_eq!(xs.len(), 5);
    }

    #[test]
    fn test_threshold_subset_recovers() {
        let shares = split(&secret(), 5, 3).unwrap();
        let subset = vec![shares[4].clone(), shares[0].clone(), shares[2].clone()];
        assert_eq!(combine(&subset).unwrap(), secret());
        assert_eq!(combine(&shares).unwrap(), secret());
    }

    #[test]
    fn test_below_threshold_does_not_recover() {
        let shares = split(&secret(), 5, 3).unwrap();
        let result = combine(&shares[..2]).unwrap();
        assert_ne!(result, secret());
    }

    #[test]
    fn test_invalid_parameters() {
        for (total, threshold) in [(5, 1), (3, 4), (256, 2), (1, 1)] {
            assert!(matches!(
                split(&secret(), total, threshold),
                Err(CryptoError::InvalidThresholdParameters { .. })
            ));
        }
        assert!(split(&secret(), 255, 255).is_ok());
        assert!(matches!(
            split(&SecretBytes::default(), 3, 2),
            Err(CryptoError::EmptySecret)
        ));
    }

    #[test]
    fn test_combine_rejects_malformed_sets() {
        let shares = split(&secret(), 3, 2).unwrap();

        assert!(combine(&shares[..1]).is_err());
        assert!(combine(&[shares[0].clone(), shares[0].clone()]).is_err());

        let short = SecretBytes::from_slice(&shares[1].expose()[1..]);
        assert!(combine(&[shares[0].clone(), short]).is_err());

        let mut zero_x = shares[1].expose().to_vec();
        *zero_x.last_mut().unwrap() = 0;
        assert!(combine(&[shares[0].clone(), SecretBytes::new(zero_x)]).is_err());
    }

    #[test]
    fn test_foreign_shares_do_not_recover() {
        let ours = split(&secret(), 3, 2).unwrap();
        let other = SecretBytes::new(vec![0xAA; 32]);
        let theirs = split(&other, 3, 2).unwrap();

        let mixed = [ours[0].clone(), theirs[1].clone()];
        match combine(&mixed) {
            Ok(value) => assert_ne!(value, secret()),
            Err(CryptoError::InvalidShares(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_any_threshold_subset_recovers(
            bytes in proptest::collection::vec(any::<u8>(), 1..48),
            total in 2usize..=20,
            threshold_seed in any::<usize>(),
            order in any::<u64>(),
        ) {
            let threshold = MIN_THRESHOLD + threshold_seed % (total - 1);
            let secret = SecretBytes::new(bytes);
            let shares = split(&secret, total, threshold).unwrap();

            let mut picked: Vec<SecretBytes> = shares.clone();
            let rotate = (order as usize) % picked.len();
            picked.rotate_left(rotate);
            picked.truncate(threshold);

            prop_assert_eq!(combine(&picked).unwrap(), secret);
        }
    }
}
