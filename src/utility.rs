//! Word and integer conversions shared by the translation and verification
//! stages.

use std::fmt::{Debug, Display, Formatter};

use ethnum::U256;
use num::{bigint::Sign, BigInt, One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constant::{WORD_SIZE_BITS, WORD_SIZE_BYTES};

pub type U256W = U256Wrapper;

/// A machine word that serialises as a `0x`-prefixed, zero-padded hex string
/// and prints in decimal.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct U256Wrapper(pub U256);

impl Debug for U256Wrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Display for U256Wrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<U256> for U256Wrapper {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<U256Wrapper> for U256 {
    fn from(wrapper: U256Wrapper) -> Self {
        wrapper.0
    }
}

impl From<usize> for U256Wrapper {
    fn from(value: usize) -> Self {
        Self(U256::from(value as u64))
    }
}

impl From<u64> for U256Wrapper {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl Serialize for U256Wrapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0.to_be_bytes())))
    }
}

impl<'de> Deserialize<'de> for U256Wrapper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        U256::from_str_hex(&text).map(Self).map_err(serde::de::Error::custom)
    }
}

/// Interprets the machine `word` as a non-negative unbounded integer.
#[must_use]
pub fn word_to_integer(word: U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &word.to_be_bytes())
}

/// Interprets the low `bits` of the machine `word` as a two's complement
/// signed integer.
#[must_use]
pub fn word_to_signed_integer(word: U256, bits: usize) -> BigInt {
    let bits = bits.clamp(1, WORD_SIZE_BITS);
    let unsigned = word_to_integer(word & low_bits_mask(bits));
    if unsigned >= pow2(bits - 1) {
        unsigned - pow2(bits)
    } else {
        unsigned
    }
}

/// Converts an unbounded integer back into a machine word, returning [`None`]
/// if it does not lie in `[0, 2^256)`.
#[must_use]
pub fn integer_to_word(value: &BigInt) -> Option<U256> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > WORD_SIZE_BYTES {
        return None;
    }
    if value.is_zero() {
        return Some(U256::ZERO);
    }

    let mut word = [0u8; WORD_SIZE_BYTES];
    word[WORD_SIZE_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Some(U256::from_be_bytes(word))
}

/// Converts a small machine `word` into an offset, returning [`None`] if it
/// does not fit in 32 bits.
#[must_use]
pub fn word_to_offset(word: U256) -> Option<usize> {
    (word <= U256::from(u32::MAX)).then(|| word.as_u32() as usize)
}

/// Computes `2^exponent` as an unbounded integer.
#[must_use]
pub fn pow2(exponent: usize) -> BigInt {
    BigInt::one() << exponent
}

/// Computes a word with the lowest `bits` bits set.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Widths never exceed 256
pub fn low_bits_mask(bits: usize) -> U256 {
    if bits >= WORD_SIZE_BITS {
        U256::MAX
    } else {
        (U256::ONE << bits as u32) - U256::ONE
    }
}
