//! 64-bit SimHash signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Locality-sensitive signature of a content item.
///
/// Near-identical items produce signatures that differ in only a few bits,
/// so similarity is measured with [`Signature::hamming_distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(u64);

impl Signature {
    /// Wraps a raw 64-bit value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Number of differing bits between two signatures.
    ///
    /// ```rust
    /// use quizpool::Signature;
    ///
    /// let a = Signature::new(0b1011);
    /// let b = Signature::new(0b0001);
    /// assert_eq!(a.hamming_distance(b), 2);
    /// ```
    #[must_use]
    pub const fn hamming_distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Whether two signatures are within `threshold` bits of each other.
    #[must_use]
    pub const fn is_near(self, other: Self, threshold: u32) -> bool {
        self.hamming_distance(other) <= threshold
    }

    /// Encodes as 16 lowercase hex characters (big-endian).
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Decodes a 16-character hex string.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the string is not exactly eight
    /// hex-encoded bytes.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| crate::Error::InvalidInput(format!("invalid signature '{s}': {e}")))?;
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            crate::Error::InvalidInput(format!("signature '{s}' is not 8 bytes long"))
        })?;
        Ok(Self(u64::from_be_bytes(array)))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Signature {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_preserves_leading_zeros() {
        let sig = Signature::new(0x00ab_cdef_0000_0001);
        let hex = sig.to_hex();
        assert_eq!(hex, "00abcdef00000001");
        assert_eq!(Signature::from_hex(&hex).ok(), Some(sig));
    }

    #[test]
    fn test_display_matches_hex() {
        let sig = Signature::new(u64::MAX - 1);
        assert_eq!(sig.to_string(), sig.to_hex());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Signature::from_hex("xyz").is_err());
        assert!(Signature::from_hex("abcd").is_err());
        assert!(Signature::from_hex("00112233445566778899").is_err());
    }

    #[test]
    fn test_hamming_distance() {
        let a = Signature::new(0);
        assert_eq!(a.hamming_distance(Signature::new(u64::MAX)), 64);
        assert_eq!(a.hamming_distance(a), 0);
        assert!(a.is_near(Signature::new(0b11), 2));
        assert!(!a.is_near(Signature::new(0b111), 2));
    }
}
