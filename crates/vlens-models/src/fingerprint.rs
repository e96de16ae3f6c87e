//! Fixed-length binary fingerprints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-length bit-string summarizing coarse image structure.
///
/// Bits are packed little-endian into 64-bit words; `len` is the number of
/// meaningful bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    words: Vec<u64>,
    len: usize,
}

impl Fingerprint {
    /// Build a fingerprint from individual bits, in order.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut words = Vec::new();
        let mut len = 0usize;
        for bit in bits {
            if len % 64 == 0 {
                words.push(0);
            }
            if bit {
                words[len / 64] |= 1 << (len % 64);
            }
            len += 1;
        }
        Self { words, len }
    }

    /// Build a 64-bit fingerprint from a single word.
    pub fn from_u64(value: u64) -> Self {
        Self {
            words: vec![value],
            len: 64,
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of bit `index`.
    pub fn bit(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Count of differing bits.
    ///
    /// Fingerprints of different lengths are not comparable; the longer
    /// length is returned so that such pairs never look similar.
    pub fn hamming_distance(&self, other: &Fingerprint) -> u32 {
        if self.len != other.len {
            return self.len.max(other.len) as u32;
        }
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.words.iter().rev() {
            write!(f, "{:016x}", word)?;
        }
        Ok(())
    }
}
