//! Record hashing and the node pairing rule.
//!
//! Every participant (issuer and verifier) must hash the same record bytes, so
//! structured records go through [`RecordEncoder`], which only emits fixed-width
//! fields or length-prefixed byte strings.

use crate::constants::{DIGEST_SIZE, LENGTH_PREFIX_SIZE};
use crate::types::Digest;
use sha3::{Digest as _, Keccak256};

/// Hash an already-encoded record into its leaf digest.
///
/// Keccak-256 with the original Keccak padding (the `keccak256` used by Ethereum),
/// not FIPS-202 SHA3-256.
pub fn hash_record(bytes: &[u8]) -> Digest {
    let out: [u8; DIGEST_SIZE] = Keccak256::digest(bytes).into();
    Digest::new(out)
}

/// Combine two nodes into their parent: `keccak256(min(a, b) ++ max(a, b))`.
///
/// Commutative in its arguments. Both tree construction and verification go through here.
pub fn hash_pair(a: &Digest, b: &Digest) -> Digest {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut hasher = Keccak256::new();
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    let out: [u8; DIGEST_SIZE] = hasher.finalize().into();
    Digest::new(out)
}

/// Builder for the canonical byte encoding of a structured record.
///
/// Integers are big-endian and fixed width; byte strings carry a big-endian `u64`
/// length prefix. Two different field sequences can never encode to the same bytes
/// as long as both sides use the same field order.
#[derive(Clone, Debug, Default)]
pub struct RecordEncoder {
    buf: Vec<u8>,
}

impl RecordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn digest(mut self, d: &Digest) -> Self {
        self.buf.extend_from_slice(d.as_bytes());
        self
    }

    /// Append a variable-length byte string behind its big-endian `u64` length.
    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.buf.reserve(LENGTH_PREFIX_SIZE + v.len());
        self.buf.extend_from_slice(&(v.len() as u64).to_be_bytes());
        self.buf.extend_from_slice(v);
        self
    }

    pub fn str(self, v: &str) -> Self {
        self.bytes(v.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Leaf digest of the encoded record.
    pub fn hash(&self) -> Digest {
        hash_record(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_known_vectors() {
        assert_eq!(
            hash_record(b"").to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hash_record(b"abc").to_hex(),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn pair_is_commutative_and_matches_sorted_concat() {
        let a = hash_record(b"alice");
        let b = hash_record(b"bob");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));

        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let mut concat = lo.as_bytes().to_vec();
        concat.extend_from_slice(hi.as_bytes());
        assert_eq!(hash_pair(&a, &b), hash_record(&concat));
    }

    #[test]
    fn encoder_is_fixed_width_and_length_prefixed() {
        let bytes = RecordEncoder::new().u8(1).u16(2).u32(3).u64(4).str("ab").finish();
        assert_eq!(
            bytes,
            vec![1, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn encoder_distinguishes_field_boundaries() {
        let a = RecordEncoder::new().str("ab").str("c");
        let b = RecordEncoder::new().str("a").str("bc");
        assert_ne!(a.hash(), b.hash());
    }
}
