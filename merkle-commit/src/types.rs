//! Types shared between tree construction, proof generation and verification.

use crate::constants::DIGEST_SIZE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte digest: a leaf, an internal node, a root or a proof entry.
///
/// Ordering is byte-wise (big-endian numeric), which is the order the sorted-pair
/// rule uses. Text form is lowercase hex without a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub const fn into_bytes(self) -> [u8; DIGEST_SIZE] {
        self.0
    }

    /// Build a digest from an arbitrary slice, rejecting anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestParseError> {
        let arr: [u8; DIGEST_SIZE] = bytes
            .try_into()
            .map_err(|_| DigestParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse hex text, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| DigestParseError::InvalidHex(format!("{e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; DIGEST_SIZE] {
    fn from(d: Digest) -> Self {
        d.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Membership proof: sibling digests ordered from the leaf level upwards.
///
/// Sorted-pair mode fixes the position of every step, so no left/right flags are carried.
/// A proof is detached from the tree that produced it and can be verified with only
/// `(proof, root, leaf)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof {
    siblings: Vec<Digest>,
}

impl MerkleProof {
    pub fn new(siblings: Vec<Digest>) -> Self {
        Self { siblings }
    }

    pub fn siblings(&self) -> &[Digest] {
        &self.siblings
    }

    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    pub fn into_siblings(self) -> Vec<Digest> {
        self.siblings
    }

    /// Fold the proof onto `leaf` and return the root it implies.
    pub fn compute_root(&self, leaf: &Digest) -> Digest {
        self.siblings
            .iter()
            .fold(*leaf, |current, sibling| crate::hash::hash_pair(&current, sibling))
    }

    pub fn to_hex(&self) -> Vec<String> {
        self.siblings.iter().map(Digest::to_hex).collect()
    }

    pub fn from_hex<S: AsRef<str>>(items: &[S]) -> Result<Self, DigestParseError> {
        let siblings = items
            .iter()
            .map(|s| Digest::from_hex(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { siblings })
    }
}

impl From<Vec<Digest>> for MerkleProof {
    fn from(siblings: Vec<Digest>) -> Self {
        Self { siblings }
    }
}

/// Which leaf a proof is requested for.
///
/// Index is preferred because it disambiguates duplicate leaf values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafTarget {
    Index(usize),
    Value(Digest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_accepts_optional_prefix() {
        let plain = "11".repeat(32);
        let prefixed = format!("0x{plain}");
        assert_eq!(Digest::from_hex(&plain).unwrap(), Digest::new([0x11; 32]));
        assert_eq!(Digest::from_hex(&prefixed).unwrap(), Digest::new([0x11; 32]));
        assert_eq!(Digest::new([0x11; 32]).to_hex(), plain);
    }

    #[test]
    fn hex_rejects_wrong_length_and_garbage() {
        assert_eq!(Digest::from_hex("abcd"), Err(DigestParseError::InvalidLength(2)));
        assert!(matches!(Digest::from_hex("zz"), Err(DigestParseError::InvalidHex(_))));
        assert!(matches!(Digest::from_hex(&"0".repeat(63)), Err(DigestParseError::InvalidHex(_))));
    }

    #[test]
    fn ordering_is_bytewise() {
        let mut low = [0u8; 32];
        low[31] = 0xff;
        let mut high = [0u8; 32];
        high[0] = 0x01;
        assert!(Digest::new(low) < Digest::new(high));
    }

    #[test]
    fn proof_serializes_as_hex_array() {
        let proof = MerkleProof::new(vec![Digest::new([0xaa; 32]), Digest::new([0x01; 32])]);
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(json, format!("[\"{}\",\"{}\"]", "aa".repeat(32), "01".repeat(32)));

        let back: MerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn proof_from_hex_fails_on_any_bad_entry() {
        let good = "22".repeat(32);
        let err = MerkleProof::from_hex(&[good.as_str(), "0x1234"]).unwrap_err();
        assert_eq!(err, DigestParseError::InvalidLength(2));
    }
}
