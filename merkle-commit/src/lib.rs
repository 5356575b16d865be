//! Merkle commitment engine for the batch commitment ledger.
//!
//! This crate contains:
//! - Record hashing (Keccak-256) and a fixed-width record encoder.
//! - Tree construction, membership proof generation and proof verification.
//! - Digest/proof types that serialize to hex for transport.
//!
//! Pairing rule: sorted-pair, `keccak256(min(a, b) ++ max(a, b))`.
//! Odd-node rule: a trailing lone node is promoted unchanged to the next level.

pub mod constants;
pub mod hash;
pub mod merkle;
pub mod types;

pub use hash::{hash_pair, hash_record, RecordEncoder};
pub use merkle::{build_root, prove_membership, verify, verify_hex, MerkleError, MerkleTree};
pub use types::{Digest, DigestParseError, LeafTarget, MerkleProof};
