//! Crate-wide constants shared by hashing, tree nodes and proofs.

/// Width in bytes of every digest: leaves, internal nodes, roots and proof entries.
pub const DIGEST_SIZE: usize = 32;

/// Width in bytes of the length prefix written before variable-length record fields.
pub const LENGTH_PREFIX_SIZE: usize = 8;
