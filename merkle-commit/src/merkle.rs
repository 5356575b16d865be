//! Tree construction, membership proof generation and proof verification.
//!
//! Build and prove share one level layout: level 0 holds the leaves, each next level
//! pairs adjacent nodes left to right with [`hash_pair`], and a trailing lone node is
//! promoted unchanged. Verification needs only `(proof, root, leaf)`.

use crate::hash::hash_pair;
use crate::types::{Digest, LeafTarget, MerkleProof};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a tree over zero leaves")]
    EmptyInput,

    #[error("leaf {0} is not part of the leaf set")]
    LeafNotFound(Digest),

    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange { index: usize, leaf_count: usize },
}

/// A fully built tree. Immutable: changing membership means building a new tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build every level over `leaves` (in the given order).
    pub fn build(leaves: &[Digest]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut levels = vec![leaves.to_vec()];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next = next_level(current);
            levels.push(next);
        }

        debug!(leaf_count = leaves.len(), depth = levels.len() - 1, "merkle tree built");
        Ok(Self { levels })
    }

    pub fn root(&self) -> Digest {
        // `build` guarantees at least one level and a single-node top level.
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Number of levels above the leaves. A single-leaf tree has depth 0.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// Position of the first leaf equal to `leaf`.
    pub fn position(&self, leaf: &Digest) -> Option<usize> {
        self.leaves().iter().position(|l| l == leaf)
    }

    /// Proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(MerkleError::IndexOutOfRange { index, leaf_count });
        }

        let mut siblings = Vec::with_capacity(self.depth());
        let mut i = index;
        for level in &self.levels[..self.depth()] {
            // A promoted trailing node has no sibling and contributes no step.
            if let Some(sibling) = level.get(i ^ 1) {
                siblings.push(*sibling);
            }
            i /= 2;
        }

        Ok(MerkleProof::new(siblings))
    }

    /// Proof for the first leaf equal to `leaf`.
    pub fn prove_leaf(&self, leaf: &Digest) -> Result<MerkleProof, MerkleError> {
        let index = self.position(leaf).ok_or(MerkleError::LeafNotFound(*leaf))?;
        self.prove(index)
    }

    pub fn prove_target(&self, target: LeafTarget) -> Result<MerkleProof, MerkleError> {
        match target {
            LeafTarget::Index(index) => self.prove(index),
            LeafTarget::Value(leaf) => self.prove_leaf(&leaf),
        }
    }
}

fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [lone] => *lone,
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}

/// Compute the root of `leaves` without keeping the intermediate levels.
pub fn build_root(leaves: &[Digest]) -> Result<Digest, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyInput);
    }

    let mut current = leaves.to_vec();
    while current.len() > 1 {
        current = next_level(&current);
    }
    Ok(current[0])
}

/// Build a tree over `leaves` and produce the proof for `target`.
pub fn prove_membership(leaves: &[Digest], target: LeafTarget) -> Result<MerkleProof, MerkleError> {
    MerkleTree::build(leaves)?.prove_target(target)
}

/// Check that `proof` links `leaf` to `root`.
///
/// Runs on untrusted input: any proof that is empty, truncated, padded or tampered with
/// simply fails to reproduce `root` and yields `false`.
pub fn verify(proof: &MerkleProof, root: &Digest, leaf: &Digest) -> bool {
    proof.compute_root(leaf) == *root
}

/// [`verify`] over hex text. Malformed digests verify as `false`.
pub fn verify_hex<S: AsRef<str>>(proof: &[S], root: &str, leaf: &str) -> bool {
    let (Ok(proof), Ok(root), Ok(leaf)) = (
        MerkleProof::from_hex(proof),
        Digest::from_hex(root),
        Digest::from_hex(leaf),
    ) else {
        return false;
    };
    verify(&proof, &root, &leaf)
}
