//! Registry service for batch commitments.
//!
//! Insurers publish batches of records as Merkle roots onto an append-only,
//! hash-linked chain of root records; verifiers check membership proofs against
//! published roots. All tree work is delegated to `merkle_commit`.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod membership;
pub mod models;
pub mod policy;
pub mod state;
