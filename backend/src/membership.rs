//! Verification path: issue membership proofs for published batches and check proofs
//! presented by third parties.

use crate::db;
use crate::errors::{internal, ApiError};
use crate::models::{EventKind, ProofRequest, ProofResponse, RecordEncoding, VerifyRequest, VerifyResponse};
use crate::policy::Caller;
use crate::state::AppState;
use merkle_commit::{hash_record, verify, Digest, LeafTarget, MerkleError, MerkleProof, MerkleTree};
use serde_json::json;
use tracing::{debug, info};

fn leaf_target(req: &ProofRequest) -> Result<LeafTarget, ApiError> {
    match (req.index, req.leaf.as_deref(), req.record.as_deref()) {
        (Some(index), None, None) => Ok(LeafTarget::Index(index)),
        (None, Some(leaf), None) => Digest::from_hex(leaf)
            .map(LeafTarget::Value)
            .map_err(|e| ApiError::BadRequest(format!("invalid leaf: {e}"))),
        (None, None, Some(record)) => Ok(LeafTarget::Value(hash_record(&req.encoding.decode(record)?))),
        _ => Err(ApiError::BadRequest(
            "exactly one of index, leaf or record is required".to_string(),
        )),
    }
}

pub async fn issue_proof(state: &AppState, caller: &Caller, req: ProofRequest) -> Result<ProofResponse, ApiError> {
    let target = leaf_target(&req)?;

    let Some(record) = db::get_root_record(&state.db, req.sequence).await? else {
        return Err(ApiError::NotFound(format!("no root record with sequence {}", req.sequence)));
    };

    let leaves = db::get_batch_leaves(&state.db, record.sequence).await?;

    let (leaf_index, leaf, proof, root) = tokio::task::spawn_blocking(move || {
        let tree = MerkleTree::build(&leaves)?;
        let leaf_index = match target {
            LeafTarget::Index(index) => index,
            LeafTarget::Value(leaf) => tree.position(&leaf).ok_or(MerkleError::LeafNotFound(leaf))?,
        };
        let proof = tree.prove(leaf_index)?;
        let leaf = tree.leaves()[leaf_index];
        Ok::<(usize, Digest, MerkleProof, Digest), ApiError>((leaf_index, leaf, proof, tree.root()))
    })
    .await
    .map_err(internal)??;

    // Stored leaves must rebuild the published root.
    if root != record.root {
        return Err(internal(format!(
            "stored leaves for sequence {} rebuild {root}, published {}",
            record.sequence, record.root
        )));
    }

    db::insert_event(
        &state.db,
        EventKind::ProofIssued,
        &caller.label,
        json!({ "sequence": record.sequence, "leaf_index": leaf_index, "leaf": leaf }),
    )
    .await?;

    debug!(sequence = record.sequence, leaf_index, proof_len = proof.len(), "proof issued");

    Ok(ProofResponse {
        sequence: record.sequence,
        root,
        leaf,
        leaf_index,
        proof,
    })
}

/// Resolve the claimed root: explicit hex, a published sequence, or the current root.
///
/// `Ok(None)` means the caller supplied a root that is not a valid digest.
async fn claimed_root(state: &AppState, req: &VerifyRequest) -> Result<Option<Digest>, ApiError> {
    if let Some(root) = req.root.as_deref() {
        return Ok(Digest::from_hex(root).ok());
    }

    let record = match req.sequence {
        Some(sequence) => db::get_root_record(&state.db, sequence)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("no root record with sequence {sequence}")))?,
        None => db::current_root_record(&state.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("no root has been published".to_string()))?,
    };
    Ok(Some(record.root))
}

/// `Ok(None)` means the leaf digest or the record text is malformed.
fn claimed_leaf(leaf: Option<&str>, record: Option<&str>, encoding: RecordEncoding) -> Result<Option<Digest>, ApiError> {
    match (leaf, record) {
        (Some(leaf), None) => Ok(Digest::from_hex(leaf).ok()),
        (None, Some(record)) => Ok(encoding.decode(record).ok().map(|bytes| hash_record(&bytes))),
        _ => Err(ApiError::BadRequest("exactly one of leaf or record is required".to_string())),
    }
}

pub async fn verify_membership(
    state: &AppState,
    caller: &Caller,
    req: VerifyRequest,
) -> Result<VerifyResponse, ApiError> {
    let leaf = claimed_leaf(req.leaf.as_deref(), req.record.as_deref(), req.encoding)?;
    let root = claimed_root(state, &req).await?;

    // Malformed input on this path is reported as "not verified", never as an error.
    let ok = match (MerkleProof::from_hex(&req.proof), root, leaf) {
        (Ok(proof), Some(root), Some(leaf)) => verify(&proof, &root, &leaf),
        _ => false,
    };

    let published_sequence = match root {
        Some(root) => db::find_root_sequence(&state.db, &root).await?,
        None => None,
    };

    db::insert_event(
        &state.db,
        EventKind::MembershipVerified,
        &caller.label,
        json!({ "root": root, "leaf": leaf, "ok": ok, "published_sequence": published_sequence }),
    )
    .await?;

    info!(ok, root = ?root, ?published_sequence, verifier = %caller.label, "membership checked");

    Ok(VerifyResponse {
        ok,
        root,
        published_sequence,
    })
}
