//! Publishing path: hash a batch, build its root, append it to the root-record chain.

use crate::db;
use crate::errors::{internal, ApiError};
use crate::models::{BatchCreateResponse, ChainAuditResponse, RootRecord};
use crate::policy::Caller;
use crate::state::AppState;
use merkle_commit::{build_root, hash_record, Digest};
use tracing::info;

/// Hash every record and compute the batch root on a blocking thread.
async fn commit_records(records: Vec<Vec<u8>>) -> Result<(Vec<Digest>, Digest), ApiError> {
    tokio::task::spawn_blocking(move || {
        let leaves: Vec<Digest> = records.iter().map(|r| hash_record(r)).collect();
        let root = build_root(&leaves)?;
        Ok::<(Vec<Digest>, Digest), ApiError>((leaves, root))
    })
    .await
    .map_err(internal)?
}

pub async fn publish_batch(
    state: &AppState,
    caller: &Caller,
    records: Vec<Vec<u8>>,
) -> Result<BatchCreateResponse, ApiError> {
    let max = state.config.max_batch_size;
    if records.len() > max {
        return Err(ApiError::BadRequest(format!(
            "batch of {} records exceeds the limit of {max}",
            records.len()
        )));
    }

    let (leaves, root) = commit_records(records).await?;

    // The RootPublished event is written in the same transaction, so events follow sequence order.
    let record = {
        let _guard = state.publish_lock().lock().await;
        db::append_root_record(&state.db, root, &leaves, &caller.label).await?
    };

    info!(sequence = record.sequence, root = %record.root, leaf_count = record.leaf_count, issuer = %record.issuer, "root published");

    Ok(BatchCreateResponse { record, leaves })
}

/// Check that every record links to its predecessor and sequences are contiguous from 1.
pub fn audit_chain(records: &[RootRecord]) -> ChainAuditResponse {
    let mut prev: Option<&RootRecord> = None;

    for record in records {
        let linked = match prev {
            None => record.sequence == 1 && record.prev_root.is_none(),
            Some(p) => record.sequence == p.sequence + 1 && record.prev_root == Some(p.root),
        };
        if !linked {
            return ChainAuditResponse {
                length: records.len() as u64,
                valid: false,
                first_broken_sequence: Some(record.sequence),
            };
        }
        prev = Some(record);
    }

    ChainAuditResponse {
        length: records.len() as u64,
        valid: true,
        first_broken_sequence: None,
    }
}
