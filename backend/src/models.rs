use crate::errors::ApiError;
use crate::policy::Role;
use base64::Engine;
use chrono::{DateTime, Utc};
use merkle_commit::{Digest, MerkleProof};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How record strings in a request are turned into the bytes that get hashed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordEncoding {
    #[default]
    Utf8,
    Hex,
    Base64,
}

impl RecordEncoding {
    pub fn decode(self, record: &str) -> Result<Vec<u8>, ApiError> {
        match self {
            RecordEncoding::Utf8 => Ok(record.as_bytes().to_vec()),
            RecordEncoding::Hex => hex::decode(record.strip_prefix("0x").unwrap_or(record))
                .map_err(|_| ApiError::BadRequest("record is not valid hex".to_string())),
            RecordEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(record)
                .map_err(|_| ApiError::BadRequest("record is not valid base64".to_string())),
        }
    }
}

/// One link of the append-only commitment chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRecord {
    pub sequence: u64,
    pub batch_id: Uuid,
    pub root: Digest,
    /// Root of record `sequence - 1`; `None` only for the first record.
    pub prev_root: Option<Digest>,
    pub leaf_count: u64,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchCreateRequest {
    /// Already-encoded records, one leaf each, in commitment order.
    pub records: Vec<String>,

    #[serde(default)]
    pub encoding: RecordEncoding,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchCreateResponse {
    pub record: RootRecord,
    pub leaves: Vec<Digest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootListResponse {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub records: Vec<RootRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainAuditResponse {
    pub length: u64,
    pub valid: bool,

    /// First sequence whose link to its predecessor does not hold.
    pub first_broken_sequence: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProofRequest {
    pub sequence: u64,

    /// Exactly one of `index`, `leaf` (hex digest) or `record` selects the target.
    pub index: Option<usize>,
    pub leaf: Option<String>,
    pub record: Option<String>,

    #[serde(default)]
    pub encoding: RecordEncoding,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProofResponse {
    pub sequence: u64,
    pub root: Digest,
    pub leaf: Digest,
    pub leaf_index: usize,
    pub proof: MerkleProof,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Claimed root. When absent, `sequence` or else the current root is used.
    pub root: Option<String>,
    pub sequence: Option<u64>,

    /// Either the leaf digest or the record it was hashed from.
    pub leaf: Option<String>,
    pub record: Option<String>,

    #[serde(default)]
    pub encoding: RecordEncoding,

    pub proof: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,

    /// The root the proof was checked against, when it could be parsed.
    pub root: Option<Digest>,

    /// Sequence of the root record carrying `root`, if it was ever published here.
    pub published_sequence: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberCreateRequest {
    pub role: Role,
    pub label: Option<String>,

    /// Generated when omitted.
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub api_key: String,
    pub role: Role,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RootPublished,
    ProofIssued,
    MembershipVerified,
    MemberAdded,
    MemberRevoked,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RootPublished => "root_published",
            EventKind::ProofIssued => "proof_issued",
            EventKind::MembershipVerified => "membership_verified",
            EventKind::MemberAdded => "member_added",
            EventKind::MemberRevoked => "member_revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "root_published" => Some(EventKind::RootPublished),
            "proof_issued" => Some(EventKind::ProofIssued),
            "membership_verified" => Some(EventKind::MembershipVerified),
            "member_added" => Some(EventKind::MemberAdded),
            "member_revoked" => Some(EventKind::MemberRevoked),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventItem {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub kind: EventKind,
    pub actor: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventListResponse {
    pub offset: u64,
    pub limit: u64,
    pub events: Vec<EventItem>,
}
