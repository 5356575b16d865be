//! Role-gated capability checks, evaluated before a handler touches the ledger or the
//! Merkle engine.

use crate::errors::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Insurer,
    Verifier,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Insurer => "insurer",
            Role::Verifier => "verifier",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "insurer" => Some(Role::Insurer),
            "verifier" => Some(Role::Verifier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    PublishRoot,
    IssueProof,
    VerifyMembership,
    ManageMembers,
    ReadEvents,
}

/// Authenticated identity attached to a request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
    pub label: String,
}

pub fn allows(role: Role, capability: Capability) -> bool {
    match capability {
        Capability::PublishRoot | Capability::IssueProof => role == Role::Insurer,
        Capability::VerifyMembership => role == Role::Verifier,
        Capability::ManageMembers | Capability::ReadEvents => role == Role::Admin,
    }
}

pub fn require(caller: &Caller, capability: Capability) -> Result<(), ApiError> {
    if allows(caller.role, capability) {
        return Ok(());
    }

    tracing::warn!(role = caller.role.as_str(), label = %caller.label, ?capability, "capability denied");
    Err(ApiError::Forbidden(format!(
        "role '{}' may not perform {capability:?}",
        caller.role.as_str()
    )))
}
