//! Error types for change-management checks.

use cmdb_core::{StoreError, UnknownTargetKind};
use thiserror::Error;

/// Errors that abort a change-management check.
///
/// Every variant except `AuthorizationDenied` indicates the check itself
/// could not be completed. None of them are retried.
#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("Change management calculate impact fail: {0}")]
    UnknownTargetKind(#[from] UnknownTargetKind),

    #[error("DNS alias chain loops back to {name}")]
    CyclicAliasChain { name: String },

    #[error("Invalid response received for the change management check: {0}")]
    MalformedDecisionResponse(String),

    #[error("Change management oracle failed: {0}")]
    OracleInvocation(String),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("CMDB lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode decision request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChangeError {
    /// Whether the oracle answered and refused the change.
    pub fn is_denial(&self) -> bool {
        matches!(self, ChangeError::AuthorizationDenied(_))
    }
}
