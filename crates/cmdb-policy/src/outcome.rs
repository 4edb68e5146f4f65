//! Outcome arbiter: turns an oracle verdict into the broker's decision.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decision::DecisionResponse;
use crate::error::ChangeError;

/// Result of a successful change-management check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "warning", rename_all = "snake_case")]
pub enum Outcome {
    /// The oracle approved the change.
    Approved,
    /// The change may proceed; the warning must be shown to the requestor.
    ApprovedWithWarning(String),
    /// Change management is disabled; nothing was checked.
    Skipped,
}

impl Outcome {
    /// Warning to surface to the requestor, if any.
    pub fn warning(&self) -> Option<&str> {
        match self {
            Outcome::ApprovedWithWarning(reason) => Some(reason),
            Outcome::Approved | Outcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

/// Maps a verdict: `Approved` succeeds, `Permitted` succeeds with a warning,
/// anything else is a denial carrying the oracle's reason.
pub fn arbitrate(response: &DecisionResponse) -> Result<Outcome, ChangeError> {
    let reason = response.reason.clone().unwrap_or_default();

    if response.is_approved() {
        Ok(Outcome::Approved)
    } else if response.is_permitted() {
        warn!(reason = %reason, "Change management approval warning");
        Ok(Outcome::ApprovedWithWarning(reason))
    } else {
        Err(ChangeError::AuthorizationDenied(reason))
    }
}
