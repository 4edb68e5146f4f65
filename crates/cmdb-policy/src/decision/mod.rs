//! Decision client: the port to the external change-approval oracle.

mod mock;
mod subprocess;

pub use mock::MockOracle;
pub use subprocess::SubprocessOracle;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChangeError;
use crate::impact::FinalizedImpact;

/// Status string of an approved change.
pub const STATUS_APPROVED: &str = "Approved";
/// Status string of a change allowed with a warning.
pub const STATUS_PERMITTED: &str = "Permitted";

/// Metadata sent to the oracle for one proposed change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRequest {
    /// Change ticket the requestor supplied as justification.
    pub ticket: Option<String>,
    /// Free-text reason for the change.
    pub reason: Option<String>,
    /// Principal performing the change.
    pub requestor: String,
    /// Role of the requestor.
    pub requestor_role: String,
    /// Broker command being run.
    pub command: String,
    /// Environment to lifecycle statuses reached by the change.
    pub impacted_envs: FinalizedImpact,
    /// Classification id of the changed system.
    pub eonid: u32,
    /// Whether the oracle must validate strictly.
    pub enforce_validation: bool,
}

impl DecisionRequest {
    /// Encodes the request as the oracle's `--metadata` argument.
    pub fn to_metadata(&self) -> Result<String, ChangeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Verdict returned by the oracle.
///
/// Fields other than `Status` and `Reason` are kept so they reach the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecisionResponse {
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Reason", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DecisionResponse {
    /// Creates a response with the given status and reason.
    pub fn new(status: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            reason: Some(reason.into()),
            extra: Map::new(),
        }
    }

    /// An `Approved` verdict without a reason.
    pub fn approved() -> Self {
        Self {
            status: Some(STATUS_APPROVED.to_string()),
            ..Self::default()
        }
    }

    /// A `Permitted` verdict; `reason` becomes the warning.
    pub fn permitted(reason: impl Into<String>) -> Self {
        Self::new(STATUS_PERMITTED, reason)
    }

    /// Adds an extra field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether the status is exactly `Approved`.
    pub fn is_approved(&self) -> bool {
        self.status.as_deref() == Some(STATUS_APPROVED)
    }

    /// Whether the status is exactly `Permitted`.
    pub fn is_permitted(&self) -> bool {
        self.status.as_deref() == Some(STATUS_PERMITTED)
    }
}

/// Parses the oracle's raw output.
pub fn parse_response(raw: &[u8]) -> Result<DecisionResponse, ChangeError> {
    serde_json::from_slice(raw)
        .map_err(|e| ChangeError::MalformedDecisionResponse(e.to_string()))
}

/// Port to the external change-approval oracle.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Name of the oracle for logs.
    fn name(&self) -> &str;

    /// Extra arguments the oracle runs with.
    ///
    /// The audit trail reads the instance, mode and disable flags from these.
    fn args(&self) -> &[String] {
        &[]
    }

    /// Submits a request and waits for the verdict. Never retried.
    async fn submit(&self, request: &DecisionRequest) -> Result<DecisionResponse, ChangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::ImpactedEnvironments;

    fn sample_request() -> DecisionRequest {
        let mut impact = ImpactedEnvironments::new();
        impact.record("prod", "ready");
        DecisionRequest {
            ticket: Some("CHG123456".to_string()),
            reason: None,
            requestor: "jdoe@EXAMPLE.COM".to_string(),
            requestor_role: "operations".to_string(),
            command: "update_host".to_string(),
            impacted_envs: impact.finalize(),
            eonid: 6980,
            enforce_validation: true,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let value: Value = serde_json::from_str(&sample_request().to_metadata().unwrap()).unwrap();
        assert_eq!(value["ticket"], "CHG123456");
        assert!(value["reason"].is_null());
        assert_eq!(value["requestor_role"], "operations");
        assert_eq!(value["impacted_envs"]["prod"][0], "ready");
        assert_eq!(value["eonid"], 6980);
        assert_eq!(value["enforce_validation"], true);
    }

    #[test]
    fn test_parse_response_keeps_extra_fields() {
        let response =
            parse_response(br#"{"Status": "Approved", "Reason": "ok", "TicketState": "open"}"#)
                .unwrap();
        assert!(response.is_approved());
        assert_eq!(response.reason.as_deref(), Some("ok"));
        assert_eq!(response.extra["TicketState"], "open");

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["TicketState"], "open");
        assert_eq!(value["Status"], "Approved");
    }

    #[test]
    fn test_parse_response_without_status() {
        let response = parse_response(b"{}").unwrap();
        assert!(response.status.is_none());
        assert!(!response.is_approved());
        assert!(!response.is_permitted());
    }

    #[test]
    fn test_parse_malformed_response() {
        let err = parse_response(b"Traceback (most recent call last)").unwrap_err();
        assert!(matches!(err, ChangeError::MalformedDecisionResponse(_)));

        let err = parse_response(b"[1, 2]").unwrap_err();
        assert!(matches!(err, ChangeError::MalformedDecisionResponse(_)));
    }
}
