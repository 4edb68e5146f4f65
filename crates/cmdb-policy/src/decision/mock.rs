//! In-process oracle for tests and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{parse_response, DecisionOracle, DecisionRequest, DecisionResponse, STATUS_APPROVED};
use crate::error::ChangeError;

#[derive(Debug, Clone)]
enum MockReply {
    Verdict(DecisionResponse),
    Raw(String),
}

/// Oracle returning a scripted verdict and remembering every submission.
#[derive(Debug, Clone)]
pub struct MockOracle {
    name: String,
    args: Vec<String>,
    reply: MockReply,
    submissions: Arc<RwLock<Vec<DecisionRequest>>>,
}

impl MockOracle {
    /// Creates a mock answering every request with `response`.
    pub fn new(response: DecisionResponse) -> Self {
        Self {
            name: "mock-oracle".to_string(),
            args: Vec::new(),
            reply: MockReply::Verdict(response),
            submissions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Approves every change.
    pub fn approving() -> Self {
        Self::new(DecisionResponse::new(STATUS_APPROVED, "Change approved"))
    }

    /// Permits every change with `reason` as the warning.
    pub fn permitting(reason: impl Into<String>) -> Self {
        Self::new(DecisionResponse::permitted(reason))
    }

    /// Rejects every change with `reason`.
    pub fn denying(reason: impl Into<String>) -> Self {
        Self::new(DecisionResponse::new("Rejected", reason))
    }

    /// Creates a mock whose raw output is parsed like a real oracle's.
    pub fn raw(output: impl Into<String>) -> Self {
        Self {
            reply: MockReply::Raw(output.into()),
            ..Self::approving()
        }
    }

    /// Reports `args` as the oracle's arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Requests received so far.
    pub async fn submissions(&self) -> Vec<DecisionRequest> {
        self.submissions.read().await.clone()
    }

    /// Number of requests received so far.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::approving()
    }
}

#[async_trait]
impl DecisionOracle for MockOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn args(&self) -> &[String] {
        &self.args
    }

    async fn submit(&self, request: &DecisionRequest) -> Result<DecisionResponse, ChangeError> {
        self.submissions.write().await.push(request.clone());

        match &self.reply {
            MockReply::Verdict(response) => Ok(response.clone()),
            MockReply::Raw(output) => parse_response(output.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::FinalizedImpact;

    fn request(command: &str) -> DecisionRequest {
        DecisionRequest {
            ticket: None,
            reason: None,
            requestor: "jdoe".to_string(),
            requestor_role: "nobody".to_string(),
            command: command.to_string(),
            impacted_envs: FinalizedImpact::default(),
            eonid: 6980,
            enforce_validation: false,
        }
    }

    #[tokio::test]
    async fn test_records_submissions() {
        let oracle = MockOracle::denying("no ticket");
        let response = oracle.submit(&request("del_host")).await.unwrap();
        assert_eq!(response.status.as_deref(), Some("Rejected"));
        assert_eq!(response.reason.as_deref(), Some("no ticket"));

        oracle.submit(&request("add_host")).await.unwrap();
        let seen = oracle.submissions().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].command, "add_host");
    }

    #[tokio::test]
    async fn test_clones_share_submissions() {
        let oracle = MockOracle::approving();
        let handle = oracle.clone();
        oracle.submit(&request("update_host")).await.unwrap();
        assert_eq!(handle.submission_count().await, 1);
    }

    #[test]
    fn test_reports_configured_args() {
        assert!(MockOracle::approving().args().is_empty());
        let oracle = MockOracle::approving().with_args(["--mode", "enforce"]);
        assert_eq!(oracle.args(), ["--mode", "enforce"]);
    }

    #[tokio::test]
    async fn test_raw_output_is_parsed() {
        let oracle = MockOracle::raw("garbage");
        let err = oracle.submit(&request("update_host")).await.unwrap_err();
        assert!(matches!(err, ChangeError::MalformedDecisionResponse(_)));
        assert_eq!(oracle.submission_count().await, 1);
    }
}
