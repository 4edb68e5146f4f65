//! Change-management service.
//!
//! A `ChangeManagement` is built once from configuration and shared. Each
//! broker command opens an `AnalysisContext`, feeds it the objects it is
//! about to modify and finally calls `validate`, which asks the oracle and
//! writes the audit record.

use cmdb_core::CmdbReader;
use cmdb_observability::ChangeAuditLog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::classifier::{classify, TargetSet};
use crate::config::{ChangeManagementConfig, ConfigError};
use crate::decision::{DecisionOracle, DecisionRequest, SubprocessOracle};
use crate::error::ChangeError;
use crate::impact::ImpactedEnvironments;
use crate::outcome::{arbitrate, Outcome};
use crate::walker::{Traversal, Walker};

/// Classification id sent with every decision request.
pub const PLACEHOLDER_EON_ID: u32 = 6980;

/// Principal running a broker command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requestor {
    /// Principal name.
    pub name: String,
    /// Role of the principal.
    pub role: String,
}

impl Requestor {
    /// Creates a requestor.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Who is changing what, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Principal running the command.
    pub requestor: Requestor,
    /// Broker command name.
    pub command: String,
    /// Change ticket given as justification.
    pub justification: Option<String>,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Broker request id, used to correlate audit records.
    pub request_id: Option<String>,
}

impl ChangeRequest {
    /// Creates a new change request.
    pub fn new(requestor: Requestor, command: impl Into<String>) -> Self {
        Self {
            requestor,
            command: command.into(),
            justification: None,
            reason: None,
            request_id: None,
        }
    }

    /// Sets the change ticket.
    pub fn with_justification(mut self, ticket: impl Into<String>) -> Self {
        self.justification = Some(ticket.into());
        self
    }

    /// Sets the free-text reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the broker request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Shared change-management service.
pub struct ChangeManagement {
    enabled: bool,
    store: Arc<dyn CmdbReader>,
    oracle: Arc<dyn DecisionOracle>,
    audit: Arc<ChangeAuditLog>,
}

impl ChangeManagement {
    /// Creates the service around an explicit oracle.
    ///
    /// Only `enable` is read from `config`; the audit flags come from the
    /// oracle's own arguments.
    pub fn new(
        config: &ChangeManagementConfig,
        store: Arc<dyn CmdbReader>,
        oracle: Arc<dyn DecisionOracle>,
        audit: Arc<ChangeAuditLog>,
    ) -> Self {
        Self {
            enabled: config.enable,
            store,
            oracle,
            audit,
        }
    }

    /// Creates the service with the configured oracle executable.
    pub fn with_subprocess_oracle(
        config: &ChangeManagementConfig,
        store: Arc<dyn CmdbReader>,
        audit: Arc<ChangeAuditLog>,
    ) -> Result<Self, ConfigError> {
        let oracle = Arc::new(SubprocessOracle::from_config(config)?);
        Ok(Self::new(config, store, oracle, audit))
    }

    /// Whether commands are checked at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Audit trail shared with the service.
    pub fn audit_log(&self) -> &Arc<ChangeAuditLog> {
        &self.audit
    }

    /// Opens the analysis for one broker command.
    pub fn begin(&self, request: ChangeRequest) -> AnalysisContext<'_> {
        AnalysisContext {
            manager: self,
            request,
            traversal: Traversal::default(),
        }
    }
}

/// Per-command impact analysis. Consumed by `validate`.
pub struct AnalysisContext<'a> {
    manager: &'a ChangeManagement,
    request: ChangeRequest,
    traversal: Traversal,
}

impl AnalysisContext<'_> {
    /// The change being analyzed.
    pub fn request(&self) -> &ChangeRequest {
        &self.request
    }

    /// Requires strict validation regardless of what is impacted.
    pub fn enforce_validation(&mut self) {
        self.traversal.enforce();
    }

    /// Whether strict validation will be requested.
    pub fn is_enforced(&self) -> bool {
        self.traversal.enforce
    }

    /// Environments and statuses collected so far.
    pub fn impact(&self) -> &ImpactedEnvironments {
        &self.traversal.impact
    }

    /// Adds the hosts and clusters reached from `targets` to the impact.
    ///
    /// Does nothing while change management is disabled.
    #[instrument(skip(self, targets), fields(command = %self.request.command))]
    pub async fn consider(&mut self, targets: impl Into<TargetSet>) -> Result<(), ChangeError> {
        if !self.manager.enabled {
            return Ok(());
        }

        let mut walker = Walker::new(self.manager.store.as_ref(), &mut self.traversal);
        classify(&mut walker, targets.into()).await
    }

    /// Like `consider`, but also requires strict validation.
    pub async fn consider_enforced(
        &mut self,
        targets: impl Into<TargetSet>,
    ) -> Result<(), ChangeError> {
        self.enforce_validation();
        self.consider(targets).await
    }

    /// Builds the request the oracle would receive right now.
    pub fn decision_request(&self) -> DecisionRequest {
        DecisionRequest {
            ticket: self.request.justification.clone(),
            reason: self.request.reason.clone(),
            requestor: self.request.requestor.name.clone(),
            requestor_role: self.request.requestor.role.clone(),
            command: self.request.command.clone(),
            impacted_envs: self.traversal.impact.finalize(),
            eonid: PLACEHOLDER_EON_ID,
            enforce_validation: self.traversal.enforce,
        }
    }

    /// Asks the oracle whether the change may proceed.
    ///
    /// Every parsed verdict is written to the audit log before it is acted on.
    #[instrument(skip(self), fields(command = %self.request.command))]
    pub async fn validate(self) -> Result<Outcome, ChangeError> {
        if !self.manager.enabled {
            debug!("Change management is disabled, skipping validation");
            return Ok(Outcome::Skipped);
        }

        let request = self.decision_request();
        debug!(
            oracle = self.manager.oracle.name(),
            enforce = request.enforce_validation,
            environments = request.impacted_envs.len(),
            "Submitting change for validation"
        );

        let response = self.manager.oracle.submit(&request).await?;

        let request_id = self.request.request_id.clone().unwrap_or_default();
        self.manager
            .audit
            .record_decision(&request_id, self.manager.oracle.args(), &request, &response)
            .await;

        info!(
            status = ?response.status,
            reason = ?response.reason,
            "Change management validation finished"
        );

        arbitrate(&response)
    }
}
