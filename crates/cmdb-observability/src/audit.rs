//! Change-management audit trail.
//!
//! One record is written per oracle decision. Records go out as a single
//! JSON line on the `change_management` tracing target and are retained in
//! a bounded in-memory log for inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tracing target audit records are emitted on.
pub const CHANGE_AUDIT_TARGET: &str = "change_management";

/// Timestamp layout used in audit records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S +0000";

const PRODUCTION_ENVIRONMENT: &str = "prod";
const READY_STATUS: &str = "ready";

/// Oracle settings recovered from its extra command-line arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleFlags {
    /// Oracle backend instance (`--edm-instance`, default `prod`).
    pub instance: String,
    /// Oracle mode (`--mode`, default `enforce`).
    pub mode: String,
    /// Whether the oracle was told to skip its ticket backend (`--disable_edm`).
    pub oracle_disabled: bool,
}

impl OracleFlags {
    /// Parses the flags out of the oracle's extra arguments.
    pub fn from_args(args: &[String]) -> Self {
        let value_after = |flag: &str| {
            args.iter()
                .position(|arg| arg == flag)
                .and_then(|idx| args.get(idx + 1))
                .cloned()
        };

        Self {
            instance: value_after("--edm-instance").unwrap_or_else(|| "prod".to_string()),
            mode: value_after("--mode").unwrap_or_else(|| "enforce".to_string()),
            oracle_disabled: args.iter().any(|arg| arg == "--disable_edm"),
        }
    }
}

impl Default for OracleFlags {
    fn default() -> Self {
        Self::from_args(&[])
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// A single change-management audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeAuditRecord {
    /// Broker request the decision belongs to.
    pub request_id: String,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
    /// Oracle flags in effect.
    pub flags: OracleFlags,
    /// Whether production `ready` entities were impacted.
    pub prod_ready_env_impact: bool,
    /// Decision request fields followed by the verdict fields.
    pub payload: Map<String, Value>,
}

impl ChangeAuditRecord {
    /// Builds a record from a decision request and the oracle's verdict.
    pub fn new<Q, R>(
        request_id: &str,
        flags: OracleFlags,
        request: &Q,
        response: &R,
    ) -> Result<Self, serde_json::Error>
    where
        Q: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let mut payload = Map::new();
        for value in [serde_json::to_value(request)?, serde_json::to_value(response)?] {
            if let Value::Object(fields) = value {
                payload.extend(fields);
            }
        }

        let prod_ready_env_impact = payload
            .get("impacted_envs")
            .and_then(|envs| envs.get(PRODUCTION_ENVIRONMENT))
            .and_then(Value::as_array)
            .is_some_and(|statuses| statuses.iter().any(|s| s == READY_STATUS));

        Ok(Self {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            flags,
            prod_ready_env_impact,
            payload,
        })
    }

    /// Formats the timestamp the way the audit trail expects.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Flattens the record into the JSON document written to the trail.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("edm_instance".into(), self.flags.instance.clone().into());
        doc.insert("mode".into(), self.flags.mode.clone().into());
        doc.insert(
            "disable_edm".into(),
            yes_no(self.flags.oracle_disabled).into(),
        );
        doc.insert("request_id".into(), self.request_id.clone().into());
        doc.insert("timestamp".into(), self.formatted_timestamp().into());
        doc.extend(self.payload.clone());
        doc.insert(
            "prod_ready_env_impact".into(),
            yes_no(self.prod_ready_env_impact).into(),
        );
        Value::Object(doc)
    }
}

/// Audit log of change-management decisions.
pub struct ChangeAuditLog {
    /// In-memory records.
    entries: Arc<RwLock<VecDeque<ChangeAuditRecord>>>,
    /// Maximum records to keep in memory.
    max_entries: usize,
    /// Whether to also write records to tracing.
    log_to_tracing: bool,
}

impl ChangeAuditLog {
    /// Creates a new audit log.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            log_to_tracing: true,
        }
    }

    /// Creates an audit log without tracing output.
    pub fn without_tracing(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            log_to_tracing: false,
        }
    }

    /// Appends a record.
    pub async fn log(&self, record: ChangeAuditRecord) {
        if self.log_to_tracing {
            info!(target: CHANGE_AUDIT_TARGET, "{}", record.to_json());
        }

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Records one oracle decision.
    ///
    /// Failures to build the record are reported and swallowed; the audit
    /// trail never blocks a change.
    pub async fn record_decision<Q, R>(
        &self,
        request_id: &str,
        oracle_args: &[String],
        request: &Q,
        response: &R,
    ) where
        Q: Serialize + Sync + ?Sized,
        R: Serialize + Sync + ?Sized,
    {
        let flags = OracleFlags::from_args(oracle_args);
        match ChangeAuditRecord::new(request_id, flags, request, response) {
            Ok(record) => self.log(record).await,
            Err(e) => warn!(
                request_id = %request_id,
                error = %e,
                "Failed to build change management audit record"
            ),
        }
    }

    /// Gets all records.
    pub async fn entries(&self) -> Vec<ChangeAuditRecord> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }

    /// Gets records for one broker request.
    pub async fn entries_for_request(&self, request_id: &str) -> Vec<ChangeAuditRecord> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Exports records as a JSON array of trail documents.
    pub async fn export_json(&self) -> String {
        let docs: Vec<Value> = self
            .entries
            .read()
            .await
            .iter()
            .map(ChangeAuditRecord::to_json)
            .collect();
        serde_json::to_string_pretty(&docs).unwrap_or_else(|_| "[]".to_string())
    }

    /// Gets the number of records.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Checks if the audit log is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for ChangeAuditLog {
    fn default() -> Self {
        Self::new(10000)
    }
}
