//! Integration tests for the change-management workflow.
//!
//! These tests verify:
//! - Verdict mapping (approved, permitted, anything else)
//! - Disabled mode never reaches the oracle or the audit trail
//! - Audit records carry request, verdict and oracle flags
//! - The subprocess oracle protocol end to end

use std::io::Write;
use std::sync::Arc;

use cmdb_core::{ClusterKind, ClusterRecord, HostEnvironment, HostRecord, InMemoryCmdb, Target};
use cmdb_observability::ChangeAuditLog;
use cmdb_policy::{
    load_change_management_config, ChangeError, ChangeManagement, ChangeManagementConfig,
    ChangeRequest, DecisionOracle, DecisionResponse, MockOracle, Outcome, Requestor,
    PLACEHOLDER_EON_ID,
};
use tempfile::NamedTempFile;

fn scenario_store() -> (InMemoryCmdb, ClusterRecord) {
    let cluster = ClusterRecord::new("grid1", ClusterKind::Compute, "prod", "ready");
    let h1 = HostRecord::new("h1.example.com", "prod", "ready");
    let h2 = HostRecord::new("h2.example.com", "dev", "build");
    let store = InMemoryCmdb::builder()
        .cluster(cluster.clone())
        .host(h1.clone())
        .host(h2.clone())
        .cluster_host(cluster.id, h1.id)
        .cluster_host(cluster.id, h2.id)
        .build();
    (store, cluster)
}

fn change_request() -> ChangeRequest {
    ChangeRequest::new(Requestor::new("jdoe@EXAMPLE.COM", "operations"), "update_cluster")
        .with_justification("CHG0012345")
        .with_reason("rolling reboot")
        .with_request_id("5b7c1b9e")
}

fn manager(
    config: &ChangeManagementConfig,
    oracle: Arc<dyn DecisionOracle>,
) -> (ChangeManagement, ClusterRecord) {
    let (store, cluster) = scenario_store();
    let manager = ChangeManagement::new(
        config,
        Arc::new(store),
        oracle,
        Arc::new(ChangeAuditLog::without_tracing(100)),
    );
    (manager, cluster)
}

async fn run_check(manager: &ChangeManagement, cluster: ClusterRecord) -> Result<Outcome, ChangeError> {
    let mut ctx = manager.begin(change_request());
    ctx.consider(Target::Cluster(cluster)).await?;
    ctx.validate().await
}

// =============================================================================
// Verdict mapping
// =============================================================================

#[tokio::test]
async fn test_approved_change() {
    let oracle = Arc::new(MockOracle::approving());
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle.clone());

    let outcome = run_check(&manager, cluster).await.unwrap();
    assert_eq!(outcome, Outcome::Approved);

    let submitted = oracle.submissions().await;
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.ticket.as_deref(), Some("CHG0012345"));
    assert_eq!(request.command, "update_cluster");
    assert_eq!(request.eonid, PLACEHOLDER_EON_ID);
    assert!(request.enforce_validation);
    assert_eq!(
        serde_json::to_value(&request.impacted_envs).unwrap(),
        serde_json::json!({"prod": ["ready"], "dev": ["build"]})
    );
}

#[tokio::test]
async fn test_permitted_change_carries_warning() {
    let oracle = Arc::new(MockOracle::permitting("Change window closes in 30 minutes"));
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle);

    let outcome = run_check(&manager, cluster).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::ApprovedWithWarning("Change window closes in 30 minutes".to_string())
    );
}

#[tokio::test]
async fn test_rejected_change_fails_with_reason() {
    let oracle = Arc::new(MockOracle::denying("Ticket CHG0012345 is not in implementation"));
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle);

    let err = run_check(&manager, cluster).await.unwrap_err();
    assert!(err.is_denial());
    assert_eq!(err.to_string(), "Ticket CHG0012345 is not in implementation");

    // Denials are audited too.
    assert_eq!(manager.audit_log().len().await, 1);
}

#[tokio::test]
async fn test_unexpected_status_is_a_denial() {
    let oracle = Arc::new(MockOracle::new(DecisionResponse::new("Pending", "awaiting CAB")));
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle);

    match run_check(&manager, cluster).await.unwrap_err() {
        ChangeError::AuthorizationDenied(reason) => assert_eq!(reason, "awaiting CAB"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_malformed_verdict_aborts_without_audit() {
    let oracle = Arc::new(MockOracle::raw("Status: Approved"));
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle);

    let err = run_check(&manager, cluster).await.unwrap_err();
    assert!(matches!(err, ChangeError::MalformedDecisionResponse(_)));
    assert!(manager.audit_log().is_empty().await);
}

// =============================================================================
// Disabled mode
// =============================================================================

#[tokio::test]
async fn test_disabled_mode_is_a_noop() {
    let oracle = Arc::new(MockOracle::denying("must not be consulted"));
    let (manager, _) = manager(&ChangeManagementConfig::default(), oracle.clone());

    let mut ctx = manager.begin(change_request());
    ctx.consider(Target::HostEnvironment(HostEnvironment::Qa))
        .await
        .unwrap();
    let outcome = ctx.validate().await.unwrap();

    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(oracle.submission_count().await, 0);
    assert!(manager.audit_log().is_empty().await);
}

// =============================================================================
// Audit trail
// =============================================================================

#[tokio::test]
async fn test_audit_record_contents() {
    let oracle = Arc::new(
        MockOracle::new(DecisionResponse::new("Approved", "ok").with_field("TicketState", "implement"))
            .with_args(["--edm-instance", "uat", "--mode", "permissive"]),
    );
    let (manager, cluster) = manager(&ChangeManagementConfig::enabled(""), oracle);

    run_check(&manager, cluster).await.unwrap();

    let records = manager.audit_log().entries_for_request("5b7c1b9e").await;
    assert_eq!(records.len(), 1);
    let doc = records[0].to_json();
    assert_eq!(doc["edm_instance"], "uat");
    assert_eq!(doc["mode"], "permissive");
    assert_eq!(doc["disable_edm"], "No");
    assert_eq!(doc["request_id"], "5b7c1b9e");
    assert_eq!(doc["ticket"], "CHG0012345");
    assert_eq!(doc["requestor"], "jdoe@EXAMPLE.COM");
    assert_eq!(doc["Status"], "Approved");
    assert_eq!(doc["TicketState"], "implement");
    assert_eq!(doc["prod_ready_env_impact"], "Yes");
}

// =============================================================================
// Configuration and subprocess oracle
// =============================================================================

#[tokio::test]
async fn test_service_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "change_management:\n  enable: true\n  executable: /nonexistent/change-oracle\n  extra_options: \"--disable_edm\""
    )
    .unwrap();
    let config = load_change_management_config(file.path()).unwrap();

    let (store, cluster) = scenario_store();
    let audit = Arc::new(ChangeAuditLog::without_tracing(10));
    let manager =
        ChangeManagement::with_subprocess_oracle(&config, Arc::new(store), audit.clone()).unwrap();
    assert!(manager.is_enabled());

    let err = run_check(&manager, cluster).await.unwrap_err();
    assert!(matches!(err, ChangeError::OracleInvocation(_)));
    assert!(audit.is_empty().await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_subprocess_oracle_protocol() {
    // The script sees its arguments as $1.. and must find --metadata last.
    let config = ChangeManagementConfig {
        enable: true,
        executable: "sh".to_string(),
        extra_options: concat!(
            r#"-c 'test "$1" = --disable_edm && test "$2" = --metadata && "#,
            r#"case "$3" in *update_cluster*) printf "{\"Status\":\"Permitted\",\"Reason\":\"late\"}";; "#,
            r#"*) printf "{\"Status\":\"Rejected\"}";; esac' oracle --disable_edm"#
        )
        .to_string(),
    };

    let (store, cluster) = scenario_store();
    let manager = ChangeManagement::with_subprocess_oracle(
        &config,
        Arc::new(store),
        Arc::new(ChangeAuditLog::without_tracing(10)),
    )
    .unwrap();

    let outcome = run_check(&manager, cluster).await.unwrap();
    assert_eq!(outcome.warning(), Some("late"));

    let records = manager.audit_log().entries().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].flags.oracle_disabled);
}
