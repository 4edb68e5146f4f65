//! # cmdb-policy
//!
//! Change-management checks for the CMDB broker.
//!
//! Before a broker command modifies the inventory, it opens an analysis,
//! feeds it every object it is about to touch and asks an external oracle
//! whether the change may proceed:
//!
//! - The classifier and walker resolve each object to the concrete hosts and
//!   clusters behind it and accumulate their environments and statuses
//! - The decision client submits the result to the oracle
//! - The arbiter maps the verdict to approve, approve-with-warning or deny
//! - Every verdict is written to the change-management audit trail

pub mod classifier;
pub mod config;
pub mod decision;
pub mod error;
pub mod impact;
pub mod manager;
pub mod outcome;
mod walker;

pub use classifier::{PreparedQuery, TargetQuery, TargetSet};
pub use config::{load_change_management_config, ChangeManagementConfig, ConfigError};
pub use decision::{
    DecisionOracle, DecisionRequest, DecisionResponse, MockOracle, SubprocessOracle,
};
pub use error::ChangeError;
pub use impact::{FinalizedImpact, ImpactedEnvironments};
pub use manager::{AnalysisContext, ChangeManagement, ChangeRequest, Requestor, PLACEHOLDER_EON_ID};
pub use outcome::{arbitrate, Outcome};
pub use walker::MAX_ID_BATCH;
