//! Data models for change-management impact analysis.
//!
//! Targets describe what a proposed change touches; records are the flat
//! rows the repository hands back while the impact graph is walked.

pub mod records;
pub mod target;

pub use records::{
    ChassisSlot, ClusterMembers, ClusterRecord, ConsolePort, DnsRecord, HolderOwner, HostRecord,
    ResourceHolderInfo, SlotKind,
};
pub use target::{
    BranchRef, ClusterKind, EntityRef, FeatureKind, FeatureRef, HardwareKind, HardwareRef,
    HostEnvironment, LocationKind, LocationRef, ResourceHolderKind, ResourceHolderRef, Target,
    TargetKind, UnknownTargetKind,
};
