//! # cmdb-core
//!
//! Entity model and read-only repository interface for the CMDB broker.
//!
//! This crate provides the targets a proposed change can point at, the flat
//! host/cluster rows the impact analyzer consumes, and the `CmdbReader`
//! trait through which all graph lookups are made.

pub mod models;
pub mod store;

pub use models::{
    BranchRef, ChassisSlot, ClusterKind, ClusterMembers, ClusterRecord, ConsolePort, DnsRecord,
    EntityRef, FeatureKind, FeatureRef, HardwareKind, HardwareRef, HolderOwner, HostEnvironment,
    HostRecord, LocationKind, LocationRef, ResourceHolderInfo, ResourceHolderKind,
    ResourceHolderRef, SlotKind, Target, TargetKind, UnknownTargetKind,
};
pub use store::{
    AddressBinding, AddressScope, CmdbReader, Consumer, InMemoryCmdb, InMemoryCmdbBuilder,
    MemberRef, QueryStats, StoreError, StoreResult,
};
