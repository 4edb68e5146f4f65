//! Flat rows returned by the CMDB read API.
//!
//! Hosts and clusters arrive with their environment and lifecycle status
//! already resolved, so the impact walker never has to follow
//! personality or lifecycle joins itself.

use crate::models::target::{ClusterKind, EntityRef, HostEnvironment};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// A host together with the environment and status it runs under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HostRecord {
    /// Unique identifier for this host.
    pub id: Uuid,
    /// Fully qualified host name.
    pub name: String,
    /// Environment of the host's personality (prod, dev, qa, ...).
    pub environment: String,
    /// Lifecycle status (ready, build, ...).
    pub status: String,
}

impl HostRecord {
    /// Creates a host record with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        environment: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            environment: environment.into(),
            status: status.into(),
        }
    }
}

/// A cluster together with the environment and status it runs under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClusterRecord {
    /// Unique identifier for this cluster.
    pub id: Uuid,
    /// Cluster name.
    pub name: String,
    /// Cluster flavour.
    pub kind: ClusterKind,
    /// Environment of the cluster's personality.
    pub environment: String,
    /// Lifecycle status.
    pub status: String,
}

impl ClusterRecord {
    /// Creates a cluster record with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        kind: ClusterKind,
        environment: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            environment: environment.into(),
            status: status.into(),
        }
    }
}

/// Direct members of a cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterMembers {
    /// Hosts that are members of the cluster.
    pub hosts: Vec<HostRecord>,
    /// Clusters nested below this one (metacluster members).
    pub clusters: Vec<ClusterRecord>,
}

/// A DNS record attached to a name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DnsRecord {
    /// Address record.
    Address { ip: IpAddr },
    /// Canonical-name alias pointing at another name.
    Alias { target: EntityRef },
    /// Address alias pointing at another name.
    AddressAlias { target: EntityRef },
    /// Any other record (SRV, reserved name, ...).
    Other { record_type: String },
}

impl DnsRecord {
    /// Returns the name this record forwards to, if it is an alias of any kind.
    pub fn alias_target(&self) -> Option<&EntityRef> {
        match self {
            DnsRecord::Alias { target } | DnsRecord::AddressAlias { target } => Some(target),
            DnsRecord::Address { .. } | DnsRecord::Other { .. } => None,
        }
    }
}

/// Type of a chassis slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Machine,
    NetworkDevice,
}

/// A slot in a chassis and the hardware occupying it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChassisSlot {
    /// Slot type.
    pub kind: SlotKind,
    /// Slot number.
    pub number: u32,
    /// Hardware entity in the slot, if any.
    pub occupant: Option<Uuid>,
}

/// A console server port and the hardware wired to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsolePort {
    /// Port label.
    pub port: String,
    /// Hardware entity connected to the port, if any.
    pub client: Option<Uuid>,
}

/// The entity at the top of a resource holder chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HolderOwner {
    Cluster(ClusterRecord),
    Host(HostRecord),
}

/// What a resource holder ultimately belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceHolderInfo {
    /// Fixed host environment exposed by the holder (archetype/GRN holders).
    pub host_environment: Option<HostEnvironment>,
    /// Top-level cluster or host the holder is attached to.
    pub owner: Option<HolderOwner>,
}
