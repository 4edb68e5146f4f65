//! Read-only CMDB repository.
//!
//! Provides the lookup trait the impact walker runs against and an
//! in-memory implementation for tests and embedders.

mod memory;

pub use memory::{InMemoryCmdb, InMemoryCmdbBuilder, QueryStats};

use crate::models::{
    ChassisSlot, ClusterMembers, ClusterRecord, ConsolePort, DnsRecord, HostRecord,
    ResourceHolderInfo,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the CMDB store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entity not found.
    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: String, id: Uuid },
    /// Query execution error.
    #[error("Query error: {0}")]
    Query(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// How an address ties a host or cluster to a network or DNS name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AddressBinding {
    /// Service address held directly by the host or cluster.
    ServiceAddress,
    /// Service address held by a resource group bundled under the host or cluster.
    GroupedServiceAddress,
    /// Address assigned to one of the host's interfaces.
    InterfaceAddress,
}

/// What an address lookup is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressScope {
    /// Addresses falling into any of these networks.
    Networks(Vec<Uuid>),
    /// Addresses published under this DNS name.
    Fqdn(Uuid),
}

/// Something hosts and clusters can be bound to through their personality
/// or service/OS/archetype links.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Consumer {
    /// Any stage of a personality.
    Personality(Uuid),
    /// One specific personality stage.
    PersonalityStage(Uuid),
    /// A feature linked to the personality stage.
    Feature(Uuid),
    /// A service instance the entity uses.
    ServiceInstance(Uuid),
    /// The operating system installed on the host.
    OperatingSystem(Uuid),
    /// The archetype of the entity's personality.
    Archetype(Uuid),
}

/// Reference to a host or cluster row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MemberRef {
    Host(Uuid),
    Cluster(Uuid),
}

/// Read API over the CMDB used during impact analysis.
///
/// Every method is a read. Methods taking id slices are bulk lookups;
/// callers keep each slice within the platform's bind-list limit.
#[async_trait]
pub trait CmdbReader: Send + Sync {
    /// Direct member hosts and nested clusters of a cluster.
    async fn cluster_members(&self, cluster_id: Uuid) -> StoreResult<ClusterMembers>;

    /// Hosts running on any of the given hardware entities.
    async fn hosts_on_hardware(&self, hardware_ids: &[Uuid]) -> StoreResult<Vec<HostRecord>>;

    /// Ids of every location below the given one (not including itself).
    async fn descendant_locations(&self, location_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Hosts whose hardware sits in any of the given locations.
    async fn hosts_at_locations(&self, location_ids: &[Uuid]) -> StoreResult<Vec<HostRecord>>;

    /// Clusters whose location constraint is any of the given locations.
    async fn clusters_at_locations(
        &self,
        location_ids: &[Uuid],
    ) -> StoreResult<Vec<ClusterRecord>>;

    /// Hosts holding an address of the given binding inside the scope.
    async fn hosts_bound(
        &self,
        binding: AddressBinding,
        scope: &AddressScope,
    ) -> StoreResult<Vec<HostRecord>>;

    /// Clusters holding an address of the given binding inside the scope.
    async fn clusters_bound(
        &self,
        binding: AddressBinding,
        scope: &AddressScope,
    ) -> StoreResult<Vec<ClusterRecord>>;

    /// Records published under a DNS name.
    async fn dns_records(&self, fqdn_id: Uuid) -> StoreResult<Vec<DnsRecord>>;

    /// Machine and network-device slots of a chassis.
    async fn chassis_slots(&self, chassis_id: Uuid) -> StoreResult<Vec<ChassisSlot>>;

    /// Ports of a console server.
    async fn console_ports(&self, console_server_id: Uuid) -> StoreResult<Vec<ConsolePort>>;

    /// Resolves a resource holder to its environment or top-level owner.
    async fn resource_holder(&self, holder_id: Uuid) -> StoreResult<ResourceHolderInfo>;

    /// Hosts bound to the consumer.
    async fn hosts_consuming(&self, consumer: Consumer) -> StoreResult<Vec<HostRecord>>;

    /// Clusters bound to the consumer.
    async fn clusters_consuming(&self, consumer: Consumer) -> StoreResult<Vec<ClusterRecord>>;
}
