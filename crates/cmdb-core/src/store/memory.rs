//! In-memory CMDB for testing.

use super::{AddressBinding, AddressScope, CmdbReader, Consumer, MemberRef, StoreError, StoreResult};
use crate::models::{
    ChassisSlot, ClusterMembers, ClusterRecord, ConsolePort, DnsRecord, HostRecord,
    ResourceHolderInfo,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct AddressRow {
    holder: MemberRef,
    binding: AddressBinding,
    network: Uuid,
    fqdn: Option<Uuid>,
    ip: IpAddr,
}

#[derive(Debug, Default)]
struct CmdbData {
    hosts: HashMap<Uuid, HostRecord>,
    clusters: HashMap<Uuid, ClusterRecord>,
    cluster_hosts: HashMap<Uuid, Vec<Uuid>>,
    cluster_children: HashMap<Uuid, Vec<Uuid>>,
    hardware_hosts: HashMap<Uuid, Uuid>,
    hardware_locations: HashMap<Uuid, Uuid>,
    location_parents: HashMap<Uuid, Uuid>,
    cluster_locations: HashMap<Uuid, Uuid>,
    addresses: Vec<AddressRow>,
    dns: HashMap<Uuid, Vec<DnsRecord>>,
    chassis: HashMap<Uuid, Vec<ChassisSlot>>,
    consoles: HashMap<Uuid, Vec<ConsolePort>>,
    holders: HashMap<Uuid, ResourceHolderInfo>,
    stage_personality: HashMap<Uuid, Uuid>,
    stage_features: HashMap<Uuid, Vec<Uuid>>,
    member_stage: HashMap<MemberRef, Uuid>,
    links: Vec<(Consumer, MemberRef)>,
}

impl CmdbData {
    fn host_rows<I: IntoIterator<Item = Uuid>>(&self, ids: I) -> Vec<HostRecord> {
        let mut seen = HashSet::new();
        let mut rows: Vec<HostRecord> = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.hosts.get(&id).cloned())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    fn cluster_rows<I: IntoIterator<Item = Uuid>>(&self, ids: I) -> Vec<ClusterRecord> {
        let mut seen = HashSet::new();
        let mut rows: Vec<ClusterRecord> = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.clusters.get(&id).cloned())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    fn children_of(&self, location_id: Uuid) -> Vec<Uuid> {
        self.location_parents
            .iter()
            .filter(|(_, parent)| **parent == location_id)
            .map(|(child, _)| *child)
            .collect()
    }

    fn addresses_in_scope<'a>(
        &'a self,
        binding: AddressBinding,
        scope: &'a AddressScope,
    ) -> impl Iterator<Item = &'a AddressRow> + 'a {
        let fqdn_ips: Vec<IpAddr> = match scope {
            AddressScope::Fqdn(fqdn) if binding == AddressBinding::InterfaceAddress => self
                .dns
                .get(fqdn)
                .map(|records| {
                    records
                        .iter()
                        .filter_map(|r| match r {
                            DnsRecord::Address { ip } => Some(*ip),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        self.addresses
            .iter()
            .filter(move |row| row.binding == binding)
            .filter(move |row| match scope {
                AddressScope::Networks(ids) => ids.contains(&row.network),
                AddressScope::Fqdn(fqdn) => {
                    if binding == AddressBinding::InterfaceAddress {
                        fqdn_ips.contains(&row.ip)
                    } else {
                        row.fqdn == Some(*fqdn)
                    }
                }
            })
    }

    fn members_consuming(&self, consumer: Consumer) -> Vec<MemberRef> {
        match consumer {
            Consumer::PersonalityStage(stage) => self
                .member_stage
                .iter()
                .filter(|(_, s)| **s == stage)
                .map(|(m, _)| *m)
                .collect(),
            Consumer::Personality(personality) => self
                .member_stage
                .iter()
                .filter(|(_, s)| self.stage_personality.get(*s) == Some(&personality))
                .map(|(m, _)| *m)
                .collect(),
            Consumer::Feature(feature) => self
                .member_stage
                .iter()
                .filter(|(_, s)| {
                    self.stage_features
                        .get(*s)
                        .is_some_and(|features| features.contains(&feature))
                })
                .map(|(m, _)| *m)
                .collect(),
            Consumer::ServiceInstance(_)
            | Consumer::OperatingSystem(_)
            | Consumer::Archetype(_) => self
                .links
                .iter()
                .filter(|(c, _)| *c == consumer)
                .map(|(_, m)| *m)
                .collect(),
        }
    }
}

fn host_ids(members: &[MemberRef]) -> impl Iterator<Item = Uuid> + '_ {
    members.iter().filter_map(|m| match m {
        MemberRef::Host(id) => Some(*id),
        MemberRef::Cluster(_) => None,
    })
}

fn cluster_ids(members: &[MemberRef]) -> impl Iterator<Item = Uuid> + '_ {
    members.iter().filter_map(|m| match m {
        MemberRef::Cluster(id) => Some(*id),
        MemberRef::Host(_) => None,
    })
}

/// Counters describing the lookups made against an [`InMemoryCmdb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Number of bulk id-list lookups.
    pub batches: usize,
    /// Largest id list submitted in a single bulk lookup.
    pub largest_batch: usize,
    /// Number of DNS record lookups.
    pub dns_lookups: usize,
}

#[derive(Debug, Default)]
struct QueryCounters {
    batches: AtomicUsize,
    largest_batch: AtomicUsize,
    dns_lookups: AtomicUsize,
}

impl QueryCounters {
    fn batch(&self, size: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.largest_batch.fetch_max(size, Ordering::Relaxed);
    }
}

/// In-memory implementation of [`CmdbReader`] for testing.
pub struct InMemoryCmdb {
    data: Arc<RwLock<CmdbData>>,
    counters: QueryCounters,
}

impl InMemoryCmdb {
    /// Creates a new empty in-memory CMDB.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a populated in-memory CMDB.
    pub fn builder() -> InMemoryCmdbBuilder {
        InMemoryCmdbBuilder::default()
    }

    /// Returns a snapshot of the lookup counters.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            batches: self.counters.batches.load(Ordering::Relaxed),
            largest_batch: self.counters.largest_batch.load(Ordering::Relaxed),
            dns_lookups: self.counters.dns_lookups.load(Ordering::Relaxed),
        }
    }
}

impl Default for InMemoryCmdb {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`InMemoryCmdb`].
#[derive(Debug, Default)]
pub struct InMemoryCmdbBuilder {
    data: CmdbData,
}

impl InMemoryCmdbBuilder {
    /// Adds a host row.
    pub fn host(mut self, host: HostRecord) -> Self {
        self.data.hosts.insert(host.id, host);
        self
    }

    /// Adds a cluster row.
    pub fn cluster(mut self, cluster: ClusterRecord) -> Self {
        self.data.clusters.insert(cluster.id, cluster);
        self
    }

    /// Makes a host a member of a cluster.
    pub fn cluster_host(mut self, cluster_id: Uuid, host_id: Uuid) -> Self {
        self.data
            .cluster_hosts
            .entry(cluster_id)
            .or_default()
            .push(host_id);
        self
    }

    /// Nests a cluster below another one.
    pub fn cluster_child(mut self, parent_id: Uuid, child_id: Uuid) -> Self {
        self.data
            .cluster_children
            .entry(parent_id)
            .or_default()
            .push(child_id);
        self
    }

    /// Adds a location below an optional parent.
    pub fn location(mut self, location_id: Uuid, parent_id: Option<Uuid>) -> Self {
        if let Some(parent) = parent_id {
            self.data.location_parents.insert(location_id, parent);
        }
        self
    }

    /// Places a hardware entity in a location.
    pub fn hardware_at(mut self, hardware_id: Uuid, location_id: Uuid) -> Self {
        self.data.hardware_locations.insert(hardware_id, location_id);
        self
    }

    /// Installs a host on a hardware entity.
    pub fn host_on(mut self, host_id: Uuid, hardware_id: Uuid) -> Self {
        self.data.hardware_hosts.insert(hardware_id, host_id);
        self
    }

    /// Constrains a cluster to a location.
    pub fn cluster_at(mut self, cluster_id: Uuid, location_id: Uuid) -> Self {
        self.data.cluster_locations.insert(cluster_id, location_id);
        self
    }

    /// Assigns an address to a host or cluster.
    pub fn address(
        mut self,
        holder: MemberRef,
        binding: AddressBinding,
        network_id: Uuid,
        fqdn_id: Option<Uuid>,
        ip: IpAddr,
    ) -> Self {
        self.data.addresses.push(AddressRow {
            holder,
            binding,
            network: network_id,
            fqdn: fqdn_id,
            ip,
        });
        self
    }

    /// Publishes a DNS record under a name.
    pub fn dns_record(mut self, fqdn_id: Uuid, record: DnsRecord) -> Self {
        self.data.dns.entry(fqdn_id).or_default().push(record);
        self
    }

    /// Adds a slot to a chassis.
    pub fn chassis_slot(mut self, chassis_id: Uuid, slot: ChassisSlot) -> Self {
        self.data.chassis.entry(chassis_id).or_default().push(slot);
        self
    }

    /// Adds a port to a console server.
    pub fn console_port(mut self, console_server_id: Uuid, port: ConsolePort) -> Self {
        self.data
            .consoles
            .entry(console_server_id)
            .or_default()
            .push(port);
        self
    }

    /// Registers a resource holder.
    pub fn resource_holder(mut self, holder_id: Uuid, info: ResourceHolderInfo) -> Self {
        self.data.holders.insert(holder_id, info);
        self
    }

    /// Declares a personality stage.
    pub fn personality_stage(mut self, stage_id: Uuid, personality_id: Uuid) -> Self {
        self.data.stage_personality.insert(stage_id, personality_id);
        self
    }

    /// Links a feature to a personality stage.
    pub fn stage_feature(mut self, stage_id: Uuid, feature_id: Uuid) -> Self {
        self.data
            .stage_features
            .entry(stage_id)
            .or_default()
            .push(feature_id);
        self
    }

    /// Binds a host or cluster to a personality stage.
    pub fn bind_stage(mut self, member: MemberRef, stage_id: Uuid) -> Self {
        self.data.member_stage.insert(member, stage_id);
        self
    }

    /// Links a host or cluster to a service instance, OS or archetype.
    pub fn link(mut self, consumer: Consumer, member: MemberRef) -> Self {
        self.data.links.push((consumer, member));
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> InMemoryCmdb {
        InMemoryCmdb {
            data: Arc::new(RwLock::new(self.data)),
            counters: QueryCounters::default(),
        }
    }
}

#[async_trait]
impl CmdbReader for InMemoryCmdb {
    async fn cluster_members(&self, cluster_id: Uuid) -> StoreResult<ClusterMembers> {
        let data = self.data.read().await;
        let hosts = data
            .cluster_hosts
            .get(&cluster_id)
            .map(|ids| data.host_rows(ids.iter().copied()))
            .unwrap_or_default();
        let clusters = data
            .cluster_children
            .get(&cluster_id)
            .map(|ids| data.cluster_rows(ids.iter().copied()))
            .unwrap_or_default();
        Ok(ClusterMembers { hosts, clusters })
    }

    async fn hosts_on_hardware(&self, hardware_ids: &[Uuid]) -> StoreResult<Vec<HostRecord>> {
        self.counters.batch(hardware_ids.len());
        let data = self.data.read().await;
        Ok(data.host_rows(
            hardware_ids
                .iter()
                .filter_map(|hw| data.hardware_hosts.get(hw).copied()),
        ))
    }

    async fn descendant_locations(&self, location_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let data = self.data.read().await;
        let mut found = Vec::new();
        let mut seen = HashSet::from([location_id]);
        let mut queue = VecDeque::from([location_id]);
        while let Some(current) = queue.pop_front() {
            for child in data.children_of(current) {
                if seen.insert(child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(found)
    }

    async fn hosts_at_locations(&self, location_ids: &[Uuid]) -> StoreResult<Vec<HostRecord>> {
        self.counters.batch(location_ids.len());
        let data = self.data.read().await;
        let wanted: HashSet<&Uuid> = location_ids.iter().collect();
        Ok(data.host_rows(
            data.hardware_locations
                .iter()
                .filter(|(_, loc)| wanted.contains(loc))
                .filter_map(|(hw, _)| data.hardware_hosts.get(hw).copied()),
        ))
    }

    async fn clusters_at_locations(
        &self,
        location_ids: &[Uuid],
    ) -> StoreResult<Vec<ClusterRecord>> {
        self.counters.batch(location_ids.len());
        let data = self.data.read().await;
        let wanted: HashSet<&Uuid> = location_ids.iter().collect();
        Ok(data.cluster_rows(
            data.cluster_locations
                .iter()
                .filter(|(_, loc)| wanted.contains(loc))
                .map(|(cluster, _)| *cluster),
        ))
    }

    async fn hosts_bound(
        &self,
        binding: AddressBinding,
        scope: &AddressScope,
    ) -> StoreResult<Vec<HostRecord>> {
        if let AddressScope::Networks(ids) = scope {
            self.counters.batch(ids.len());
        }
        let data = self.data.read().await;
        let holders: Vec<MemberRef> = data
            .addresses_in_scope(binding, scope)
            .map(|row| row.holder)
            .collect();
        Ok(data.host_rows(host_ids(&holders)))
    }

    async fn clusters_bound(
        &self,
        binding: AddressBinding,
        scope: &AddressScope,
    ) -> StoreResult<Vec<ClusterRecord>> {
        if let AddressScope::Networks(ids) = scope {
            self.counters.batch(ids.len());
        }
        let data = self.data.read().await;
        let holders: Vec<MemberRef> = data
            .addresses_in_scope(binding, scope)
            .map(|row| row.holder)
            .collect();
        Ok(data.cluster_rows(cluster_ids(&holders)))
    }

    async fn dns_records(&self, fqdn_id: Uuid) -> StoreResult<Vec<DnsRecord>> {
        self.counters.dns_lookups.fetch_add(1, Ordering::Relaxed);
        let data = self.data.read().await;
        Ok(data.dns.get(&fqdn_id).cloned().unwrap_or_default())
    }

    async fn chassis_slots(&self, chassis_id: Uuid) -> StoreResult<Vec<ChassisSlot>> {
        let data = self.data.read().await;
        Ok(data.chassis.get(&chassis_id).cloned().unwrap_or_default())
    }

    async fn console_ports(&self, console_server_id: Uuid) -> StoreResult<Vec<ConsolePort>> {
        let data = self.data.read().await;
        Ok(data
            .consoles
            .get(&console_server_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn resource_holder(&self, holder_id: Uuid) -> StoreResult<ResourceHolderInfo> {
        let data = self.data.read().await;
        data.holders
            .get(&holder_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "resource holder".to_string(),
                id: holder_id,
            })
    }

    async fn hosts_consuming(&self, consumer: Consumer) -> StoreResult<Vec<HostRecord>> {
        let data = self.data.read().await;
        let members = data.members_consuming(consumer);
        Ok(data.host_rows(host_ids(&members)))
    }

    async fn clusters_consuming(&self, consumer: Consumer) -> StoreResult<Vec<ClusterRecord>> {
        let data = self.data.read().await;
        let members = data.members_consuming(consumer);
        Ok(data.cluster_rows(cluster_ids(&members)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusterKind;

    #[tokio::test]
    async fn test_descendant_locations_walks_whole_subtree() {
        let building = Uuid::new_v4();
        let room = Uuid::new_v4();
        let rack = Uuid::new_v4();
        let other = Uuid::new_v4();

        let cmdb = InMemoryCmdb::builder()
            .location(building, None)
            .location(room, Some(building))
            .location(rack, Some(room))
            .location(other, None)
            .build();

        let mut found = cmdb.descendant_locations(building).await.unwrap();
        found.sort();
        let mut expected = vec![room, rack];
        expected.sort();
        assert_eq!(found, expected);
        assert!(cmdb.descendant_locations(other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_members() {
        let cluster = ClusterRecord::new("grid1", ClusterKind::Compute, "prod", "ready");
        let child = ClusterRecord::new("grid1a", ClusterKind::Compute, "prod", "ready");
        let host = HostRecord::new("node1.example.com", "prod", "ready");

        let cmdb = InMemoryCmdb::builder()
            .cluster(cluster.clone())
            .cluster(child.clone())
            .host(host.clone())
            .cluster_host(cluster.id, host.id)
            .cluster_child(cluster.id, child.id)
            .build();

        let members = cmdb.cluster_members(cluster.id).await.unwrap();
        assert_eq!(members.hosts, vec![host]);
        assert_eq!(members.clusters, vec![child]);
    }

    #[tokio::test]
    async fn test_interface_address_matches_fqdn_ips() {
        let host = HostRecord::new("db1.example.com", "prod", "ready");
        let network = Uuid::new_v4();
        let fqdn = Uuid::new_v4();
        let ip: IpAddr = "10.0.0.5".parse().unwrap();

        let cmdb = InMemoryCmdb::builder()
            .host(host.clone())
            .address(
                MemberRef::Host(host.id),
                AddressBinding::InterfaceAddress,
                network,
                None,
                ip,
            )
            .dns_record(fqdn, DnsRecord::Address { ip })
            .build();

        let hosts = cmdb
            .hosts_bound(AddressBinding::InterfaceAddress, &AddressScope::Fqdn(fqdn))
            .await
            .unwrap();
        assert_eq!(hosts, vec![host.clone()]);

        let hosts = cmdb
            .hosts_bound(
                AddressBinding::InterfaceAddress,
                &AddressScope::Networks(vec![network]),
            )
            .await
            .unwrap();
        assert_eq!(hosts, vec![host]);
        assert_eq!(cmdb.stats().batches, 1);
    }

    #[tokio::test]
    async fn test_personality_consumer_covers_every_stage() {
        let personality = Uuid::new_v4();
        let current = Uuid::new_v4();
        let next = Uuid::new_v4();
        let a = HostRecord::new("a.example.com", "prod", "ready");
        let b = HostRecord::new("b.example.com", "qa", "build");

        let cmdb = InMemoryCmdb::builder()
            .host(a.clone())
            .host(b.clone())
            .personality_stage(current, personality)
            .personality_stage(next, personality)
            .bind_stage(MemberRef::Host(a.id), current)
            .bind_stage(MemberRef::Host(b.id), next)
            .build();

        let all = cmdb
            .hosts_consuming(Consumer::Personality(personality))
            .await
            .unwrap();
        assert_eq!(all, vec![a.clone(), b]);

        let staged = cmdb
            .hosts_consuming(Consumer::PersonalityStage(current))
            .await
            .unwrap();
        assert_eq!(staged, vec![a]);
    }

    #[tokio::test]
    async fn test_unknown_resource_holder() {
        let cmdb = InMemoryCmdb::new();
        let result = cmdb.resource_holder(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
