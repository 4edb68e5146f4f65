//! Graph walker resolving change targets to impacted hosts and clusters.
//!
//! Each target kind has one strategy. Strategies fan out through the
//! `CmdbReader` and end by recording the environment and lifecycle status of
//! every concrete host and cluster they reach.

use cmdb_core::{
    AddressBinding, AddressScope, BranchRef, CmdbReader, ClusterRecord, Consumer, EntityRef,
    HolderOwner, HostEnvironment, HostRecord, LocationRef, ResourceHolderRef, Target, TargetKind,
    UnknownTargetKind,
};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChangeError;
use crate::impact::ImpactedEnvironments;

/// Largest id list passed to a single bulk lookup.
pub const MAX_ID_BATCH: usize = 1000;

const CLUSTER_BINDINGS: [AddressBinding; 2] = [
    AddressBinding::ServiceAddress,
    AddressBinding::GroupedServiceAddress,
];

const HOST_BINDINGS: [AddressBinding; 3] = [
    AddressBinding::InterfaceAddress,
    AddressBinding::ServiceAddress,
    AddressBinding::GroupedServiceAddress,
];

/// Mutable state of one impact analysis.
#[derive(Debug, Default)]
pub(crate) struct Traversal {
    pub(crate) impact: ImpactedEnvironments,
    pub(crate) enforce: bool,
    seen_hosts: HashSet<Uuid>,
    seen_clusters: HashSet<Uuid>,
}

impl Traversal {
    /// Switches on strict validation. Never switched back off.
    pub(crate) fn enforce(&mut self) {
        self.enforce = true;
    }

    fn record(&mut self, environment: &str, status: &str) {
        self.impact.record(environment, status);
        if environment == HostEnvironment::PRODUCTION {
            self.enforce();
        }
    }
}

pub(crate) struct Walker<'a> {
    store: &'a dyn CmdbReader,
    state: &'a mut Traversal,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(store: &'a dyn CmdbReader, state: &'a mut Traversal) -> Self {
        Self { store, state }
    }

    /// Applies the strategy for a single target.
    pub(crate) async fn walk(&mut self, target: &Target) -> Result<(), ChangeError> {
        debug!(target = %target, "Calculating impacted environments");

        match target {
            Target::Cluster(cluster) => self.walk_cluster(cluster.clone()).await,
            Target::Host(host) => {
                self.record_host(host);
                Ok(())
            }
            Target::HardwareEntity(hw) => self.walk_hardware(&[hw.id]).await,
            Target::Location(location) => self.walk_location(location).await,
            Target::Network(network) => self.walk_networks(&[network.id]).await,
            Target::Fqdn(fqdn) => self.walk_fqdn(fqdn).await,
            Target::Chassis(chassis) => self.walk_chassis(chassis).await,
            Target::ConsoleServer(server) => self.walk_console_server(server).await,
            Target::ResourceHolder(holder) => self.walk_resource_holder(holder).await,
            Target::HostEnvironment(env) => {
                self.apply_host_environment(*env);
                Ok(())
            }
            Target::Personality(p) => self.walk_consumer(Consumer::Personality(p.id)).await,
            Target::PersonalityStage(stage) => {
                self.walk_consumer(Consumer::PersonalityStage(stage.id)).await
            }
            Target::Feature(feature) => self.walk_consumer(Consumer::Feature(feature.id)).await,
            Target::ServiceInstance(si) => {
                self.walk_consumer(Consumer::ServiceInstance(si.id)).await
            }
            Target::OperatingSystem(os) => {
                self.walk_consumer(Consumer::OperatingSystem(os.id)).await
            }
            Target::Archetype(archetype) => {
                self.walk_consumer(Consumer::Archetype(archetype.id)).await
            }
            Target::Branch(branch) => {
                self.apply_branch(branch);
                Ok(())
            }
            // Carried in the request metadata only.
            Target::DnsDomain(_)
            | Target::DnsEnvironment(_)
            | Target::NetworkEnvironment(_)
            | Target::NetworkCompartment(_)
            | Target::NetGroupWhitelist(_)
            | Target::Grn(_)
            | Target::User(_)
            | Target::Realm(_)
            | Target::Role(_) => Ok(()),
        }
    }

    /// Applies the strategy for `kind` to a whole batch of targets.
    ///
    /// Hardware entities and networks are resolved with chunked bulk
    /// lookups; every other kind is walked one target at a time.
    pub(crate) async fn walk_bulk(
        &mut self,
        kind: TargetKind,
        targets: &[Target],
    ) -> Result<(), ChangeError> {
        debug!(kind = %kind, count = targets.len(), "Calculating impact for target batch");

        match kind {
            TargetKind::HardwareEntity => {
                let ids = targets
                    .iter()
                    .map(|target| match target {
                        Target::HardwareEntity(hw) => Ok(hw.id),
                        other => Err(mismatched_kind(kind, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.walk_hardware(&ids).await
            }
            TargetKind::Network => {
                let ids = targets
                    .iter()
                    .map(|target| match target {
                        Target::Network(network) => Ok(network.id),
                        other => Err(mismatched_kind(kind, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.walk_networks(&ids).await
            }
            _ => {
                for target in targets {
                    if target.kind() != kind {
                        return Err(mismatched_kind(kind, target));
                    }
                    self.walk(target).await?;
                }
                Ok(())
            }
        }
    }

    fn record_host(&mut self, host: &HostRecord) {
        if !self.state.seen_hosts.insert(host.id) {
            return;
        }
        self.state.record(&host.environment, &host.status);
    }

    /// Records a cluster, its member hosts and every nested cluster.
    async fn walk_cluster(&mut self, root: ClusterRecord) -> Result<(), ChangeError> {
        let mut pending = vec![root];

        while let Some(cluster) = pending.pop() {
            if !self.state.seen_clusters.insert(cluster.id) {
                continue;
            }
            debug!(cluster = %cluster.name, "Expanding cluster");

            self.state.record(&cluster.environment, &cluster.status);
            let members = self.store.cluster_members(cluster.id).await?;
            for host in &members.hosts {
                self.record_host(host);
            }
            pending.extend(members.clusters);
        }

        Ok(())
    }

    async fn walk_clusters(&mut self, clusters: Vec<ClusterRecord>) -> Result<(), ChangeError> {
        for cluster in clusters {
            self.walk_cluster(cluster).await?;
        }
        Ok(())
    }

    async fn walk_hardware(&mut self, hardware_ids: &[Uuid]) -> Result<(), ChangeError> {
        for chunk in hardware_ids.chunks(MAX_ID_BATCH) {
            let hosts = self.store.hosts_on_hardware(chunk).await?;
            for host in &hosts {
                self.record_host(host);
            }
        }
        Ok(())
    }

    async fn walk_location(&mut self, location: &LocationRef) -> Result<(), ChangeError> {
        let mut location_ids = self.store.descendant_locations(location.id).await?;
        location_ids.push(location.id);
        debug!(
            location = %location.name,
            locations = location_ids.len(),
            "Resolved location subtree"
        );

        for chunk in location_ids.chunks(MAX_ID_BATCH) {
            let hosts = self.store.hosts_at_locations(chunk).await?;
            for host in &hosts {
                self.record_host(host);
            }
            let clusters = self.store.clusters_at_locations(chunk).await?;
            self.walk_clusters(clusters).await?;
        }
        Ok(())
    }

    async fn walk_networks(&mut self, network_ids: &[Uuid]) -> Result<(), ChangeError> {
        for chunk in network_ids.chunks(MAX_ID_BATCH) {
            self.walk_bound(&AddressScope::Networks(chunk.to_vec()))
                .await?;
        }
        Ok(())
    }

    /// Walks every host and cluster holding an address within `scope`.
    async fn walk_bound(&mut self, scope: &AddressScope) -> Result<(), ChangeError> {
        for binding in CLUSTER_BINDINGS {
            let clusters = self.store.clusters_bound(binding, scope).await?;
            self.walk_clusters(clusters).await?;
        }
        for binding in HOST_BINDINGS {
            let hosts = self.store.hosts_bound(binding, scope).await?;
            for host in &hosts {
                self.record_host(host);
            }
        }
        Ok(())
    }

    async fn walk_fqdn(&mut self, fqdn: &EntityRef) -> Result<(), ChangeError> {
        let resolved = self.resolve_alias_chain(fqdn).await?;
        if resolved.id != fqdn.id {
            debug!(fqdn = %fqdn.name, target = %resolved.name, "Followed alias chain");
        }
        self.walk_bound(&AddressScope::Fqdn(resolved.id)).await
    }

    /// Follows alias and address-alias records to the name that holds real records.
    ///
    /// Names are expanded depth first. A name reachable from itself is a
    /// cycle and aborts the check; a name reached again by another path is
    /// already resolved and skipped.
    async fn resolve_alias_chain(&mut self, start: &EntityRef) -> Result<EntityRef, ChangeError> {
        let mut resolved = start.clone();
        let mut done: HashSet<Uuid> = HashSet::new();
        let mut on_path: HashSet<Uuid> = HashSet::from([start.id]);
        let first = self.alias_targets(start, &mut resolved).await?;
        let mut stack: Vec<(Uuid, Vec<EntityRef>)> = vec![(start.id, first)];

        while let Some((id, pending)) = stack.last_mut() {
            let id = *id;
            let Some(next) = pending.pop() else {
                on_path.remove(&id);
                done.insert(id);
                stack.pop();
                continue;
            };
            if on_path.contains(&next.id) {
                return Err(ChangeError::CyclicAliasChain { name: next.name });
            }
            if done.contains(&next.id) {
                continue;
            }

            on_path.insert(next.id);
            let targets = self.alias_targets(&next, &mut resolved).await?;
            stack.push((next.id, targets));
        }

        Ok(resolved)
    }

    /// Alias targets published under `name`, last record first.
    ///
    /// Updates `resolved` when the name also holds a real record.
    async fn alias_targets(
        &self,
        name: &EntityRef,
        resolved: &mut EntityRef,
    ) -> Result<Vec<EntityRef>, ChangeError> {
        let mut targets = Vec::new();
        for record in self.store.dns_records(name.id).await? {
            match record.alias_target() {
                Some(target) => targets.push(target.clone()),
                None => *resolved = name.clone(),
            }
        }
        targets.reverse();
        Ok(targets)
    }

    async fn walk_chassis(&mut self, chassis: &EntityRef) -> Result<(), ChangeError> {
        let occupants: Vec<Uuid> = self
            .store
            .chassis_slots(chassis.id)
            .await?
            .iter()
            .filter_map(|slot| slot.occupant)
            .collect();
        self.walk_hardware(&occupants).await
    }

    async fn walk_console_server(&mut self, server: &EntityRef) -> Result<(), ChangeError> {
        let clients: Vec<Uuid> = self
            .store
            .console_ports(server.id)
            .await?
            .iter()
            .filter_map(|port| port.client)
            .collect();
        self.walk_hardware(&clients).await
    }

    async fn walk_resource_holder(&mut self, holder: &ResourceHolderRef) -> Result<(), ChangeError> {
        let info = self.store.resource_holder(holder.id).await?;

        if let Some(env) = info.host_environment {
            self.apply_host_environment(env);
            return Ok(());
        }

        match info.owner {
            Some(HolderOwner::Cluster(cluster)) => self.walk_cluster(cluster).await,
            Some(HolderOwner::Host(host)) => {
                self.record_host(&host);
                Ok(())
            }
            None => {
                debug!(holder = %holder.id, "Resource holder has no owner");
                Ok(())
            }
        }
    }

    async fn walk_consumer(&mut self, consumer: Consumer) -> Result<(), ChangeError> {
        let clusters = self.store.clusters_consuming(consumer).await?;
        self.walk_clusters(clusters).await?;

        let hosts = self.store.hosts_consuming(consumer).await?;
        for host in &hosts {
            self.record_host(host);
        }
        Ok(())
    }

    fn apply_host_environment(&mut self, env: HostEnvironment) {
        if env.is_production() {
            debug!(environment = %env, "Production environment forces validation");
            self.state.enforce();
        }
    }

    fn apply_branch(&mut self, branch: &BranchRef) {
        if branch.requires_change_manager {
            debug!(branch = %branch.name, "Branch requires change manager review");
            self.state.enforce();
        }
    }
}

fn mismatched_kind(expected: TargetKind, found: &Target) -> ChangeError {
    UnknownTargetKind(format!("{} in a {} batch", found.kind(), expected)).into()
}
