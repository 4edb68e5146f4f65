//! Targets of a proposed change.
//!
//! A `Target` is a handle on whatever entity a broker command is about to
//! modify. It carries just enough to start the impact walk: an id, plus the
//! pre-loaded environment and status for hosts and clusters.

use crate::models::records::{ClusterRecord, HostRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a kind name does not map to any known target kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown target kind: {0}")]
pub struct UnknownTargetKind(pub String);

/// Operational tier a host or cluster runs in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HostEnvironment {
    Dev,
    Uat,
    Qa,
    Legacy,
    Prod,
    Infra,
}

impl HostEnvironment {
    /// Name of the production tier as stored on environment rows.
    pub const PRODUCTION: &'static str = "prod";

    /// Returns the stored name of this environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEnvironment::Dev => "dev",
            HostEnvironment::Uat => "uat",
            HostEnvironment::Qa => "qa",
            HostEnvironment::Legacy => "legacy",
            HostEnvironment::Prod => "prod",
            HostEnvironment::Infra => "infra",
        }
    }

    /// Whether this is the production tier.
    pub fn is_production(&self) -> bool {
        matches!(self, HostEnvironment::Prod)
    }
}

impl fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(HostEnvironment::Dev),
            "uat" => Ok(HostEnvironment::Uat),
            "qa" => Ok(HostEnvironment::Qa),
            "legacy" => Ok(HostEnvironment::Legacy),
            "prod" => Ok(HostEnvironment::Prod),
            "infra" => Ok(HostEnvironment::Infra),
            _ => Err(format!("Invalid host environment: {}", s)),
        }
    }
}

/// Cluster flavour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Generic,
    Compute,
    Storage,
    Esx,
    Meta,
    HostClusterMember,
}

/// Hardware entity flavour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HardwareKind {
    Machine,
    NetworkDevice,
}

/// Level in the location hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Organization,
    Hub,
    Continent,
    Country,
    Campus,
    City,
    Building,
    Room,
    Bunker,
    Rack,
    Desk,
}

/// Kind of resource holder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceHolderKind {
    Bundle,
    Cluster,
    Host,
    Archetype,
    Grn,
}

/// Level a feature is bound at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Host,
    Hardware,
    Interface,
}

/// Generic handle on a named entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// Entity identifier.
    pub id: Uuid,
    /// Entity name.
    pub name: String,
}

impl EntityRef {
    /// Creates a handle with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Handle on a hardware entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HardwareRef {
    pub id: Uuid,
    pub name: String,
    pub kind: HardwareKind,
}

/// Handle on a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LocationRef {
    pub id: Uuid,
    pub name: String,
    pub kind: LocationKind,
}

/// Handle on a resource holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceHolderRef {
    pub id: Uuid,
    pub kind: ResourceHolderKind,
}

/// Handle on a feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    pub id: Uuid,
    pub name: String,
    pub kind: FeatureKind,
}

/// Handle on a domain or sandbox branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BranchRef {
    /// Branch name.
    pub name: String,
    /// Whether the branch is flagged as requiring change-manager review.
    pub requires_change_manager: bool,
}

/// Anything a broker command can propose to change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Target {
    Cluster(ClusterRecord),
    Host(HostRecord),
    HardwareEntity(HardwareRef),
    Location(LocationRef),
    Network(EntityRef),
    Fqdn(EntityRef),
    Chassis(EntityRef),
    ConsoleServer(EntityRef),
    ResourceHolder(ResourceHolderRef),
    HostEnvironment(HostEnvironment),
    Personality(EntityRef),
    PersonalityStage(EntityRef),
    Feature(FeatureRef),
    ServiceInstance(EntityRef),
    OperatingSystem(EntityRef),
    Archetype(EntityRef),
    Branch(BranchRef),
    DnsDomain(String),
    DnsEnvironment(String),
    NetworkEnvironment(String),
    NetworkCompartment(String),
    NetGroupWhitelist(String),
    Grn(String),
    User(String),
    Realm(String),
    Role(String),
}

impl Target {
    /// Returns the kind of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Cluster(_) => TargetKind::Cluster,
            Target::Host(_) => TargetKind::Host,
            Target::HardwareEntity(_) => TargetKind::HardwareEntity,
            Target::Location(_) => TargetKind::Location,
            Target::Network(_) => TargetKind::Network,
            Target::Fqdn(_) => TargetKind::Fqdn,
            Target::Chassis(_) => TargetKind::Chassis,
            Target::ConsoleServer(_) => TargetKind::ConsoleServer,
            Target::ResourceHolder(_) => TargetKind::ResourceHolder,
            Target::HostEnvironment(_) => TargetKind::HostEnvironment,
            Target::Personality(_) => TargetKind::Personality,
            Target::PersonalityStage(_) => TargetKind::PersonalityStage,
            Target::Feature(_) => TargetKind::Feature,
            Target::ServiceInstance(_) => TargetKind::ServiceInstance,
            Target::OperatingSystem(_) => TargetKind::OperatingSystem,
            Target::Archetype(_) => TargetKind::Archetype,
            Target::Branch(_) => TargetKind::Branch,
            Target::DnsDomain(_) => TargetKind::DnsDomain,
            Target::DnsEnvironment(_) => TargetKind::DnsEnvironment,
            Target::NetworkEnvironment(_) => TargetKind::NetworkEnvironment,
            Target::NetworkCompartment(_) => TargetKind::NetworkCompartment,
            Target::NetGroupWhitelist(_) => TargetKind::NetGroupWhitelist,
            Target::Grn(_) => TargetKind::Grn,
            Target::User(_) => TargetKind::User,
            Target::Realm(_) => TargetKind::Realm,
            Target::Role(_) => TargetKind::Role,
        }
    }

    /// Human-readable name of the target for log output.
    pub fn name(&self) -> &str {
        match self {
            Target::Cluster(c) => &c.name,
            Target::Host(h) => &h.name,
            Target::HardwareEntity(hw) => &hw.name,
            Target::Location(l) => &l.name,
            Target::Feature(f) => &f.name,
            Target::Branch(b) => &b.name,
            Target::HostEnvironment(env) => env.as_str(),
            Target::ResourceHolder(_) => "resource holder",
            Target::Network(e)
            | Target::Fqdn(e)
            | Target::Chassis(e)
            | Target::ConsoleServer(e)
            | Target::Personality(e)
            | Target::PersonalityStage(e)
            | Target::ServiceInstance(e)
            | Target::OperatingSystem(e)
            | Target::Archetype(e) => &e.name,
            Target::DnsDomain(name)
            | Target::DnsEnvironment(name)
            | Target::NetworkEnvironment(name)
            | Target::NetworkCompartment(name)
            | Target::NetGroupWhitelist(name)
            | Target::Grn(name)
            | Target::User(name)
            | Target::Realm(name)
            | Target::Role(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// Fieldless mirror of the `Target` variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Cluster,
    Host,
    HardwareEntity,
    Location,
    Network,
    Fqdn,
    Chassis,
    ConsoleServer,
    ResourceHolder,
    HostEnvironment,
    Personality,
    PersonalityStage,
    Feature,
    ServiceInstance,
    OperatingSystem,
    Archetype,
    Branch,
    DnsDomain,
    DnsEnvironment,
    NetworkEnvironment,
    NetworkCompartment,
    NetGroupWhitelist,
    Grn,
    User,
    Realm,
    Role,
}

impl TargetKind {
    /// Every known kind, in declaration order.
    pub const ALL: [TargetKind; 26] = [
        TargetKind::Cluster,
        TargetKind::Host,
        TargetKind::HardwareEntity,
        TargetKind::Location,
        TargetKind::Network,
        TargetKind::Fqdn,
        TargetKind::Chassis,
        TargetKind::ConsoleServer,
        TargetKind::ResourceHolder,
        TargetKind::HostEnvironment,
        TargetKind::Personality,
        TargetKind::PersonalityStage,
        TargetKind::Feature,
        TargetKind::ServiceInstance,
        TargetKind::OperatingSystem,
        TargetKind::Archetype,
        TargetKind::Branch,
        TargetKind::DnsDomain,
        TargetKind::DnsEnvironment,
        TargetKind::NetworkEnvironment,
        TargetKind::NetworkCompartment,
        TargetKind::NetGroupWhitelist,
        TargetKind::Grn,
        TargetKind::User,
        TargetKind::Realm,
        TargetKind::Role,
    ];

    /// Returns the snake_case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Cluster => "cluster",
            TargetKind::Host => "host",
            TargetKind::HardwareEntity => "hardware_entity",
            TargetKind::Location => "location",
            TargetKind::Network => "network",
            TargetKind::Fqdn => "fqdn",
            TargetKind::Chassis => "chassis",
            TargetKind::ConsoleServer => "console_server",
            TargetKind::ResourceHolder => "resource_holder",
            TargetKind::HostEnvironment => "host_environment",
            TargetKind::Personality => "personality",
            TargetKind::PersonalityStage => "personality_stage",
            TargetKind::Feature => "feature",
            TargetKind::ServiceInstance => "service_instance",
            TargetKind::OperatingSystem => "operating_system",
            TargetKind::Archetype => "archetype",
            TargetKind::Branch => "branch",
            TargetKind::DnsDomain => "dns_domain",
            TargetKind::DnsEnvironment => "dns_environment",
            TargetKind::NetworkEnvironment => "network_environment",
            TargetKind::NetworkCompartment => "network_compartment",
            TargetKind::NetGroupWhitelist => "netgroup_whitelist",
            TargetKind::Grn => "grn",
            TargetKind::User => "user",
            TargetKind::Realm => "realm",
            TargetKind::Role => "role",
        }
    }

    /// Whether changes to this kind never fan out to hosts or clusters.
    pub fn is_metadata_only(&self) -> bool {
        matches!(
            self,
            TargetKind::DnsDomain
                | TargetKind::DnsEnvironment
                | TargetKind::NetworkEnvironment
                | TargetKind::NetworkCompartment
                | TargetKind::NetGroupWhitelist
                | TargetKind::Grn
                | TargetKind::User
                | TargetKind::Realm
                | TargetKind::Role
        )
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = UnknownTargetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TargetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| UnknownTargetKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in TargetKind::ALL {
            assert_eq!(kind.as_str().parse::<TargetKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "blade_enclosure".parse::<TargetKind>().unwrap_err();
        assert_eq!(err, UnknownTargetKind("blade_enclosure".to_string()));
        assert!(err.to_string().contains("blade_enclosure"));
    }

    #[test]
    fn test_target_reports_its_kind() {
        let host = Target::Host(HostRecord::new("web01.example.com", "prod", "ready"));
        assert_eq!(host.kind(), TargetKind::Host);
        assert_eq!(host.to_string(), "host web01.example.com");

        let env = Target::HostEnvironment(HostEnvironment::Qa);
        assert_eq!(env.kind(), TargetKind::HostEnvironment);
        assert_eq!(env.name(), "qa");
    }

    #[test]
    fn test_metadata_only_kinds() {
        assert!(TargetKind::DnsDomain.is_metadata_only());
        assert!(TargetKind::Role.is_metadata_only());
        assert!(!TargetKind::Host.is_metadata_only());
        assert!(!TargetKind::Branch.is_metadata_only());
    }

    #[test]
    fn test_target_serialization() {
        let target = Target::Grn("grn:/ms/ei/aquilon".to_string());
        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value["kind"], "grn");
        assert_eq!(value["target"], "grn:/ms/ei/aquilon");

        let env: Target = serde_json::from_str(r#"{"kind":"host_environment","target":"prod"}"#).unwrap();
        assert_eq!(env, Target::HostEnvironment(HostEnvironment::Prod));
    }

    #[test]
    fn test_host_environment_parsing() {
        assert_eq!("PROD".parse::<HostEnvironment>(), Ok(HostEnvironment::Prod));
        assert!(HostEnvironment::Prod.is_production());
        assert!(!HostEnvironment::Infra.is_production());
        assert_eq!(HostEnvironment::PRODUCTION, HostEnvironment::Prod.as_str());
        assert!("staging".parse::<HostEnvironment>().is_err());
    }
}
