//! Accumulated blast radius of a proposed change.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Environment name to lifecycle statuses seen while walking the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpactedEnvironments {
    envs: BTreeMap<String, BTreeSet<String>>,
}

impl ImpactedEnvironments {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one impacted entity. Returns `false` if the pair was already present.
    pub fn record(&mut self, environment: &str, status: &str) -> bool {
        self.envs
            .entry(environment.to_string())
            .or_default()
            .insert(status.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn contains(&self, environment: &str, status: &str) -> bool {
        self.envs
            .get(environment)
            .is_some_and(|statuses| statuses.contains(status))
    }

    /// Impacted environment names in sorted order.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.envs.keys().map(String::as_str)
    }

    /// Takes an ordered snapshot suitable for serialization.
    pub fn finalize(&self) -> FinalizedImpact {
        FinalizedImpact(
            self.envs
                .iter()
                .map(|(env, statuses)| (env.clone(), statuses.iter().cloned().collect()))
                .collect(),
        )
    }
}

/// Immutable, ordered snapshot of the impact map.
///
/// Serializes as `{"<env>": ["<status>", ...]}` with both levels sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FinalizedImpact(BTreeMap<String, Vec<String>>);

impl FinalizedImpact {
    /// Statuses recorded for one environment.
    pub fn statuses(&self, environment: &str) -> Option<&[String]> {
        self.0.get(environment).map(Vec::as_slice)
    }

    pub fn contains(&self, environment: &str, status: &str) -> bool {
        self.statuses(environment)
            .is_some_and(|statuses| statuses.iter().any(|s| s == status))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(env, s)| (env.as_str(), s.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_idempotent() {
        let mut impact = ImpactedEnvironments::new();
        assert!(impact.record("prod", "ready"));
        assert!(!impact.record("prod", "ready"));
        assert!(impact.record("prod", "build"));

        let finalized = impact.finalize();
        assert_eq!(finalized.statuses("prod").unwrap(), ["build", "ready"]);
        assert_eq!(finalized.len(), 1);
    }

    #[test]
    fn test_environments_sorted() {
        let mut impact = ImpactedEnvironments::new();
        impact.record("qa", "ready");
        impact.record("dev", "build");
        impact.record("prod", "ready");

        let envs: Vec<&str> = impact.environments().collect();
        assert_eq!(envs, vec!["dev", "prod", "qa"]);
        assert!(impact.contains("dev", "build"));
        assert!(!impact.contains("dev", "ready"));
        assert!(!impact.contains("uat", "ready"));
    }

    #[test]
    fn test_finalized_serialization() {
        let mut impact = ImpactedEnvironments::new();
        impact.record("prod", "ready");
        impact.record("dev", "build");
        impact.record("prod", "almostready");

        let json = serde_json::to_string(&impact.finalize()).unwrap();
        assert_eq!(json, r#"{"dev":["build"],"prod":["almostready","ready"]}"#);
    }

    #[test]
    fn test_empty_finalizes_to_empty_object() {
        let impact = ImpactedEnvironments::new();
        assert!(impact.is_empty());
        let finalized = impact.finalize();
        assert!(finalized.is_empty());
        assert_eq!(serde_json::to_string(&finalized).unwrap(), "{}");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut impact = ImpactedEnvironments::new();
        impact.record("prod", "ready");
        let snapshot = impact.finalize();
        impact.record("prod", "build");

        assert!(!snapshot.contains("prod", "build"));
        assert!(impact.contains("prod", "build"));
    }
}
