//! Entity classifier.
//!
//! Decides how a batch of change targets reaches the walker: single targets
//! and materialized lists are dispatched one by one, lazy queries are probed
//! once and resolved in bulk.

use async_trait::async_trait;
use cmdb_core::{StoreError, Target};
use tracing::debug;

use crate::error::ChangeError;
use crate::walker::Walker;

/// A lazily evaluated collection of targets, typically a pending CMDB query.
///
/// All members of one query are expected to share a kind.
#[async_trait]
pub trait TargetQuery: Send + Sync {
    /// Number of targets the query would return.
    async fn count(&self) -> Result<usize, StoreError>;

    /// One representative target, used to pick the resolution strategy.
    async fn first(&self) -> Result<Option<Target>, StoreError>;

    /// Every target in the query.
    async fn fetch_all(&self) -> Result<Vec<Target>, StoreError>;
}

/// Query over targets that are already loaded.
#[derive(Debug, Clone, Default)]
pub struct PreparedQuery {
    targets: Vec<Target>,
}

impl PreparedQuery {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetQuery for PreparedQuery {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.targets.len())
    }

    async fn first(&self) -> Result<Option<Target>, StoreError> {
        Ok(self.targets.first().cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Target>, StoreError> {
        Ok(self.targets.clone())
    }
}

/// What a single `consider` call is asked to analyze.
pub enum TargetSet {
    /// One target.
    One(Target),
    /// A materialized list, dispatched element by element.
    List(Vec<Target>),
    /// A lazy query, resolved in bulk.
    Query(Box<dyn TargetQuery>),
}

impl TargetSet {
    /// Wraps a lazy query.
    pub fn query(query: impl TargetQuery + 'static) -> Self {
        TargetSet::Query(Box::new(query))
    }
}

impl From<Target> for TargetSet {
    fn from(target: Target) -> Self {
        TargetSet::One(target)
    }
}

impl From<Vec<Target>> for TargetSet {
    fn from(targets: Vec<Target>) -> Self {
        TargetSet::List(targets)
    }
}

impl From<Option<Target>> for TargetSet {
    fn from(target: Option<Target>) -> Self {
        TargetSet::List(target.into_iter().collect())
    }
}

impl std::fmt::Debug for TargetSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSet::One(target) => f.debug_tuple("One").field(target).finish(),
            TargetSet::List(targets) => f.debug_tuple("List").field(targets).finish(),
            TargetSet::Query(_) => f.write_str("Query(..)"),
        }
    }
}

/// Routes a target set to the walker.
pub(crate) async fn classify(
    walker: &mut Walker<'_>,
    targets: TargetSet,
) -> Result<(), ChangeError> {
    match targets {
        TargetSet::One(target) => walker.walk(&target).await,
        TargetSet::List(targets) => {
            if targets.is_empty() {
                debug!("No targets to analyze");
            }
            for target in &targets {
                walker.walk(target).await?;
            }
            Ok(())
        }
        TargetSet::Query(query) => {
            if query.count().await? == 0 {
                debug!("Target query is empty");
                return Ok(());
            }
            let Some(probe) = query.first().await? else {
                return Ok(());
            };
            let kind = probe.kind();
            let members = query.fetch_all().await?;
            debug!(
                kind = %kind,
                count = members.len(),
                metadata_only = kind.is_metadata_only(),
                "Resolving target query"
            );
            walker.walk_bulk(kind, &members).await
        }
    }
}
