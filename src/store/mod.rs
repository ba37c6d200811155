//! The store orchestrator: dual-index attachment, combined queries,
//! capability removal.
//!
//! `ContinuumStore` owns the host graph and hands each index service a
//! shared handle to it. Attachment and removal each run as ONE transaction
//! across both indexes, so external readers see an entity as fully capable
//! or not at all. The combined query runs its two phases under separate
//! read transactions; see [`ContinuumStore::query`] for the staleness
//! window that implies.

use crate::config::{Config, PruningPolicy};
use crate::error::{ContinuumError, Result};
use crate::graph::{EntityId, GraphStore, Label};
use crate::index::spatial::{Region, SpatialIndex};
use crate::index::temporal::{self, TemporalIndex, TimeRole};
use crate::validate;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod lists;

pub use lists::TimePoints;

/// Embedded dual-index spatio-temporal store.
///
/// Entities move between two states: bare (just a node) and capable
/// (Continuum label plus a footprint in both indexes). Both transitions
/// are atomic with respect to readers.
pub struct ContinuumStore {
    graph: Arc<GraphStore>,
    spatial: SpatialIndex,
    temporal: TemporalIndex,
    config: Config,
    closed: AtomicBool,
}

impl ContinuumStore {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let graph = Arc::new(GraphStore::new());
        Self {
            spatial: SpatialIndex::new(Arc::clone(&graph)),
            temporal: TemporalIndex::new(Arc::clone(&graph)),
            graph,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// The spatial index service, for region-only queries.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// The temporal index service, for range-only queries.
    pub fn temporal_index(&self) -> &TemporalIndex {
        &self.temporal
    }

    /// Create a bare entity node with no capability.
    pub fn create_entity(&self) -> Result<EntityId> {
        self.ensure_open()?;
        let mut tx = self.graph.begin();
        let id = tx.create_node(&[]);
        tx.commit();
        Ok(id)
    }

    /// Make an entity Continuum-capable: location plus time reference, in
    /// one transaction.
    ///
    /// `start == end` attaches a single-instant event; otherwise both
    /// interval endpoints are indexed. Validation runs before any write, so
    /// a rejected attach leaves both indexes untouched; a failure mid-way
    /// rolls the whole transaction back.
    pub fn attach_capability(
        &self,
        entity: EntityId,
        lat: f64,
        lon: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EntityId> {
        self.ensure_open()?;
        if start > end {
            return Err(ContinuumError::InvalidTimeRange { start, end });
        }
        self.validate_coordinate(lat, lon)?;

        let mut tx = self.graph.begin();
        if !tx.graph().contains(entity) {
            return Err(ContinuumError::EntityNotFound(entity));
        }
        tx.add_label(entity, Label::Continuum)?;
        if start == end {
            self.temporal.attach(&mut tx, entity, TimeRole::Event, start)?;
        } else {
            self.temporal.attach(&mut tx, entity, TimeRole::Start, start)?;
            self.temporal.attach(&mut tx, entity, TimeRole::End, end)?;
        }
        self.spatial.add(&mut tx, entity, lat, lon)?;
        tx.commit();
        log::debug!("entity {entity} is now continuum-capable");
        Ok(entity)
    }

    /// Entities inside `region` during `[from, to]`: the intersection of
    /// the two index results.
    ///
    /// The spatial and temporal phases each run under their own read
    /// transaction. A concurrent attach committing between the phases may
    /// be visible to one and not the other; each phase individually
    /// observes committed state only. Accepted staleness window.
    pub fn query(
        &self,
        region: &Region,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FxHashSet<EntityId>> {
        self.ensure_open()?;
        if from > to {
            return Err(ContinuumError::InvalidTimeRange {
                start: from,
                end: to,
            });
        }
        region.validate()?;

        let in_region = self.spatial.query_within(region)?;
        let in_range = self.temporal.query_range(from, to)?;
        Ok(intersect(in_region, in_range))
    }

    /// Every entity currently passing the full capability predicate, in
    /// id order.
    pub fn list_capable_entities(&self) -> Result<Vec<EntityId>> {
        self.ensure_open()?;
        let state = self.graph.read();
        Ok(state
            .nodes_with_label(Label::Continuum)
            .filter(|&id| validate::is_continuum_capable(&state, id))
            .collect())
    }

    /// Coordinates of every capable entity, in entity id order.
    pub fn list_locations(&self) -> Result<Vec<(f64, f64)>> {
        self.ensure_open()?;
        Ok(lists::locations(&self.graph.read()))
    }

    /// Lazy iterator over the resolved instants of capable entities.
    ///
    /// Finite and restartable: collecting it twice yields the same points
    /// when no writes intervene. Each step resolves under a fresh read
    /// transaction.
    pub fn time_points(&self) -> Result<TimePoints> {
        self.ensure_open()?;
        Ok(lists::time_points(&self.graph))
    }

    /// Strip an entity's capability: marker label, spatial record, and
    /// temporal links go in one transaction. Under the default
    /// [`PruningPolicy::Eager`], calendar nodes left empty are deleted in
    /// the same transaction; under `Deferred` they stay until
    /// [`prune_vacated`](Self::prune_vacated).
    pub fn remove_capability(&self, entity: EntityId) -> Result<()> {
        self.ensure_open()?;
        let mut tx = self.graph.begin();
        if !tx.graph().contains(entity) {
            return Err(ContinuumError::EntityNotFound(entity));
        }
        tx.remove_label(entity, Label::Continuum)?;
        self.spatial.remove(&mut tx, entity)?;
        self.temporal.detach(&mut tx, entity, self.config.pruning)?;
        tx.commit();
        log::debug!("capability removed from entity {entity}");
        Ok(())
    }

    /// Delete calendar nodes vacated by deferred removals. No-op under
    /// eager pruning or when nothing is vacated.
    pub fn prune_vacated(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut tx = self.graph.begin();
        let vacant_leaves: Vec<EntityId> = {
            let g = tx.graph();
            g.nodes_with_label(Label::Day)
                .filter(|&leaf| g.out_degree(leaf) == 0)
                .collect()
        };
        let before = tx.graph().node_count();
        for leaf in vacant_leaves {
            // An earlier walk may already have pruned this leaf's subtree.
            if tx.graph().contains(leaf) {
                temporal::prune_upward(&mut tx, leaf)?;
            }
        }
        let pruned = before - tx.graph().node_count();
        tx.commit();
        if pruned > 0 {
            log::debug!("pruned {pruned} vacated calendar nodes");
        }
        Ok(pruned)
    }

    /// Mark the store closed. Every subsequent operation fails with
    /// [`ContinuumError::StoreClosed`]. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ContinuumError::StoreClosed);
        }
        Ok(())
    }

    fn validate_coordinate(&self, lat: f64, lon: f64) -> Result<()> {
        if self.config.strict_coordinates {
            validate::validate_coordinate(lat, lon)
        } else {
            validate::validate_finite(lat, lon)
        }
    }

    #[cfg(test)]
    pub(crate) fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }
}

impl Default for ContinuumStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash-set intersection, iterating the smaller side.
fn intersect(a: FxHashSet<EntityId>, b: FxHashSet<EntityId>) -> FxHashSet<EntityId> {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.into_iter().filter(|id| large.contains(id)).collect()
}
