//! In-memory transactional property graph — the host storage collaborator.
//!
//! The graph holds everything both indexes operate on: entity nodes, the
//! calendar hierarchy, typed directed links, properties, label scans, and
//! the R-tree arena for spatial membership. All of it lives behind a single
//! `parking_lot::RwLock`, so a committed [`Transaction`] exposes both index
//! structures to readers at once, or not at all.
//!
//! Readers take short-lived read guards and observe only committed state.
//! Writers obtain a [`Transaction`], which holds the write guard for its
//! lifetime and rolls every staged mutation back if dropped uncommitted.

use crate::index::spatial::IndexedPoint;
use parking_lot::{RwLock, RwLockReadGuard};
use rstar::RTree;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

mod tx;

pub use tx::Transaction;

/// Opaque identity of a node in the host store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node labels. `Continuum` is the capability marker; the rest tag the
/// internal index structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Continuum,
    CalendarRoot,
    Year,
    Month,
    Day,
    SpatialRoot,
}

/// Typed directed links between nodes.
///
/// `Child` forms the calendar hierarchy, `Start`/`End`/`Event` attach
/// entities to day leaves, and `RtreeRef` marks spatial index membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    Child,
    Start,
    End,
    Event,
    RtreeRef,
}

/// Property value stored on a node.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Float(f64),
    Int(i64),
}

impl PropValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            PropValue::Float(v) => Some(v),
            PropValue::Int(v) => Some(v as f64),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            PropValue::Int(v) => Some(v),
            PropValue::Float(_) => None,
        }
    }
}

/// Latitude property on entity nodes.
pub const PROP_LAT: &str = "lat";
/// Longitude property on entity nodes.
pub const PROP_LON: &str = "lon";
/// Numeric value on calendar nodes (year, month, or day number).
pub const PROP_VALUE: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Link {
    pub ty: LinkType,
    pub other: EntityId,
}

/// A node record: labels, properties, and link lists in both directions.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub(crate) labels: SmallVec<[Label; 2]>,
    pub(crate) props: FxHashMap<&'static str, PropValue>,
    pub(crate) out: SmallVec<[Link; 4]>,
    pub(crate) inc: SmallVec<[Link; 4]>,
}

/// Committed graph state. Obtained through [`GraphStore::read`] or a
/// [`Transaction`]; all methods here are read-only.
pub struct GraphState {
    pub(crate) nodes: FxHashMap<EntityId, NodeRecord>,
    /// Label scan index. Ordered sets keep enumeration deterministic.
    pub(crate) by_label: FxHashMap<Label, BTreeSet<EntityId>>,
    /// Spatial index arena. rstar maintains the bounding-box hierarchy.
    pub(crate) spatial: RTree<IndexedPoint>,
    next_id: u64,
    calendar_root: EntityId,
    spatial_root: EntityId,
}

impl GraphState {
    fn new() -> Self {
        let mut state = Self {
            nodes: FxHashMap::default(),
            by_label: FxHashMap::default(),
            spatial: RTree::new(),
            next_id: 0,
            calendar_root: EntityId(0),
            spatial_root: EntityId(0),
        };
        state.calendar_root = state.create_node_raw(&[Label::CalendarRoot]);
        state.spatial_root = state.create_node_raw(&[Label::SpatialRoot]);
        state
    }

    pub(crate) fn alloc_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn create_node_raw(&mut self, labels: &[Label]) -> EntityId {
        let id = self.alloc_id();
        let mut record = NodeRecord::default();
        record.labels.extend_from_slice(labels);
        self.nodes.insert(id, record);
        for &label in labels {
            self.by_label.entry(label).or_default().insert(id);
        }
        id
    }

    /// Root of the calendar hierarchy. Created at store initialization.
    pub fn calendar_root(&self) -> EntityId {
        self.calendar_root
    }

    /// Anchor node for spatial index membership links.
    pub fn spatial_root(&self) -> EntityId {
        self.spatial_root
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn node(&self, id: EntityId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn has_label(&self, id: EntityId, label: Label) -> bool {
        self.node(id).is_some_and(|r| r.labels.contains(&label))
    }

    pub fn prop(&self, id: EntityId, key: &str) -> Option<&PropValue> {
        self.node(id)?.props.get(key)
    }

    /// Targets of outgoing links of the given type.
    pub fn links_out(&self, id: EntityId, ty: LinkType) -> impl Iterator<Item = EntityId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(move |r| r.out.iter().filter(move |l| l.ty == ty).map(|l| l.other))
    }

    /// Sources of incoming links of the given type.
    pub fn links_in(&self, id: EntityId, ty: LinkType) -> impl Iterator<Item = EntityId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(move |r| r.inc.iter().filter(move |l| l.ty == ty).map(|l| l.other))
    }

    pub fn first_link_in(&self, id: EntityId, ty: LinkType) -> Option<EntityId> {
        self.links_in(id, ty).next()
    }

    pub fn has_link_in(&self, id: EntityId, ty: LinkType) -> bool {
        self.first_link_in(id, ty).is_some()
    }

    pub fn out_degree(&self, id: EntityId) -> usize {
        self.node(id).map_or(0, |r| r.out.len())
    }

    /// Scan-by-label: every node carrying the label, in id order.
    pub fn nodes_with_label(&self, label: Label) -> impl Iterator<Item = EntityId> + '_ {
        self.by_label.get(&label).into_iter().flatten().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn spatial(&self) -> &RTree<IndexedPoint> {
        &self.spatial
    }
}

/// Shared handle to the transactional graph.
///
/// The two index services and the orchestrator each hold a clone of the
/// `Arc<GraphStore>`; nothing else in the crate keeps mutable state.
pub struct GraphStore {
    state: RwLock<GraphState>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::new()),
        }
    }

    /// Open a read transaction. Observes only committed state.
    pub fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read()
    }

    /// Open a write transaction. The returned unit of work holds the write
    /// guard until committed or dropped; dropping it uncommitted rolls back
    /// every staged mutation.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self.state.write())
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
