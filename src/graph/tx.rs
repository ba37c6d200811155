//! The unit of work: a write transaction with an undo log.
//!
//! A `Transaction` holds the graph's write guard for its whole lifetime, so
//! conflicting writers are serialized by the host lock and readers never see
//! staged state. Every mutation records its inverse; `commit` consumes the
//! transaction, while dropping it uncommitted replays the inverses in
//! reverse order. The orchestrator opens one transaction per public write
//! operation and passes it by reference into both index mutators — neither
//! index ever manages its own transaction boundary.

use super::{EntityId, GraphState, Label, Link, LinkType, NodeRecord, PropValue};
use crate::error::{ContinuumError, Result};
use crate::index::spatial::IndexedPoint;
use parking_lot::RwLockWriteGuard;

pub struct Transaction<'g> {
    state: RwLockWriteGuard<'g, GraphState>,
    undo: Vec<UndoOp>,
    committed: bool,
}

enum UndoOp {
    CreateNode(EntityId),
    AddLabel(EntityId, Label),
    RemoveLabel(EntityId, Label),
    SetProp(EntityId, &'static str, Option<PropValue>),
    RemoveProp(EntityId, &'static str, PropValue),
    CreateLink(EntityId, LinkType, EntityId),
    RemoveLink(EntityId, LinkType, EntityId),
    DeleteNode(EntityId, NodeRecord),
    SpatialInsert(IndexedPoint),
    SpatialRemove(IndexedPoint),
}

impl<'g> Transaction<'g> {
    pub(super) fn new(state: RwLockWriteGuard<'g, GraphState>) -> Self {
        Self {
            state,
            undo: Vec::new(),
            committed: false,
        }
    }

    /// Read view of the graph, including this transaction's staged writes.
    pub fn graph(&self) -> &GraphState {
        &self.state
    }

    pub fn create_node(&mut self, labels: &[Label]) -> EntityId {
        let id = self.state.alloc_id();
        let mut record = NodeRecord::default();
        record.labels.extend_from_slice(labels);
        self.state.nodes.insert(id, record);
        for &label in labels {
            self.state.by_label.entry(label).or_default().insert(id);
        }
        self.undo.push(UndoOp::CreateNode(id));
        id
    }

    pub fn add_label(&mut self, id: EntityId, label: Label) -> Result<()> {
        let record = self
            .state
            .nodes
            .get_mut(&id)
            .ok_or(ContinuumError::EntityNotFound(id))?;
        if record.labels.contains(&label) {
            return Ok(());
        }
        record.labels.push(label);
        self.state.by_label.entry(label).or_default().insert(id);
        self.undo.push(UndoOp::AddLabel(id, label));
        Ok(())
    }

    pub fn remove_label(&mut self, id: EntityId, label: Label) -> Result<()> {
        let record = self
            .state
            .nodes
            .get_mut(&id)
            .ok_or(ContinuumError::EntityNotFound(id))?;
        if let Some(pos) = record.labels.iter().position(|&l| l == label) {
            record.labels.remove(pos);
            if let Some(set) = self.state.by_label.get_mut(&label) {
                set.remove(&id);
            }
            self.undo.push(UndoOp::RemoveLabel(id, label));
        }
        Ok(())
    }

    pub fn set_prop(&mut self, id: EntityId, key: &'static str, value: PropValue) -> Result<()> {
        let record = self
            .state
            .nodes
            .get_mut(&id)
            .ok_or(ContinuumError::EntityNotFound(id))?;
        let old = record.props.insert(key, value);
        self.undo.push(UndoOp::SetProp(id, key, old));
        Ok(())
    }

    pub fn remove_prop(&mut self, id: EntityId, key: &'static str) -> Result<()> {
        let record = self
            .state
            .nodes
            .get_mut(&id)
            .ok_or(ContinuumError::EntityNotFound(id))?;
        if let Some(old) = record.props.remove(key) {
            self.undo.push(UndoOp::RemoveProp(id, key, old));
        }
        Ok(())
    }

    /// Create a typed directed link. A no-op if the identical link already
    /// exists, so link lists never hold duplicates.
    pub fn create_link(&mut self, from: EntityId, ty: LinkType, to: EntityId) -> Result<()> {
        if !self.state.nodes.contains_key(&from) {
            return Err(ContinuumError::EntityNotFound(from));
        }
        if !self.state.nodes.contains_key(&to) {
            return Err(ContinuumError::EntityNotFound(to));
        }
        let link = Link { ty, other: to };
        if let Some(record) = self.state.nodes.get(&from)
            && record.out.contains(&link)
        {
            return Ok(());
        }
        if let Some(record) = self.state.nodes.get_mut(&from) {
            record.out.push(link);
        }
        if let Some(record) = self.state.nodes.get_mut(&to) {
            record.inc.push(Link { ty, other: from });
        }
        self.undo.push(UndoOp::CreateLink(from, ty, to));
        Ok(())
    }

    /// Remove a link if present. Returns whether anything was removed.
    pub fn remove_link(&mut self, from: EntityId, ty: LinkType, to: EntityId) -> Result<bool> {
        let removed = detach_link(&mut self.state, from, ty, to);
        if removed {
            self.undo.push(UndoOp::RemoveLink(from, ty, to));
        }
        Ok(removed)
    }

    /// Delete a node and every link touching it.
    pub fn delete_node(&mut self, id: EntityId) -> Result<()> {
        let (outs, incs) = {
            let record = self
                .state
                .nodes
                .get(&id)
                .ok_or(ContinuumError::EntityNotFound(id))?;
            (record.out.to_vec(), record.inc.to_vec())
        };
        for link in outs {
            self.remove_link(id, link.ty, link.other)?;
        }
        for link in incs {
            self.remove_link(link.other, link.ty, id)?;
        }
        let Some(record) = self.state.nodes.remove(&id) else {
            return Err(ContinuumError::EntityNotFound(id));
        };
        for &label in &record.labels {
            if let Some(set) = self.state.by_label.get_mut(&label) {
                set.remove(&id);
            }
        }
        self.undo.push(UndoOp::DeleteNode(id, record));
        Ok(())
    }

    /// Stage a point into the R-tree arena.
    pub fn spatial_insert(&mut self, point: IndexedPoint) {
        self.state.spatial.insert(point.clone());
        self.undo.push(UndoOp::SpatialInsert(point));
    }

    /// Remove a point from the R-tree arena. Returns whether it was present.
    pub fn spatial_remove(&mut self, point: &IndexedPoint) -> bool {
        if let Some(removed) = self.state.spatial.remove(point) {
            self.undo.push(UndoOp::SpatialRemove(removed));
            true
        } else {
            false
        }
    }

    /// Make every staged mutation durable and visible to readers.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.undo.is_empty() {
            log::debug!("rolling back {} staged mutations", self.undo.len());
        }
        while let Some(op) = self.undo.pop() {
            revert(&mut self.state, op);
        }
    }
}

fn detach_link(state: &mut GraphState, from: EntityId, ty: LinkType, to: EntityId) -> bool {
    let link = Link { ty, other: to };
    let Some(record) = state.nodes.get_mut(&from) else {
        return false;
    };
    let Some(pos) = record.out.iter().position(|l| *l == link) else {
        return false;
    };
    record.out.remove(pos);
    if let Some(record) = state.nodes.get_mut(&to) {
        let back = Link { ty, other: from };
        if let Some(pos) = record.inc.iter().position(|l| *l == back) {
            record.inc.remove(pos);
        }
    }
    true
}

fn attach_link(state: &mut GraphState, from: EntityId, ty: LinkType, to: EntityId) {
    if let Some(record) = state.nodes.get_mut(&from) {
        record.out.push(Link { ty, other: to });
    }
    if let Some(record) = state.nodes.get_mut(&to) {
        record.inc.push(Link { ty, other: from });
    }
}

fn revert(state: &mut GraphState, op: UndoOp) {
    match op {
        UndoOp::CreateNode(id) => {
            if let Some(record) = state.nodes.remove(&id) {
                for &label in &record.labels {
                    if let Some(set) = state.by_label.get_mut(&label) {
                        set.remove(&id);
                    }
                }
            }
        }
        UndoOp::AddLabel(id, label) => {
            if let Some(record) = state.nodes.get_mut(&id) {
                record.labels.retain(|l| *l != label);
            }
            if let Some(set) = state.by_label.get_mut(&label) {
                set.remove(&id);
            }
        }
        UndoOp::RemoveLabel(id, label) => {
            if let Some(record) = state.nodes.get_mut(&id) {
                record.labels.push(label);
            }
            state.by_label.entry(label).or_default().insert(id);
        }
        UndoOp::SetProp(id, key, old) => {
            if let Some(record) = state.nodes.get_mut(&id) {
                match old {
                    Some(value) => {
                        record.props.insert(key, value);
                    }
                    None => {
                        record.props.remove(key);
                    }
                }
            }
        }
        UndoOp::RemoveProp(id, key, value) => {
            if let Some(record) = state.nodes.get_mut(&id) {
                record.props.insert(key, value);
            }
        }
        UndoOp::CreateLink(from, ty, to) => {
            detach_link(state, from, ty, to);
        }
        UndoOp::RemoveLink(from, ty, to) => {
            attach_link(state, from, ty, to);
        }
        UndoOp::DeleteNode(id, record) => {
            for &label in &record.labels {
                state.by_label.entry(label).or_default().insert(id);
            }
            state.nodes.insert(id, record);
        }
        UndoOp::SpatialInsert(point) => {
            state.spatial.remove(&point);
        }
        UndoOp::SpatialRemove(point) => {
            state.spatial.insert(point);
        }
    }
}
