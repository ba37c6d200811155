//! Listing surface over the committed store: capable entities' locations
//! and resolved time points.

use crate::graph::{EntityId, GraphState, GraphStore, Label, PROP_LAT, PROP_LON, PropValue};
use crate::index::temporal;
use crate::validate;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// `(lat, lon)` pairs of capable entities, in entity id order.
pub(super) fn locations(state: &GraphState) -> Vec<(f64, f64)> {
    state
        .nodes_with_label(Label::Continuum)
        .filter(|&id| validate::is_continuum_capable(state, id))
        .filter_map(|id| {
            let lat = state.prop(id, PROP_LAT).and_then(PropValue::as_f64)?;
            let lon = state.prop(id, PROP_LON).and_then(PropValue::as_f64)?;
            Some((lat, lon))
        })
        .collect()
}

pub(super) fn time_points(graph: &Arc<GraphStore>) -> TimePoints {
    let entities: Vec<EntityId> = {
        let state = graph.read();
        state
            .nodes_with_label(Label::Continuum)
            .filter(|&id| validate::is_continuum_capable(&state, id))
            .collect()
    };
    TimePoints {
        graph: Arc::clone(graph),
        entities,
        cursor: 0,
    }
}

/// Lazy iterator of resolved instants for capable entities.
///
/// The set of entities is snapshotted when the iterator is created; each
/// `next()` resolves one entity's instant under a fresh read transaction.
/// Entities whose time reference disappears mid-iteration are skipped
/// rather than surfaced as an error.
pub struct TimePoints {
    graph: Arc<GraphStore>,
    entities: Vec<EntityId>,
    cursor: usize,
}

impl Iterator for TimePoints {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        while self.cursor < self.entities.len() {
            let entity = self.entities[self.cursor];
            self.cursor += 1;
            let state = self.graph.read();
            if let Some(instant) = temporal::resolve_in(&state, entity) {
                return Some(instant);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entities.len() - self.cursor;
        (0, Some(remaining))
    }
}
