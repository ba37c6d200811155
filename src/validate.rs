//! Input and capability validation.
//!
//! Coordinate checks run before anything touches the indexes, so a rejected
//! attach never stages a write. Capability predicates inspect committed
//! graph structure and are what the store's listing surface is built on.

use crate::error::{ContinuumError, Result};
use crate::graph::{EntityId, GraphState, Label, LinkType, PROP_LAT, PROP_LON};

/// Reject non-finite coordinate components.
pub(crate) fn validate_finite(lat: f64, lon: f64) -> Result<()> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ContinuumError::InvalidCoordinate(format!(
            "non-finite coordinate ({lat}, {lon})"
        )));
    }
    Ok(())
}

/// Full coordinate domain check: finite, latitude in [-90, 90], longitude
/// in [-180, 180].
pub(crate) fn validate_coordinate(lat: f64, lon: f64) -> Result<()> {
    validate_finite(lat, lon)?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ContinuumError::InvalidCoordinate(format!(
            "latitude {lat} outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ContinuumError::InvalidCoordinate(format!(
            "longitude {lon} outside [-180, 180]"
        )));
    }
    Ok(())
}

/// Whether the entity hangs off a calendar day leaf under any time role.
pub fn has_time_reference(state: &GraphState, entity: EntityId) -> bool {
    state.has_link_in(entity, LinkType::Event)
        || state.has_link_in(entity, LinkType::Start)
        || state.has_link_in(entity, LinkType::End)
}

/// Whether the entity carries coordinates and spatial index membership.
pub fn has_location(state: &GraphState, entity: EntityId) -> bool {
    state.prop(entity, PROP_LAT).is_some()
        && state.prop(entity, PROP_LON).is_some()
        && state.has_link_in(entity, LinkType::RtreeRef)
}

/// The full capability predicate: marker label plus both index footprints.
///
/// An entity carrying the marker but missing either footprint is a
/// consistency defect, not a capable entity.
pub fn is_continuum_capable(state: &GraphState, entity: EntityId) -> bool {
    state.has_label(entity, Label::Continuum)
        && has_time_reference(state, entity)
        && has_location(state, entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, PropValue};

    #[test]
    fn test_coordinate_domain_bounds() {
        assert!(validate_coordinate(90.0, 180.0).is_ok());
        assert!(validate_coordinate(-90.0, -180.0).is_ok());
        assert!(matches!(
            validate_coordinate(90.1, 0.0),
            Err(ContinuumError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            validate_coordinate(0.0, -180.5),
            Err(ContinuumError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            validate_coordinate(f64::INFINITY, 0.0),
            Err(ContinuumError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_capability_requires_all_three_footprints() {
        let store = GraphStore::new();
        let mut tx = store.begin();
        let entity = tx.create_node(&[Label::Continuum]);
        let leaf = tx.create_node(&[Label::Day]);
        let spatial_root = tx.graph().spatial_root();
        tx.commit();

        // Marker only: not capable.
        assert!(!is_continuum_capable(&store.read(), entity));

        let mut tx = store.begin();
        tx.create_link(leaf, LinkType::Event, entity).unwrap();
        tx.commit();
        assert!(has_time_reference(&store.read(), entity));
        assert!(!is_continuum_capable(&store.read(), entity));

        let mut tx = store.begin();
        tx.set_prop(entity, PROP_LAT, PropValue::Float(56.5)).unwrap();
        tx.set_prop(entity, PROP_LON, PropValue::Float(15.5)).unwrap();
        tx.create_link(spatial_root, LinkType::RtreeRef, entity)
            .unwrap();
        tx.commit();

        let state = store.read();
        assert!(has_location(&state, entity));
        assert!(is_continuum_capable(&state, entity));
    }

    #[test]
    fn test_unlabeled_entity_with_footprints_is_not_capable() {
        let store = GraphStore::new();
        let mut tx = store.begin();
        let entity = tx.create_node(&[]);
        let leaf = tx.create_node(&[Label::Day]);
        let spatial_root = tx.graph().spatial_root();
        tx.create_link(leaf, LinkType::Event, entity).unwrap();
        tx.set_prop(entity, PROP_LAT, PropValue::Float(1.0)).unwrap();
        tx.set_prop(entity, PROP_LON, PropValue::Float(2.0)).unwrap();
        tx.create_link(spatial_root, LinkType::RtreeRef, entity)
            .unwrap();
        tx.commit();

        assert!(!is_continuum_capable(&store.read(), entity));
    }
}
