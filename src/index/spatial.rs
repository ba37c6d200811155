//! Spatial containment index over 2-D point geometries.
//!
//! Entries live in an rstar R-tree inside the host graph state: insertion
//! lets the tree maintain the minimal chain of ancestor bounding boxes, and
//! `query_within` descends only into boxes intersecting the search region
//! before exact-testing each candidate point against the region geometry.
//! Membership is additionally recorded as an `RtreeRef` link from the
//! spatial root to the entity, which is what the validator inspects.

use crate::error::{ContinuumError, Result};
use crate::graph::{
    EntityId, GraphStore, LinkType, PROP_LAT, PROP_LON, PropValue, Transaction,
};
use crate::validate;
use geo::{Area, BoundingRect, Contains, Point, Polygon, Rect, Validation};
use rstar::{AABB, Point as RstarPoint};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// 2-D point record in the R-tree arena. `x` is longitude, `y` latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub x: f64,
    pub y: f64,
    pub entity: EntityId,
}

impl RstarPoint for IndexedPoint {
    type Scalar = f64;
    const DIMENSIONS: usize = 2;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        Self {
            x: generator(0),
            y: generator(1),
            entity: EntityId(0),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        match index {
            0 => self.x,
            1 => self.y,
            _ => unreachable!(),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => unreachable!(),
        }
    }
}

/// A query region: an axis-aligned envelope or an arbitrary polygon.
///
/// Coordinates follow the `geo` convention of `(x: lon, y: lat)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    Envelope(Rect),
    Polygon(Polygon),
}

impl Region {
    /// Convenience constructor for an envelope region.
    ///
    /// # Example
    ///
    /// ```rust
    /// use continuum::Region;
    ///
    /// let envelope = Region::envelope(15.0, 56.0, 16.0, 57.0);
    /// assert!(envelope.validate().is_ok());
    /// ```
    pub fn envelope(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Region::Envelope(Rect::new((min_lon, min_lat), (max_lon, max_lat)))
    }

    /// Check the region for degeneracy: non-finite coordinates, zero area,
    /// or a self-intersecting polygon ring all fail with `InvalidGeometry`.
    pub fn validate(&self) -> Result<()> {
        match self {
            Region::Envelope(rect) => {
                let (min, max) = (rect.min(), rect.max());
                if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
                    return Err(ContinuumError::InvalidGeometry(
                        "envelope has non-finite coordinates".into(),
                    ));
                }
                if rect.width() == 0.0 || rect.height() == 0.0 {
                    return Err(ContinuumError::InvalidGeometry(
                        "envelope has zero area".into(),
                    ));
                }
                Ok(())
            }
            Region::Polygon(polygon) => {
                if polygon
                    .exterior()
                    .coords()
                    .any(|c| !c.x.is_finite() || !c.y.is_finite())
                {
                    return Err(ContinuumError::InvalidGeometry(
                        "polygon has non-finite coordinates".into(),
                    ));
                }
                if polygon.unsigned_area() == 0.0 {
                    return Err(ContinuumError::InvalidGeometry(
                        "polygon has zero area".into(),
                    ));
                }
                if !polygon.is_valid() {
                    return Err(ContinuumError::InvalidGeometry(
                        "polygon is self-intersecting or malformed".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    fn bounding(&self) -> Result<Rect> {
        match self {
            Region::Envelope(rect) => Ok(*rect),
            Region::Polygon(polygon) => polygon.bounding_rect().ok_or_else(|| {
                ContinuumError::InvalidGeometry("polygon has no bounding rectangle".into())
            }),
        }
    }

    fn contains(&self, point: &Point) -> bool {
        match self {
            Region::Envelope(rect) => rect.contains(point),
            Region::Polygon(polygon) => polygon.contains(point),
        }
    }
}

/// The spatial containment index service.
///
/// Stateless beyond its handle to the host store: mutators go through the
/// caller's transaction, reads open their own read transaction.
pub struct SpatialIndex {
    graph: Arc<GraphStore>,
}

impl SpatialIndex {
    pub(crate) fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Index an entity at the given coordinate through the caller's
    /// transaction: `lat`/`lon` properties, the R-tree record, and the
    /// membership link.
    pub fn add(
        &self,
        tx: &mut Transaction<'_>,
        entity: EntityId,
        lat: f64,
        lon: f64,
    ) -> Result<()> {
        validate::validate_finite(lat, lon)?;
        if !tx.graph().contains(entity) {
            return Err(ContinuumError::EntityNotFound(entity));
        }
        tx.set_prop(entity, PROP_LAT, PropValue::Float(lat))?;
        tx.set_prop(entity, PROP_LON, PropValue::Float(lon))?;
        let root = tx.graph().spatial_root();
        tx.create_link(root, LinkType::RtreeRef, entity)?;
        tx.spatial_insert(IndexedPoint {
            x: lon,
            y: lat,
            entity,
        });
        Ok(())
    }

    /// Every indexed entity whose point lies within the region.
    ///
    /// Descends the bounding-box hierarchy via envelope intersection, then
    /// exact-tests surviving candidates. Runs in its own read transaction;
    /// result order is unspecified.
    pub fn query_within(&self, region: &Region) -> Result<FxHashSet<EntityId>> {
        if let Err(err) = region.validate() {
            log::warn!("rejecting spatial query: {err}");
            return Err(err);
        }
        let bounds = region.bounding()?;
        let state = self.graph.read();

        let min_corner = IndexedPoint {
            x: bounds.min().x,
            y: bounds.min().y,
            entity: EntityId(0),
        };
        let max_corner = IndexedPoint {
            x: bounds.max().x,
            y: bounds.max().y,
            entity: EntityId(0),
        };
        let envelope = AABB::from_corners(min_corner, max_corner);

        let hits: FxHashSet<EntityId> = state
            .spatial()
            .locate_in_envelope_intersecting(&envelope)
            .filter(|p| region.contains(&Point::new(p.x, p.y)))
            .map(|p| p.entity)
            .collect();
        log::debug!("spatial query matched {} entities", hits.len());
        Ok(hits)
    }

    /// Remove an entity's spatial record through the caller's transaction.
    /// Returns whether a record existed.
    pub(crate) fn remove(&self, tx: &mut Transaction<'_>, entity: EntityId) -> Result<bool> {
        let coords = {
            let g = tx.graph();
            let lat = g.prop(entity, PROP_LAT).and_then(PropValue::as_f64);
            let lon = g.prop(entity, PROP_LON).and_then(PropValue::as_f64);
            lat.zip(lon)
        };
        let Some((lat, lon)) = coords else {
            return Ok(false);
        };
        tx.spatial_remove(&IndexedPoint {
            x: lon,
            y: lat,
            entity,
        });
        let root = tx.graph().spatial_root();
        tx.remove_link(root, LinkType::RtreeRef, entity)?;
        tx.remove_prop(entity, PROP_LAT)?;
        tx.remove_prop(entity, PROP_LON)?;
        Ok(true)
    }
}
