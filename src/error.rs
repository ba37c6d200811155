//! Error types for continuum operations.

use crate::graph::EntityId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for continuum operations.
pub type Result<T> = std::result::Result<T, ContinuumError>;

/// Errors surfaced by the store and its index layers.
///
/// Validation failures (`InvalidTimeRange`, `InvalidCoordinate`,
/// `InvalidGeometry`) are detected before any index mutation, so a failed
/// call never leaves partial state behind. Transactional failures are
/// surfaced after the unit of work has rolled back.
#[derive(Error, Debug)]
pub enum ContinuumError {
    /// Time range start is after its end. Raised before any write.
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Coordinate outside the valid domain or non-finite.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Degenerate or malformed query region. The query aborts with this
    /// error rather than returning an empty set.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The host store could not apply a unit of work. The transaction has
    /// been rolled back; no index is left half-updated.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Operation referenced an entity that does not exist in the host store.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// Operation attempted after the store was closed.
    #[error("store is closed")]
    StoreClosed,
}
