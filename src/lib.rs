//! # Continuum
//!
//! An embedded dual-index spatio-temporal store. Entities gain a
//! "continuum capability" — a point location plus an instant or interval
//! time reference — atomically across a spatial containment index and a
//! hierarchical calendar index, and queries of the form *"which entities
//! exist inside region R during [t0, t1]?"* intersect the two index
//! results.
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use continuum::{ContinuumStore, Region};
//!
//! # fn main() -> continuum::Result<()> {
//! let store = ContinuumStore::new();
//!
//! let entity = store.create_entity()?;
//! let start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
//! store.attach_capability(entity, 56.5, 15.5, start, end)?;
//!
//! let region = Region::envelope(15.0, 56.0, 16.0, 57.0);
//! let hits = store.query(&region, start, end)?;
//! assert!(hits.contains(&entity));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`graph`]: the host storage collaborator, an in-memory transactional
//!   property graph holding entity nodes, the calendar hierarchy, and the
//!   R-tree arena behind one lock.
//! - [`index`]: the two index services, stateless over a shared graph
//!   handle.
//! - [`store`]: the orchestrator tying attachment, combined queries, and
//!   removal together.

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod store;
pub mod validate;

pub use config::{Config, PruningPolicy};
pub use error::{ContinuumError, Result};
pub use graph::EntityId;
pub use index::spatial::{Region, SpatialIndex};
pub use index::temporal::{TemporalIndex, TimeRole};
pub use store::{ContinuumStore, TimePoints};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::config::{Config, PruningPolicy};
    pub use crate::error::{ContinuumError, Result};
    pub use crate::graph::EntityId;
    pub use crate::index::spatial::Region;
    pub use crate::index::temporal::TimeRole;
    pub use crate::store::ContinuumStore;
}
