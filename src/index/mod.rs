//! The two index layers and their shared query types.
//!
//! - [`spatial`]: containment index over 2-D points (R-tree backed)
//! - [`temporal`]: hierarchical calendar index (year → month → day)
//!
//! Both services are stateless beyond a handle to the host graph store.
//! Mutations go through the orchestrator's [`Transaction`]
//! (crate::graph::Transaction); reads open their own transaction boundary.

pub mod spatial;
pub mod temporal;

pub use spatial::{Region, SpatialIndex};
pub use temporal::{TemporalIndex, TimeRole};
