//! Shared mesh types for the optimization pipeline.
//!
//! - [`Solid`]: indexed triangle mesh handed between the codec, the repair
//!   engine and the orchestrator
//! - [`BoundingBox`]: axis-aligned extents used for scale normalization
//! - [`primitives`]: cuboid and sphere builders used by tests and callers

pub mod bounds;
pub mod primitives;
pub mod solid;

pub use bounds::BoundingBox;
pub use solid::{EdgeStats, MeshError, Solid};

/// Three-component position or vector.
pub type Point3 = [f64; 3];
