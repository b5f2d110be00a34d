//! Georeferencing: inference on read, emission on write.

pub mod emission;
pub mod heuristics;
pub mod inference;
pub mod mapping;
pub mod regularity;

pub use emission::{emit, EmitGrid, GeolocationArrays};
pub use inference::{infer, CrsSource, Georeference, Provenance, SpatialAxes, TransformSource};
