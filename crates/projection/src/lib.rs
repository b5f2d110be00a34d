//! Coordinate reference systems and map projections.
//!
//! Provides a WKT-serializable spatial reference model and the forward and
//! inverse math for the projections that CF grid mappings commonly carry.

pub mod error;
pub mod geographic;
pub mod geostationary;
pub mod lambert;
pub mod mercator;
pub mod polar;
pub mod srs;
pub mod transform;
pub mod transverse_mercator;
mod wkt;

pub use error::{ProjectionError, ProjectionResult};
pub use geostationary::Geostationary;
pub use lambert::LambertConformal;
pub use srs::{Ellipsoid, GeogCs, LinearUnit, ProjectedCs, SpatialRef};
pub use transform::{CoordinateTransform, Projector};
