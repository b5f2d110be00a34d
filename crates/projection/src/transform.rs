//! Coordinate transformation between a projected system and its
//! geographic base.

use crate::error::{ProjectionError, ProjectionResult};
use crate::geographic::Geographic;
use crate::geostationary::Geostationary;
use crate::lambert::LambertConformal;
use crate::mercator::Mercator;
use crate::polar::PolarStereographic;
use crate::srs::{methods, SpatialRef};
use crate::transverse_mercator::TransverseMercator;

/// Forward/inverse projection math for one method.
///
/// Geographic coordinates are in degrees, projected coordinates in the
/// system's linear unit (metres for everything built here).
pub trait Projector: Send + Sync {
    /// (lon, lat) degrees to (x, y). `None` when the point is not representable.
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)>;

    /// (x, y) to (lon, lat) degrees. `None` when the point has no inverse.
    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Transformation from a spatial reference to its geographic base.
pub struct CoordinateTransform {
    projector: Box<dyn Projector>,
    to_meters: f64,
}

impl std::fmt::Debug for CoordinateTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateTransform")
            .field("to_meters", &self.to_meters)
            .finish_non_exhaustive()
    }
}

impl CoordinateTransform {
    /// Build the transformation for `srs`.
    pub fn new(srs: &SpatialRef) -> ProjectionResult<Self> {
        srs.validate()?;
        let ellipsoid = srs.geog_cs().ellipsoid.clone();

        let (projector, to_meters): (Box<dyn Projector>, f64) = match srs.projected_cs() {
            None => (Box::new(Geographic::new(srs.geog_cs().prime_meridian)), 1.0),
            Some(p) => {
                let projector: Box<dyn Projector> = match p.method.as_str() {
                    methods::TRANSVERSE_MERCATOR => {
                        Box::new(TransverseMercator::from_srs(srs, ellipsoid))
                    }
                    methods::MERCATOR_1SP | methods::MERCATOR_2SP => {
                        Box::new(Mercator::from_srs(srs, ellipsoid))
                    }
                    methods::LAMBERT_CONFORMAL_CONIC_1SP | methods::LAMBERT_CONFORMAL_CONIC_2SP => {
                        Box::new(LambertConformal::from_srs(srs, ellipsoid)?)
                    }
                    methods::POLAR_STEREOGRAPHIC => {
                        Box::new(PolarStereographic::from_srs(srs, ellipsoid)?)
                    }
                    methods::GEOSTATIONARY_SATELLITE => {
                        Box::new(Geostationary::from_srs(srs, ellipsoid)?)
                    }
                    other => return Err(ProjectionError::UnsupportedMethod(other.to_string())),
                };
                (projector, p.linear_unit.to_meters)
            }
        };

        Ok(Self {
            projector,
            to_meters,
        })
    }

    /// Transform projected coordinates in place to (lon, lat) degrees.
    ///
    /// Returns one success flag per point; failed points are set to NaN.
    pub fn to_geographic(&self, xs: &mut [f64], ys: &mut [f64]) -> Vec<bool> {
        xs.iter_mut()
            .zip(ys.iter_mut())
            .map(|(x, y)| {
                match self
                    .projector
                    .inverse(*x * self.to_meters, *y * self.to_meters)
                {
                    Some((lon, lat)) => {
                        *x = lon;
                        *y = lat;
                        true
                    }
                    None => {
                        *x = f64::NAN;
                        *y = f64::NAN;
                        false
                    }
                }
            })
            .collect()
    }

    /// Transform (lon, lat) degrees in place to projected coordinates.
    pub fn from_geographic(&self, xs: &mut [f64], ys: &mut [f64]) -> Vec<bool> {
        xs.iter_mut()
            .zip(ys.iter_mut())
            .map(|(x, y)| match self.projector.forward(*x, *y) {
                Some((px, py)) => {
                    *x = px / self.to_meters;
                    *y = py / self.to_meters;
                    true
                }
                None => {
                    *x = f64::NAN;
                    *y = f64::NAN;
                    false
                }
            })
            .collect()
    }
}

// =============================================================================
// Shared conformal-latitude helpers (Snyder, "Map Projections: A Working Manual")
// =============================================================================

/// Snyder eq. 15-9: t(phi).
pub(crate) fn tsfn(phi: f64, e: f64) -> f64 {
    let sinphi = phi.sin();
    let con = e * sinphi;
    (std::f64::consts::FRAC_PI_4 - 0.5 * phi).tan() / ((1.0 - con) / (1.0 + con)).powf(0.5 * e)
}

/// Snyder eq. 14-15: m(phi).
pub(crate) fn msfn(phi: f64, e2: f64) -> f64 {
    let sinphi = phi.sin();
    phi.cos() / (1.0 - e2 * sinphi * sinphi).sqrt()
}

/// Snyder eq. 7-9: latitude from t by fixed-point iteration.
pub(crate) fn phi_from_ts(ts: f64, e: f64) -> Option<f64> {
    let half_e = 0.5 * e;
    let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * ts.atan();
    for _ in 0..30 {
        let con = e * phi.sin();
        let next =
            std::f64::consts::FRAC_PI_2
                - 2.0 * (ts * ((1.0 - con) / (1.0 + con)).powf(half_e)).atan();
        if (next - phi).abs() < 1e-12 {
            return Some(next);
        }
        phi = next;
    }
    None
}

/// Wrap a longitude difference in radians to [-pi, pi].
pub(crate) fn adjust_lon(mut lon: f64) -> f64 {
    use std::f64::consts::PI;
    while lon > PI {
        lon -= 2.0 * PI;
    }
    while lon < -PI {
        lon += 2.0 * PI;
    }
    lon
}
