//! Mercator projection, 1SP (scale factor) and 2SP (standard parallel) variants.

use crate::srs::{methods, params, Ellipsoid, SpatialRef};
use crate::transform::{adjust_lon, msfn, phi_from_ts, tsfn, Projector};

/// Latitudes beyond this are clamped out of the forward domain.
const MAX_LATITUDE: f64 = 89.999;

#[derive(Debug, Clone)]
pub struct Mercator {
    a: f64,
    e: f64,
    lon0: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Mercator {
    pub fn new(
        ellipsoid: &Ellipsoid,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        Self {
            a: ellipsoid.semi_major,
            e: ellipsoid.eccentricity(),
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
        }
    }

    /// Scale factor implied by a standard parallel (degrees).
    pub fn scale_at_parallel(ellipsoid: &Ellipsoid, parallel_deg: f64) -> f64 {
        msfn(parallel_deg.to_radians(), ellipsoid.eccentricity_squared())
    }

    pub fn from_srs(srs: &SpatialRef, ellipsoid: Ellipsoid) -> Self {
        let k0 = if srs.method() == Some(methods::MERCATOR_2SP) {
            Self::scale_at_parallel(&ellipsoid, srs.parameter_or(params::STANDARD_PARALLEL_1, 0.0))
        } else {
            srs.parameter_or(params::SCALE_FACTOR, 1.0)
        };
        Self::new(
            &ellipsoid,
            srs.parameter_or(params::CENTRAL_MERIDIAN, 0.0),
            k0,
            srs.parameter_or(params::FALSE_EASTING, 0.0),
            srs.parameter_or(params::FALSE_NORTHING, 0.0),
        )
    }
}

impl Projector for Mercator {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if lat.abs() > MAX_LATITUDE {
            return None;
        }
        let x = self.a * self.k0 * adjust_lon(lon.to_radians() - self.lon0) + self.false_easting;
        let y = -self.a * self.k0 * tsfn(lat.to_radians(), self.e).ln() + self.false_northing;
        Some((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let ts = (-(y - self.false_northing) / (self.a * self.k0)).exp();
        let lat = phi_from_ts(ts, self.e)?;
        let lon = adjust_lon((x - self.false_easting) / (self.a * self.k0) + self.lon0);
        Some((lon.to_degrees(), lat.to_degrees()))
    }
}
