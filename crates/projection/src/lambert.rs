//! Lambert Conformal Conic projection.
//!
//! Maps a cone tangent or secant to the ellipsoid onto a flat plane. Used by
//! most regional weather grids (HRRR, NAM, WRF domains).
//!
//! The projection parameters include:
//! - Latitude of origin (lat0): the latitude of the false origin
//! - Central meridian (lon0)
//! - Standard parallel(s): one for the tangent (1SP) variant, two for the
//!   secant (2SP) variant
//! - Scale factor at the standard parallel (1SP only)
//! - False easting / northing

use crate::error::{ProjectionError, ProjectionResult};
use crate::srs::{methods, params, Ellipsoid, SpatialRef};
use crate::transform::{adjust_lon, msfn, phi_from_ts, tsfn, Projector};

/// Lambert Conformal Conic projection parameters.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Semi-major axis (meters)
    a: f64,
    /// First eccentricity
    e: f64,
    /// Central meridian in radians
    lon0: f64,
    /// Scale factor applied to rho
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl LambertConformal {
    /// Secant cone through two standard parallels (degrees).
    #[allow(clippy::too_many_arguments)]
    pub fn two_parallels(
        ellipsoid: &Ellipsoid,
        lat0_deg: f64,
        lon0_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> ProjectionResult<Self> {
        Self::build(
            ellipsoid,
            lat0_deg,
            lon0_deg,
            latin1_deg,
            latin2_deg,
            1.0,
            false_easting,
            false_northing,
        )
    }

    /// Tangent cone at the latitude of origin with a scale factor.
    pub fn one_parallel(
        ellipsoid: &Ellipsoid,
        lat0_deg: f64,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> ProjectionResult<Self> {
        Self::build(
            ellipsoid,
            lat0_deg,
            lon0_deg,
            lat0_deg,
            lat0_deg,
            k0,
            false_easting,
            false_northing,
        )
    }

    pub fn from_srs(srs: &SpatialRef, ellipsoid: Ellipsoid) -> ProjectionResult<Self> {
        let lat0 = srs.parameter_or(params::LATITUDE_OF_ORIGIN, 0.0);
        let lon0 = srs.parameter_or(params::CENTRAL_MERIDIAN, 0.0);
        let fe = srs.parameter_or(params::FALSE_EASTING, 0.0);
        let fn_ = srs.parameter_or(params::FALSE_NORTHING, 0.0);

        if srs.method() == Some(methods::LAMBERT_CONFORMAL_CONIC_2SP) {
            let sp1 = srs
                .parameter(params::STANDARD_PARALLEL_1)
                .ok_or_else(|| ProjectionError::Incomplete(params::STANDARD_PARALLEL_1.into()))?;
            let sp2 = srs.parameter_or(params::STANDARD_PARALLEL_2, sp1);
            Self::two_parallels(&ellipsoid, lat0, lon0, sp1, sp2, fe, fn_)
        } else {
            let k0 = srs.parameter_or(params::SCALE_FACTOR, 1.0);
            Self::one_parallel(&ellipsoid, lat0, lon0, k0, fe, fn_)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        ellipsoid: &Ellipsoid,
        lat0_deg: f64,
        lon0_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> ProjectionResult<Self> {
        let a = ellipsoid.semi_major;
        let e2 = ellipsoid.eccentricity_squared();
        let e = e2.sqrt();

        let lat0 = lat0_deg.to_radians();
        let latin1 = latin1_deg.to_radians();
        let latin2 = latin2_deg.to_radians();

        if (latin1 + latin2).abs() < 1e-10 {
            return Err(ProjectionError::InvalidParameter {
                name: params::STANDARD_PARALLEL_1.into(),
                value: latin1_deg,
            });
        }

        let m1 = msfn(latin1, e2);
        let t1 = tsfn(latin1, e);

        // Compute cone constant n
        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone (single standard parallel)
            latin1.sin()
        } else {
            // Secant cone (two standard parallels)
            let m2 = msfn(latin2, e2);
            let t2 = tsfn(latin2, e);
            (m1.ln() - m2.ln()) / (t1.ln() - t2.ln())
        };

        let f = m1 / (n * t1.powf(n));
        let rho0 = a * f * k0 * tsfn(lat0, e).powf(n);

        Ok(Self {
            a,
            e,
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            n,
            f,
            rho0,
        })
    }
}

impl Projector for LambertConformal {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let lat = lat.to_radians();
        // The pole opposite the cone apex maps to infinity.
        if (lat.abs() - std::f64::consts::FRAC_PI_2).abs() < 1e-10 && lat * self.n <= 0.0 {
            return None;
        }

        let rho = self.a * self.f * self.k0 * tsfn(lat, self.e).powf(self.n);
        let theta = self.n * adjust_lon(lon.to_radians() - self.lon0);

        let x = rho * theta.sin() + self.false_easting;
        let y = self.rho0 - rho * theta.cos() + self.false_northing;
        Some((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let x = x - self.false_easting;
        let y = self.rho0 - (y - self.false_northing);

        let sign = self.n.signum();
        let rho = sign * x.hypot(y);
        if rho == 0.0 {
            let lat = sign * std::f64::consts::FRAC_PI_2;
            return Some((self.lon0.to_degrees(), lat.to_degrees()));
        }
        let theta = (sign * x).atan2(sign * y);

        let ts = (rho / (self.a * self.k0 * self.f)).powf(1.0 / self.n);
        let lat = phi_from_ts(ts, self.e)?;
        let lon = adjust_lon(theta / self.n + self.lon0);

        Some((lon.to_degrees(), lat.to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clarke1866() -> Ellipsoid {
        Ellipsoid::new("Clarke 1866", 6378206.4, 294.9786982)
    }

    #[test]
    fn test_snyder_two_parallel_example() {
        // Snyder p. 296
        let proj =
            LambertConformal::two_parallels(&clarke1866(), 23.0, -96.0, 33.0, 45.0, 0.0, 0.0)
                .unwrap();
        let (x, y) = proj.forward(-75.0, 35.0).unwrap();
        assert!((x - 1894410.9).abs() < 0.1, "x = {}", x);
        assert!((y - 1564649.5).abs() < 0.1, "y = {}", y);

        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon + 75.0).abs() < 1e-9, "lon = {}", lon);
        assert!((lat - 35.0).abs() < 1e-9, "lat = {}", lat);
    }

    #[test]
    fn test_origin_maps_to_false_origin() {
        let proj = LambertConformal::one_parallel(
            &Ellipsoid::wgs84(),
            38.5,
            -97.5,
            1.0,
            1000.0,
            2000.0,
        )
        .unwrap();
        let (x, y) = proj.forward(-97.5, 38.5).unwrap();
        assert!((x - 1000.0).abs() < 1e-6, "x = {}", x);
        assert!((y - 2000.0).abs() < 1e-6, "y = {}", y);
    }

    #[test]
    fn test_hrrr_roundtrip() {
        // HRRR: tangent at 38.5N, LoV 97.5W, spherical earth
        let proj = LambertConformal::one_parallel(
            &Ellipsoid::sphere(6371229.0),
            38.5,
            -97.5,
            1.0,
            0.0,
            0.0,
        )
        .unwrap();

        for (lon, lat) in [(-122.719528, 21.138123), (-94.5, 39.0), (-60.9, 47.8)] {
            let (x, y) = proj.forward(lon, lat).unwrap();
            let (lon2, lat2) = proj.inverse(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-9, "lon roundtrip failed: {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-9, "lat roundtrip failed: {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_southern_cone() {
        let proj = LambertConformal::two_parallels(
            &Ellipsoid::wgs84(),
            -32.0,
            135.0,
            -28.0,
            -36.0,
            0.0,
            0.0,
        )
        .unwrap();
        let (x, y) = proj.forward(140.0, -30.0).unwrap();
        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon - 140.0).abs() < 1e-9);
        assert!((lat + 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_srs_requires_first_parallel() {
        let srs = SpatialRef::projected(
            crate::srs::GeogCs::wgs84(),
            methods::LAMBERT_CONFORMAL_CONIC_2SP,
            vec![(params::CENTRAL_MERIDIAN.to_string(), 0.0)],
        );
        assert!(matches!(
            LambertConformal::from_srs(&srs, Ellipsoid::wgs84()),
            Err(ProjectionError::Incomplete(_))
        ));
    }
}
