//! Polar stereographic projection (ellipsoidal, Snyder ch. 21).
//!
//! The pole is taken from the sign of the latitude of origin. When that
//! latitude is +/-90 the scale factor applies at the pole; otherwise the
//! latitude of origin is the latitude of true scale.

use crate::error::{ProjectionError, ProjectionResult};
use crate::srs::{params, Ellipsoid, SpatialRef};
use crate::transform::{adjust_lon, msfn, phi_from_ts, tsfn, Projector};

#[derive(Debug, Clone)]
pub struct PolarStereographic {
    a: f64,
    e: f64,
    lon0: f64,
    /// +1 for the north pole, -1 for the south pole
    sign: f64,
    /// rho = a * akm1 * t
    akm1: f64,
    false_easting: f64,
    false_northing: f64,
}

impl PolarStereographic {
    pub fn new(
        ellipsoid: &Ellipsoid,
        lat_origin_deg: f64,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> ProjectionResult<Self> {
        if lat_origin_deg == 0.0 || lat_origin_deg.abs() > 90.0 {
            return Err(ProjectionError::InvalidParameter {
                name: params::LATITUDE_OF_ORIGIN.into(),
                value: lat_origin_deg,
            });
        }
        let e = ellipsoid.eccentricity();
        let e2 = ellipsoid.eccentricity_squared();
        let sign = lat_origin_deg.signum();

        let akm1 = if (lat_origin_deg.abs() - 90.0).abs() < 1e-10 {
            2.0 * k0 / ((1.0 + e).powf(1.0 + e) * (1.0 - e).powf(1.0 - e)).sqrt()
        } else {
            let phi_c = sign * lat_origin_deg.to_radians();
            msfn(phi_c, e2) / tsfn(phi_c, e)
        };

        Ok(Self {
            a: ellipsoid.semi_major,
            e,
            lon0: lon0_deg.to_radians(),
            sign,
            akm1,
            false_easting,
            false_northing,
        })
    }

    pub fn from_srs(srs: &SpatialRef, ellipsoid: Ellipsoid) -> ProjectionResult<Self> {
        Self::new(
            &ellipsoid,
            srs.parameter_or(params::LATITUDE_OF_ORIGIN, 90.0),
            srs.parameter_or(params::CENTRAL_MERIDIAN, 0.0),
            srs.parameter_or(params::SCALE_FACTOR, 1.0),
            srs.parameter_or(params::FALSE_EASTING, 0.0),
            srs.parameter_or(params::FALSE_NORTHING, 0.0),
        )
    }
}

impl Projector for PolarStereographic {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let phi = self.sign * lat.to_radians();
        // Opposite pole
        if (phi + std::f64::consts::FRAC_PI_2).abs() < 1e-10 {
            return None;
        }
        let dlon = self.sign * adjust_lon(lon.to_radians() - self.lon0);
        let rho = self.a * self.akm1 * tsfn(phi, self.e);

        let x = self.sign * rho * dlon.sin() + self.false_easting;
        let y = -self.sign * rho * dlon.cos() + self.false_northing;
        Some((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let x = self.sign * (x - self.false_easting);
        let y = self.sign * (y - self.false_northing);
        let rho = x.hypot(y);
        if rho == 0.0 {
            return Some((
                self.lon0.to_degrees(),
                self.sign * std::f64::consts::FRAC_PI_2.to_degrees(),
            ));
        }

        let phi = phi_from_ts(rho / (self.a * self.akm1), self.e)?;
        let lon = adjust_lon(self.lon0 + self.sign * x.atan2(-y));
        Some((lon.to_degrees(), (self.sign * phi).to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snyder_south_pole_example() {
        // Snyder p. 317, International 1924, true scale at 71S
        let intl = Ellipsoid::new("International 1924", 6378388.0, 297.0);
        let proj = PolarStereographic::new(&intl, -71.0, -100.0, 1.0, 0.0, 0.0).unwrap();
        let (x, y) = proj.forward(150.0, -75.0).unwrap();
        assert!((x + 1540033.6).abs() < 0.1, "x = {}", x);
        assert!((y + 560526.4).abs() < 0.1, "y = {}", y);

        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon - 150.0).abs() < 1e-9, "lon = {}", lon);
        assert!((lat + 75.0).abs() < 1e-9, "lat = {}", lat);
    }

    #[test]
    fn test_north_pole_scale_factor() {
        let proj =
            PolarStereographic::new(&Ellipsoid::wgs84(), 90.0, 0.0, 0.994, 2000000.0, 2000000.0)
                .unwrap();
        let (x, y) = proj.forward(0.0, 90.0).unwrap();
        assert!((x - 2000000.0).abs() < 1e-6);
        assert!((y - 2000000.0).abs() < 1e-6);

        let (x, y) = proj.forward(20.0, 60.0).unwrap();
        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon - 20.0).abs() < 1e-9);
        assert!((lat - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_equatorial_origin_rejected() {
        assert!(PolarStereographic::new(&Ellipsoid::wgs84(), 0.0, 0.0, 1.0, 0.0, 0.0).is_err());
    }
}
