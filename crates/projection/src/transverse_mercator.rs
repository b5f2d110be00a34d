//! Transverse Mercator projection (ellipsoidal series, Snyder ch. 8).
//!
//! Accurate to well under a millimetre within a few degrees of the central
//! meridian, which covers UTM-style grids.

use crate::srs::{params, Ellipsoid, SpatialRef};
use crate::transform::{adjust_lon, Projector};

#[derive(Debug, Clone)]
pub struct TransverseMercator {
    a: f64,
    e2: f64,
    ep2: f64,
    k0: f64,
    lon0: f64,
    m0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: &Ellipsoid,
        lat0_deg: f64,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let a = ellipsoid.semi_major;
        let e2 = ellipsoid.eccentricity_squared();
        let mut tm = Self {
            a,
            e2,
            ep2: e2 / (1.0 - e2),
            k0,
            lon0: lon0_deg.to_radians(),
            m0: 0.0,
            false_easting,
            false_northing,
        };
        tm.m0 = tm.meridian_distance(lat0_deg.to_radians());
        tm
    }

    pub fn from_srs(srs: &SpatialRef, ellipsoid: Ellipsoid) -> Self {
        Self::new(
            &ellipsoid,
            srs.parameter_or(params::LATITUDE_OF_ORIGIN, 0.0),
            srs.parameter_or(params::CENTRAL_MERIDIAN, 0.0),
            srs.parameter_or(params::SCALE_FACTOR, 1.0),
            srs.parameter_or(params::FALSE_EASTING, 0.0),
            srs.parameter_or(params::FALSE_NORTHING, 0.0),
        )
    }

    fn meridian_distance(&self, phi: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }
}

impl Projector for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let phi = lat.to_radians();
        let dlon = adjust_lon(lon.to_radians() - self.lon0);

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan().powi(2);
        let c = self.ep2 * cos_phi * cos_phi;
        let a = dlon * cos_phi;
        let m = self.meridian_distance(phi);

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a.powi(5) / 120.0)
            + self.false_easting;
        let y = self.k0
            * (m - self.m0
                + n * phi.tan()
                    * (a * a / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2) * a.powi(6)
                            / 720.0))
            + self.false_northing;
        Some((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let m = self.m0 + (y - self.false_northing) / self.k0;
        let mu = m / (self.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        if cos_phi1.abs() < 1e-12 {
            return Some((self.lon0.to_degrees(), phi1.to_degrees()));
        }
        let c1 = self.ep2 * cos_phi1 * cos_phi1;
        let t1 = phi1.tan().powi(2);
        let n1 = self.a / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
        let r1 = self.a * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
        let d = (x - self.false_easting) / (n1 * self.k0);

        let phi = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * self.ep2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * self.ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * self.ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        Some((adjust_lon(lon).to_degrees(), phi.to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm31() -> TransverseMercator {
        TransverseMercator::new(&Ellipsoid::wgs84(), 0.0, 3.0, 0.9996, 500000.0, 0.0)
    }

    #[test]
    fn test_central_meridian_maps_to_false_easting() {
        let (x, y) = utm31().forward(3.0, 0.0).unwrap();
        assert!((x - 500000.0).abs() < 1e-6, "x = {}", x);
        assert!(y.abs() < 1e-6, "y = {}", y);
    }

    #[test]
    fn test_snyder_worked_example() {
        // Snyder p. 269, Clarke 1866
        let clarke = Ellipsoid::new("Clarke 1866", 6378206.4, 294.9786982);
        let tm = TransverseMercator::new(&clarke, 0.0, -75.0, 0.9996, 0.0, 0.0);
        let (x, y) = tm.forward(-73.5, 40.5).unwrap();
        assert!((x - 127106.5).abs() < 0.5, "x = {}", x);
        assert!((y - 4484124.4).abs() < 0.5, "y = {}", y);
    }

    #[test]
    fn test_roundtrip() {
        let tm = utm31();
        for (lon, lat) in [(0.5, 10.0), (5.5, -33.0), (3.0, 70.0)] {
            let (x, y) = tm.forward(lon, lat).unwrap();
            let (lon2, lat2) = tm.inverse(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-7, "lon {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-7, "lat {} vs {}", lat, lat2);
        }
    }
}
