//! Geostationary satellite projection.
//!
//! The satellite views Earth from a fixed position above the equator. Scan
//! angles are in radians from nadir; projected coordinates are scan angles
//! multiplied by the satellite height above the ellipsoid, which is the
//! convention CF `geostationary` grids and PROJ's `geos` use.
//!
//! The sweep axis selects the order of the two scan rotations: "x" for
//! GOES-R, "y" for Meteosat and Himawari.
//!
//! Reference: GOES-R Product Definition and Users' Guide (PUG) Volume 4

use crate::error::{ProjectionError, ProjectionResult};
use crate::srs::{params, Ellipsoid, SpatialRef};
use crate::transform::{adjust_lon, Projector};

/// Geostationary projection parameters.
#[derive(Debug, Clone)]
pub struct Geostationary {
    /// Satellite height above the ellipsoid (meters)
    pub perspective_point_height: f64,
    /// Semi-major axis of Earth ellipsoid (meters)
    pub req: f64,
    /// Semi-minor axis of Earth ellipsoid (meters)
    pub rpol: f64,
    /// Longitude of satellite nadir point (radians)
    pub lambda_0: f64,
    /// Sweep angle axis is x (GOES-R) rather than y
    pub sweep_x: bool,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl Geostationary {
    /// Create a new projection.
    ///
    /// # Arguments
    /// * `ellipsoid` - Earth model
    /// * `perspective_point_height` - Satellite altitude above Earth surface (meters)
    /// * `longitude_origin_deg` - Satellite longitude (degrees, negative for west)
    /// * `sweep_x` - true for x-axis sweep
    pub fn new(
        ellipsoid: &Ellipsoid,
        perspective_point_height: f64,
        longitude_origin_deg: f64,
        sweep_x: bool,
    ) -> Self {
        Self {
            perspective_point_height,
            req: ellipsoid.semi_major,
            rpol: ellipsoid.semi_minor(),
            lambda_0: longitude_origin_deg.to_radians(),
            sweep_x,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }

    /// GOES-16 (GOES-East at 75°W) on GRS80.
    pub fn goes16() -> Self {
        Self::new(
            &Ellipsoid::from_axes("GRS 1980", 6378137.0, 6356752.31414),
            35786023.0,
            -75.0,
            true,
        )
    }

    /// Build from a spatial reference. The sweep axis comes from a
    /// `+sweep=x` token in the PROJ extension; y is the default.
    pub fn from_srs(srs: &SpatialRef, ellipsoid: Ellipsoid) -> ProjectionResult<Self> {
        let height = srs
            .parameter(params::SATELLITE_HEIGHT)
            .ok_or_else(|| ProjectionError::Incomplete(params::SATELLITE_HEIGHT.into()))?;
        if height <= 0.0 {
            return Err(ProjectionError::InvalidParameter {
                name: params::SATELLITE_HEIGHT.into(),
                value: height,
            });
        }
        let sweep_x = srs
            .extension()
            .map(|ext| ext.split_whitespace().any(|tok| tok == "+sweep=x"))
            .unwrap_or(false);

        let mut proj = Self::new(
            &ellipsoid,
            height,
            srs.parameter_or(params::CENTRAL_MERIDIAN, 0.0),
            sweep_x,
        );
        proj.false_easting = srs.parameter_or(params::FALSE_EASTING, 0.0);
        proj.false_northing = srs.parameter_or(params::FALSE_NORTHING, 0.0);
        Ok(proj)
    }

    /// Distance from Earth centre to the satellite, in semi-major axes.
    fn radius_g(&self) -> f64 {
        1.0 + self.perspective_point_height / self.req
    }

    /// Convert scan angles (radians) to geographic coordinates (lon/lat degrees).
    ///
    /// Returns None if the scan angle points to space (off Earth).
    pub fn scan_to_geo(&self, x_rad: f64, y_rad: f64) -> Option<(f64, f64)> {
        let radius_g = self.radius_g();
        let ratio = self.rpol / self.req;

        // Unit view vector from the satellite
        let vx = -1.0;
        let (vy, vz) = if self.sweep_x {
            let vz = y_rad.tan();
            (x_rad.tan() * 1.0f64.hypot(vz), vz)
        } else {
            let vy = x_rad.tan();
            (vy, y_rad.tan() * 1.0f64.hypot(vy))
        };

        // Quadratic coefficients for finding distance to Earth surface
        let a = vy * vy + (vz / ratio).powi(2) + vx * vx;
        let b = 2.0 * radius_g * vx;
        let c = radius_g * radius_g - 1.0;

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None; // Scan angle points to space
        }
        let k = (-b - discriminant.sqrt()) / (2.0 * a);

        // Earth-centred coordinates of the surface point
        let sx = radius_g + k * vx;
        let sy = k * vy;
        let sz = k * vz;

        let lambda = sy.atan2(sx);
        let phi_c = (sz * lambda.cos() / sx).atan();
        let lat = (phi_c.tan() / (ratio * ratio)).atan();
        let lon = adjust_lon(lambda + self.lambda_0);

        Some((lon.to_degrees(), lat.to_degrees()))
    }

    /// Convert geographic coordinates (lon/lat degrees) to scan angles (radians).
    ///
    /// Returns None if the point is not visible from the satellite.
    pub fn geo_to_scan(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let radius_g = self.radius_g();
        let ratio = self.rpol / self.req;

        let lambda = adjust_lon(lon_deg.to_radians() - self.lambda_0);
        // Geocentric latitude (accounting for Earth's oblateness)
        let phi_c = (ratio * ratio * lat_deg.to_radians().tan()).atan();
        // Radius from Earth center to surface point, in semi-major axes
        let r = ratio / (ratio * phi_c.cos()).hypot(phi_c.sin());

        let sx = r * lambda.cos() * phi_c.cos();
        let sy = r * lambda.sin() * phi_c.cos();
        let sz = r * phi_c.sin();

        let tmp = radius_g - sx;
        // Behind the limb as seen from the satellite
        if tmp * sx - sy * sy - sz * sz / (ratio * ratio) < 0.0 {
            return None;
        }

        let (x_rad, y_rad) = if self.sweep_x {
            ((sy / sz.hypot(tmp)).atan(), (sz / tmp).atan())
        } else {
            ((sy / tmp).atan(), (sz / sy.hypot(tmp)).atan())
        };
        Some((x_rad, y_rad))
    }
}

impl Projector for Geostationary {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y) = self.geo_to_scan(lon, lat)?;
        Some((
            x * self.perspective_point_height + self.false_easting,
            y * self.perspective_point_height + self.false_northing,
        ))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.scan_to_geo(
            (x - self.false_easting) / self.perspective_point_height,
            (y - self.false_northing) / self.perspective_point_height,
        )
    }
}
