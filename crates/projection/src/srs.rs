//! Spatial reference system objects.
//!
//! A [`SpatialRef`] is either geographic (a [`GeogCs`] alone) or projected
//! (a [`GeogCs`] plus a [`ProjectedCs`] naming a projection method and its
//! parameters). Method and parameter names follow the OGC WKT1 vocabulary
//! so that objects round-trip through [`SpatialRef::to_wkt`] and
//! [`SpatialRef::from_wkt`].

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, ProjectionResult};
use crate::wkt;

/// WKT1 projection method names.
pub mod methods {
    pub const ALBERS_CONIC_EQUAL_AREA: &str = "Albers_Conic_Equal_Area";
    pub const AZIMUTHAL_EQUIDISTANT: &str = "Azimuthal_Equidistant";
    pub const CYLINDRICAL_EQUAL_AREA: &str = "Cylindrical_Equal_Area";
    pub const GEOSTATIONARY_SATELLITE: &str = "Geostationary_Satellite";
    pub const LAMBERT_AZIMUTHAL_EQUAL_AREA: &str = "Lambert_Azimuthal_Equal_Area";
    pub const LAMBERT_CONFORMAL_CONIC_1SP: &str = "Lambert_Conformal_Conic_1SP";
    pub const LAMBERT_CONFORMAL_CONIC_2SP: &str = "Lambert_Conformal_Conic_2SP";
    pub const MERCATOR_1SP: &str = "Mercator_1SP";
    pub const MERCATOR_2SP: &str = "Mercator_2SP";
    pub const ORTHOGRAPHIC: &str = "Orthographic";
    pub const POLAR_STEREOGRAPHIC: &str = "Polar_Stereographic";
    pub const STEREOGRAPHIC: &str = "Stereographic";
    pub const TRANSVERSE_MERCATOR: &str = "Transverse_Mercator";
}

/// WKT1 projection parameter names.
pub mod params {
    pub const CENTRAL_MERIDIAN: &str = "central_meridian";
    pub const FALSE_EASTING: &str = "false_easting";
    pub const FALSE_NORTHING: &str = "false_northing";
    pub const LATITUDE_OF_CENTER: &str = "latitude_of_center";
    pub const LATITUDE_OF_ORIGIN: &str = "latitude_of_origin";
    pub const LONGITUDE_OF_CENTER: &str = "longitude_of_center";
    pub const SATELLITE_HEIGHT: &str = "satellite_height";
    pub const SCALE_FACTOR: &str = "scale_factor";
    pub const STANDARD_PARALLEL_1: &str = "standard_parallel_1";
    pub const STANDARD_PARALLEL_2: &str = "standard_parallel_2";
}

/// Name used for datums and ellipsoids that were not identified.
pub const UNKNOWN: &str = "unknown";

/// Reference ellipsoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub name: String,
    /// Semi-major axis in meters
    pub semi_major: f64,
    /// Inverse flattening; 0 denotes a sphere
    pub inv_flattening: f64,
}

impl Ellipsoid {
    pub fn new(name: impl Into<String>, semi_major: f64, inv_flattening: f64) -> Self {
        Self {
            name: name.into(),
            semi_major,
            inv_flattening,
        }
    }

    pub fn wgs84() -> Self {
        Self::new("WGS 84", 6378137.0, 298.257223563)
    }

    /// Sphere of the given radius.
    pub fn sphere(radius: f64) -> Self {
        Self::new("Sphere", radius, 0.0)
    }

    /// Build from the two semi-axes.
    pub fn from_axes(name: impl Into<String>, semi_major: f64, semi_minor: f64) -> Self {
        let inv_flattening = if (semi_major - semi_minor).abs() < 1e-9 {
            0.0
        } else {
            semi_major / (semi_major - semi_minor)
        };
        Self::new(name, semi_major, inv_flattening)
    }

    pub fn is_sphere(&self) -> bool {
        self.inv_flattening == 0.0
    }

    pub fn flattening(&self) -> f64 {
        if self.is_sphere() {
            0.0
        } else {
            1.0 / self.inv_flattening
        }
    }

    pub fn semi_minor(&self) -> f64 {
        self.semi_major * (1.0 - self.flattening())
    }

    /// First eccentricity squared.
    pub fn eccentricity_squared(&self) -> f64 {
        let f = self.flattening();
        f * (2.0 - f)
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity_squared().sqrt()
    }
}

/// Geographic coordinate system: datum, ellipsoid and prime meridian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeogCs {
    pub name: String,
    pub datum: String,
    pub ellipsoid: Ellipsoid,
    /// Prime meridian offset from Greenwich in degrees
    pub prime_meridian: f64,
}

impl GeogCs {
    pub fn new(
        name: impl Into<String>,
        datum: impl Into<String>,
        ellipsoid: Ellipsoid,
        prime_meridian: f64,
    ) -> Self {
        Self {
            name: name.into(),
            datum: datum.into(),
            ellipsoid,
            prime_meridian,
        }
    }

    pub fn wgs84() -> Self {
        Self::new("WGS 84", "WGS_1984", Ellipsoid::wgs84(), 0.0)
    }

    /// Geographic system whose datum was not identified.
    ///
    /// WGS 84 axes are used for any math, but the datum reports as unknown.
    pub fn unspecified() -> Self {
        Self::new(UNKNOWN, UNKNOWN, Ellipsoid::wgs84(), 0.0)
    }

    pub fn is_datum_known(&self) -> bool {
        !self.datum.is_empty() && !self.datum.eq_ignore_ascii_case(UNKNOWN)
    }
}

/// Linear unit of a projected system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearUnit {
    pub name: String,
    pub to_meters: f64,
}

impl LinearUnit {
    pub fn metre() -> Self {
        Self {
            name: "metre".to_string(),
            to_meters: 1.0,
        }
    }
}

/// Projection part of a projected coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCs {
    pub name: String,
    /// WKT1 projection method name
    pub method: String,
    /// Ordered (name, value) parameters
    pub parameters: Vec<(String, f64)>,
    pub linear_unit: LinearUnit,
    /// Free-form extension such as `+sweep=x`
    pub extension: Option<String>,
}

/// A geographic or projected coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRef {
    geog: GeogCs,
    projected: Option<ProjectedCs>,
}

impl SpatialRef {
    /// Geographic system.
    pub fn geographic(geog: GeogCs) -> Self {
        Self {
            geog,
            projected: None,
        }
    }

    /// Standard geodetic reference (WGS 84 longitude/latitude).
    pub fn wgs84() -> Self {
        Self::geographic(GeogCs::wgs84())
    }

    /// Projected system with metre units.
    pub fn projected(geog: GeogCs, method: &str, parameters: Vec<(String, f64)>) -> Self {
        Self {
            geog,
            projected: Some(ProjectedCs {
                name: "unnamed".to_string(),
                method: method.to_string(),
                parameters,
                linear_unit: LinearUnit::metre(),
                extension: None,
            }),
        }
    }

    pub fn is_projected(&self) -> bool {
        self.projected.is_some()
    }

    pub fn is_geographic(&self) -> bool {
        self.projected.is_none()
    }

    pub fn geog_cs(&self) -> &GeogCs {
        &self.geog
    }

    pub fn set_geog_cs(&mut self, geog: GeogCs) {
        self.geog = geog;
    }

    pub fn projected_cs(&self) -> Option<&ProjectedCs> {
        self.projected.as_ref()
    }

    pub fn projected_cs_mut(&mut self) -> Option<&mut ProjectedCs> {
        self.projected.as_mut()
    }

    /// Projection method name, `None` for geographic systems.
    pub fn method(&self) -> Option<&str> {
        self.projected.as_ref().map(|p| p.method.as_str())
    }

    /// Projection parameter by (case-insensitive) name.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.projected.as_ref().and_then(|p| {
            p.parameters
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| *v)
        })
    }

    /// Projection parameter or a default.
    pub fn parameter_or(&self, name: &str, default: f64) -> f64 {
        self.parameter(name).unwrap_or(default)
    }

    /// Set or replace a projection parameter. No-op on geographic systems.
    pub fn set_parameter(&mut self, name: &str, value: f64) {
        if let Some(p) = self.projected.as_mut() {
            match p
                .parameters
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                Some(slot) => slot.1 = value,
                None => p.parameters.push((name.to_string(), value)),
            }
        }
    }

    pub fn set_extension(&mut self, extension: impl Into<String>) {
        if let Some(p) = self.projected.as_mut() {
            p.extension = Some(extension.into());
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.projected.as_ref().and_then(|p| p.extension.as_deref())
    }

    /// Export to WKT1.
    pub fn to_wkt(&self) -> String {
        wkt::write(self)
    }

    /// Import from WKT1 (`GEOGCS[...]` or `PROJCS[...]`).
    pub fn from_wkt(text: &str) -> ProjectionResult<Self> {
        wkt::parse(text)
    }

    /// Copy with cosmetic names blanked (PROJCS, GEOGCS, DATUM, SPHEROID).
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.geog.name.clear();
        out.geog.datum.clear();
        out.geog.ellipsoid.name.clear();
        if let Some(p) = out.projected.as_mut() {
            p.name.clear();
        }
        out
    }

    /// Structural equality ignoring names and tiny numeric noise.
    pub fn is_same(&self, other: &SpatialRef) -> bool {
        let a = self.normalized();
        let b = other.normalized();

        if !close(a.geog.ellipsoid.semi_major, b.geog.ellipsoid.semi_major)
            || !close(a.geog.ellipsoid.inv_flattening, b.geog.ellipsoid.inv_flattening)
            || !close(a.geog.prime_meridian, b.geog.prime_meridian)
        {
            return false;
        }

        match (&a.projected, &b.projected) {
            (None, None) => true,
            (Some(pa), Some(pb)) => {
                if !pa.method.eq_ignore_ascii_case(&pb.method)
                    || !close(pa.linear_unit.to_meters, pb.linear_unit.to_meters)
                {
                    return false;
                }
                let same_direction = |x: &ProjectedCs, y: &ProjectedCs| {
                    x.parameters.iter().all(|(name, value)| {
                        y.parameters
                            .iter()
                            .find(|(n, _)| n.eq_ignore_ascii_case(name))
                            .map(|(_, v)| close(*value, *v))
                            .unwrap_or(*value == 0.0)
                    })
                };
                same_direction(pa, pb) && same_direction(pb, pa)
            }
            _ => false,
        }
    }

    /// Validate that required structure is present.
    pub fn validate(&self) -> ProjectionResult<()> {
        if self.geog.ellipsoid.semi_major <= 0.0 {
            return Err(ProjectionError::InvalidParameter {
                name: "semi_major".to_string(),
                value: self.geog.ellipsoid.semi_major,
            });
        }
        if let Some(p) = &self.projected {
            if p.method.is_empty() {
                return Err(ProjectionError::Incomplete(
                    "projected system without method".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-10 * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm31() -> SpatialRef {
        SpatialRef::projected(
            GeogCs::wgs84(),
            methods::TRANSVERSE_MERCATOR,
            vec![
                (params::LATITUDE_OF_ORIGIN.to_string(), 0.0),
                (params::CENTRAL_MERIDIAN.to_string(), 3.0),
                (params::SCALE_FACTOR.to_string(), 0.9996),
                (params::FALSE_EASTING.to_string(), 500000.0),
                (params::FALSE_NORTHING.to_string(), 0.0),
            ],
        )
    }

    #[test]
    fn test_ellipsoid_from_axes() {
        let e = Ellipsoid::from_axes("x", 6378137.0, 6356752.314245);
        assert!((e.inv_flattening - 298.257223563).abs() < 1e-3);
        assert!(Ellipsoid::from_axes("s", 6371000.0, 6371000.0).is_sphere());
    }

    #[test]
    fn test_is_same_ignores_names() {
        let a = utm31();
        let mut b = utm31();
        b.set_geog_cs(GeogCs::new(
            "Other name",
            "D_WGS_1984",
            Ellipsoid::new("WGS84", 6378137.0, 298.257223563),
            0.0,
        ));
        assert!(a.is_same(&b));

        b.set_parameter(params::CENTRAL_MERIDIAN, 9.0);
        assert!(!a.is_same(&b));
    }

    #[test]
    fn test_geographic_vs_projected() {
        assert!(!SpatialRef::wgs84().is_same(&utm31()));
        assert!(SpatialRef::wgs84().is_geographic());
        assert_eq!(utm31().method(), Some(methods::TRANSVERSE_MERCATOR));
    }

    #[test]
    fn test_unspecified_datum() {
        assert!(!GeogCs::unspecified().is_datum_known());
        assert!(GeogCs::wgs84().is_datum_known());
    }
}
