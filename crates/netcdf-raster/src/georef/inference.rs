//! CRS and geotransform recovery from a raster variable.
//!
//! Sources are consulted in a fixed order and the first to produce a value
//! wins:
//!
//! - CRS: grid-mapping attributes, the vendor `spatial_ref` string (kept
//!   verbatim when it agrees with the attributes), then a longitude-named X
//!   dimension implying the standard geodetic system.
//! - Geotransform: regular coordinate arrays, vendor corner attributes,
//!   then the vendor `GeoTransform` string.

use projection::{GeogCs, SpatialRef};
use serde::Serialize;
use tracing::debug;

use crate::attributes::{decode, numeric_attr, read_into, text_attr};
use crate::config::DriverConfig;
use crate::diagnostics::{DiagnosticDomain, Diagnostics};
use crate::error::NetCdfResult;
use crate::geotransform::GeoTransform;
use crate::metadata::MetadataMap;
use crate::store::{ArrayData, ArrayStore, AttrOwner, AttrValue, NcType};

use super::heuristics::{is_latitude, is_longitude, is_longitude_dim};
use super::mapping::{
    build_srs, geog_from_attrs, lookup_cf, AttrSource, GRID_MAPPING_NAME, LATITUDE_LONGITUDE,
};
use super::regularity::is_regular;

pub const GRID_MAPPING: &str = "grid_mapping";
pub const COORDINATES: &str = "coordinates";
pub const SPATIAL_REF: &str = "spatial_ref";
pub const GEO_TRANSFORM: &str = "GeoTransform";
pub const WRITER_TAG: &str = "GDAL";
/// Writer name recorded by this crate.
pub const WRITER_NAME: &str = "netcdf-raster";

const NODE_OFFSET: &str = "node_offset";
const NORTHERNMOST: &str = "Northernmost_Northing";
const SOUTHERNMOST: &str = "Southernmost_Northing";
const EASTERNMOST: &str = "Easternmost_Easting";
const WESTERNMOST: &str = "Westernmost_Easting";

/// Where the CRS came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsSource {
    None,
    ConventionGridMapping,
    VendorString,
    DimensionHeuristic,
}

/// Where the geotransform came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformSource {
    None,
    CoordinateArrays,
    VendorCorners,
    VendorString,
}

/// Which writer produced the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Written by a convention-compliant version of a known writer
    ConventionCompliant,
    /// Written by an older version that relied on vendor tags
    Legacy,
    Foreign,
}

/// Outcome of georeference inference.
#[derive(Debug, Clone)]
pub struct Georeference {
    pub srs: Option<SpatialRef>,
    pub transform: Option<GeoTransform>,
    pub crs_source: CrsSource,
    pub transform_source: TransformSource,
    pub provenance: Provenance,
    /// Row 0 of the stored array is the southernmost row
    pub bottom_up: bool,
    /// Entries of the `GEOLOCATION` domain
    pub geolocation: MetadataMap,
    /// Grid-mapping attributes and preserved irregular axes
    pub extra_metadata: MetadataMap,
    pub grid_mapping: Option<String>,
}

/// Raster variable and its spatial dimensions.
#[derive(Debug, Clone, Copy)]
pub struct SpatialAxes<'a> {
    pub var: usize,
    pub x_dim: &'a str,
    pub y_dim: &'a str,
    pub width: usize,
    pub height: usize,
}

/// Writer version from a `GDAL` tag such as `GDAL 3.4.1, released ...`.
fn writer_version(tag: &str) -> Option<(u32, u32)> {
    let rest = tag.trim();
    let rest = rest.strip_prefix(WRITER_TAG).unwrap_or(rest).trim_start();
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// Classify the writer of a container.
pub fn detect_provenance(
    store: &dyn ArrayStore,
    grid_mapping: Option<usize>,
    config: &DriverConfig,
) -> Provenance {
    if let Some(tag) = text_attr(store, AttrOwner::Global, WRITER_TAG) {
        if tag.trim_start().starts_with(WRITER_NAME) {
            return Provenance::ConventionCompliant;
        }
        if writer_version(&tag).is_some_and(|v| v >= config.convention_min_version) {
            return Provenance::ConventionCompliant;
        }
    }
    let has_vendor_pair = grid_mapping.is_some_and(|gm| {
        let owner = AttrOwner::Var(gm);
        text_attr(store, owner, SPATIAL_REF).is_some()
            && text_attr(store, owner, GEO_TRANSFORM).is_some()
    });
    if has_vendor_pair {
        Provenance::Legacy
    } else {
        Provenance::Foreign
    }
}

struct VarAttrs<'a> {
    store: &'a dyn ArrayStore,
    owner: AttrOwner,
}

impl AttrSource for VarAttrs<'_> {
    fn attr(&self, name: &str) -> Option<AttrValue> {
        self.store.get_attr(self.owner, name).ok().flatten()
    }
}

/// Attribute of the grid-mapping variable, falling back to globals.
fn vendor_attr<T>(
    store: &dyn ArrayStore,
    grid_mapping: Option<usize>,
    read: impl Fn(AttrOwner) -> Option<T>,
) -> Option<T> {
    grid_mapping
        .and_then(|gm| read(AttrOwner::Var(gm)))
        .or_else(|| read(AttrOwner::Global))
}

/// Values of a 1D coordinate variable for dimension `dim` of length `len`.
fn coordinate_values(store: &dyn ArrayStore, dim: &str, len: usize) -> Option<(usize, Vec<f64>)> {
    let dim_id = store.dim_id(dim)?;
    let var = store.var_id(dim)?;
    let info = store.variable(var).ok()?;
    if info.dims != [dim_id] || !info.nc_type.is_numeric() {
        return None;
    }
    let data = store.read(var, &[0], &[len], NcType::Double).ok()?;
    match data {
        ArrayData::Double(values) => Some((var, values)),
        other => other.to_f64_vec().map(|v| (var, v)),
    }
}

fn preserve_axis(metadata: &mut MetadataMap, dim: &str, values: &[f64]) {
    let text = decode(&AttrValue::doubles(values.to_vec())).text;
    metadata.set(format!("{}#values", dim), text);
}

/// Recover CRS, geotransform and geolocation for a raster variable.
///
/// The store must be in data mode.
pub fn infer(
    store: &dyn ArrayStore,
    axes: SpatialAxes<'_>,
    config: &DriverConfig,
    diagnostics: &mut Diagnostics,
) -> NetCdfResult<Georeference> {
    let var_owner = AttrOwner::Var(axes.var);
    let mut extra_metadata = MetadataMap::new();

    // Grid-mapping variable
    let grid_mapping_name = text_attr(store, var_owner, GRID_MAPPING);
    let grid_mapping = match grid_mapping_name.as_deref() {
        Some(name) => match store.var_id(name.trim()) {
            Some(gm) => {
                read_into(store, AttrOwner::Var(gm), name.trim(), &mut extra_metadata)?;
                Some(gm)
            }
            None => {
                diagnostics.warn(
                    DiagnosticDomain::Georeference,
                    format!("grid_mapping variable {} not found", name),
                );
                None
            }
        },
        None => None,
    };

    // Provenance and default orientation
    let provenance = detect_provenance(store, grid_mapping, config);
    let mut bottom_up = config
        .bottom_up
        .unwrap_or(provenance != Provenance::Legacy);

    // Convention CRS
    let mut srs = None;
    let mut crs_source = CrsSource::None;
    let gm_attrs = grid_mapping.map(|gm| VarAttrs {
        store,
        owner: AttrOwner::Var(gm),
    });
    let geog = gm_attrs.as_ref().and_then(|a| geog_from_attrs(a));

    if let Some(attrs) = &gm_attrs {
        if let Some(cf_name) = attrs.text(GRID_MAPPING_NAME) {
            let base = geog.clone().unwrap_or_else(GeogCs::unspecified);
            if cf_name.trim().eq_ignore_ascii_case(LATITUDE_LONGITUDE) {
                srs = Some(SpatialRef::geographic(base));
                crs_source = CrsSource::ConventionGridMapping;
            } else if let Some(kind) = lookup_cf(&cf_name) {
                srs = Some(build_srs(kind, attrs, base));
                crs_source = CrsSource::ConventionGridMapping;
            } else {
                diagnostics.warn(
                    DiagnosticDomain::Georeference,
                    format!("Unsupported grid_mapping_name {}", cf_name),
                );
            }
        }
    }
    if srs.is_none() {
        if let Some(geog) = geog {
            srs = Some(SpatialRef::geographic(geog));
            crs_source = CrsSource::ConventionGridMapping;
        }
    }

    // Vendor CRS string
    if let Some(wkt) = vendor_attr(store, grid_mapping, |o| text_attr(store, o, SPATIAL_REF)) {
        match SpatialRef::from_wkt(&wkt) {
            Ok(vendor) => match &srs {
                None => {
                    srs = Some(vendor);
                    crs_source = CrsSource::VendorString;
                }
                Some(convention) if convention.is_same(&vendor) => {
                    srs = Some(vendor);
                    crs_source = CrsSource::VendorString;
                }
                Some(_) => diagnostics.warn(
                    DiagnosticDomain::Georeference,
                    "spatial_ref disagrees with grid-mapping attributes, using the attributes",
                ),
            },
            Err(e) => diagnostics.warn(
                DiagnosticDomain::Georeference,
                format!("Unreadable spatial_ref: {}", e),
            ),
        }
    }

    let degenerate = axes.width <= 1 || axes.height <= 1;
    if degenerate {
        diagnostics.warn(
            DiagnosticDomain::Georeference,
            format!(
                "{}x{} raster, coordinate arrays ignored",
                axes.width, axes.height
            ),
        );
    } else if srs.is_none() && is_longitude_dim(store, axes.x_dim) {
        srs = Some(SpatialRef::wgs84());
        crs_source = CrsSource::DimensionHeuristic;
    }

    // Geotransform from coordinate arrays
    let mut transform = None;
    let mut transform_source = TransformSource::None;
    let projected = srs.as_ref().is_some_and(SpatialRef::is_projected);

    if !degenerate {
        let x = coordinate_values(store, axes.x_dim, axes.width);
        let y = coordinate_values(store, axes.y_dim, axes.height);
        if let (Some((x_var, mut xs)), Some((_, ys))) = (x, y) {
            if config.center_longitude_180
                && is_longitude(store, x_var)
                && xs.iter().copied().fold(f64::INFINITY, f64::min) > 180.0
            {
                debug!(dim = %axes.x_dim, "Shifting longitude axis by -360");
                xs.iter_mut().for_each(|v| *v -= 360.0);
            }
            bottom_up = ys[1] > ys[0];

            let x_regular = is_regular(&xs, false, projected);
            let y_regular = is_regular(&ys, true, projected);
            if !x_regular {
                preserve_axis(&mut extra_metadata, axes.x_dim, &xs);
            }
            if !y_regular {
                preserve_axis(&mut extra_metadata, axes.y_dim, &ys);
            }

            if x_regular && y_regular {
                let node_offset = numeric_attr(store, var_owner, NODE_OFFSET)
                    .or_else(|| numeric_attr(store, AttrOwner::Global, NODE_OFFSET))
                    .and_then(|v| v.first().copied())
                    == Some(1.0);
                transform = Some(transform_from_axes(&xs, &ys, node_offset));
                transform_source = TransformSource::CoordinateArrays;
            } else {
                diagnostics.warn(
                    DiagnosticDomain::Georeference,
                    "Irregular coordinate axis, no geotransform derived",
                );
            }
        }
    }

    // Vendor corners, then the vendor string
    if transform.is_none() {
        let corner = |name: &str| {
            vendor_attr(store, grid_mapping, |o| {
                numeric_attr(store, o, name).and_then(|v| v.first().copied())
            })
        };
        if let (Some(n), Some(s), Some(e), Some(w)) = (
            corner(NORTHERNMOST),
            corner(SOUTHERNMOST),
            corner(EASTERNMOST),
            corner(WESTERNMOST),
        ) {
            transform = Some(GeoTransform::from_center_extent(
                w,
                e,
                s,
                n,
                axes.width,
                axes.height,
            ));
            transform_source = TransformSource::VendorCorners;
        } else if let Some(gt) = grid_mapping
            .and_then(|gm| text_attr(store, AttrOwner::Var(gm), GEO_TRANSFORM))
            .and_then(|t| GeoTransform::parse(&t))
        {
            transform = Some(gt);
            transform_source = TransformSource::VendorString;
        }
    }

    // Geolocation arrays
    let mut geolocation = MetadataMap::new();
    if transform.is_none() {
        if let Some(coords) = text_attr(store, var_owner, COORDINATES) {
            let named: Vec<(String, usize)> = coords
                .split_whitespace()
                .filter_map(|n| store.var_id(n).map(|id| (n.to_string(), id)))
                .collect();
            let lon = named.iter().find(|(_, id)| is_longitude(store, *id));
            let lat = named.iter().find(|(_, id)| is_latitude(store, *id));
            if let (Some((lon, _)), Some((lat, _))) = (lon, lat) {
                let path = store.path();
                geolocation.set("X_DATASET", format!("NETCDF:\"{}\":{}", path, lon));
                geolocation.set("X_BAND", "1");
                geolocation.set("Y_DATASET", format!("NETCDF:\"{}\":{}", path, lat));
                geolocation.set("Y_BAND", "1");
                geolocation.set("PIXEL_OFFSET", "0");
                geolocation.set("PIXEL_STEP", "1");
                geolocation.set("LINE_OFFSET", "0");
                geolocation.set("LINE_STEP", "1");
            }
        }
    }

    debug!(
        crs_source = ?crs_source,
        transform_source = ?transform_source,
        provenance = ?provenance,
        bottom_up,
        "Inferred georeference"
    );

    Ok(Georeference {
        srs,
        transform,
        crs_source,
        transform_source,
        provenance,
        bottom_up,
        geolocation,
        extra_metadata,
        grid_mapping: grid_mapping_name.map(|n| n.trim().to_string()),
    })
}

/// Affine fit through the axis endpoints, north up.
///
/// Values are pixel centres unless `node_offset` marks them as already
/// spanning the outer edges.
pub fn transform_from_axes(xs: &[f64], ys: &[f64], node_offset: bool) -> GeoTransform {
    let (w, h) = (xs.len(), ys.len());
    let (x_min, x_max) = min_max(xs);
    let (y_min, y_max) = min_max(ys);

    if node_offset {
        let dx = (x_max - x_min) / w as f64;
        let dy = (y_max - y_min) / h as f64;
        GeoTransform::north_up(x_min, dx, y_max, -dy)
    } else {
        GeoTransform::from_center_extent(x_min, x_max, y_min, y_max, w, h)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let first = values.first().copied().unwrap_or(0.0);
    let last = values.last().copied().unwrap_or(0.0);
    (first.min(last), first.max(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_version() {
        assert_eq!(writer_version("GDAL 1.9.0, released 2011/12/29"), Some((1, 9)));
        assert_eq!(writer_version("3.4"), Some((3, 4)));
        assert_eq!(writer_version("GDAL"), None);
    }

    #[test]
    fn test_transform_from_centres() {
        let xs = [0.5, 1.5, 2.5, 3.5];
        let ys = [0.5, 1.5, 2.5];
        let gt = transform_from_axes(&xs, &ys, false);
        assert_eq!(gt, GeoTransform::north_up(0.0, 1.0, 3.0, -1.0));
    }

    #[test]
    fn test_transform_from_corners() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 1.0, 2.0];
        let gt = transform_from_axes(&xs, &ys, true);
        assert_eq!(gt, GeoTransform::north_up(0.0, 0.75, 2.0, -2.0 / 3.0));
    }

    #[test]
    fn test_descending_y_gives_same_transform() {
        let xs = [0.5, 1.5];
        let up = transform_from_axes(&xs, &[0.5, 1.5, 2.5], false);
        let down = transform_from_axes(&xs, &[2.5, 1.5, 0.5], false);
        assert_eq!(up, down);
    }
}
