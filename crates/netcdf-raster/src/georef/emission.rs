//! Write-side georeferencing: grid-mapping variable, coordinate variables
//! and vendor tags.

use projection::{CoordinateTransform, SpatialRef};
use tracing::{debug, info};

use crate::access::{Attachment, ContainerState, Mode};
use crate::config::{CoordType, CreateOptions};
use crate::diagnostics::DiagnosticDomain;
use crate::error::{NetCdfError, NetCdfResult};
use crate::geotransform::GeoTransform;
use crate::store::{ArrayData, AttrOwner, NcType, StoreError};

use super::inference::{GEO_TRANSFORM, SPATIAL_REF};
use super::mapping::{grid_mapping_attrs, is_convention_projection};

/// Name of the grid-mapping variable of geographic rasters.
pub const GEOGRAPHIC_GRID_MAPPING: &str = "crs";

/// Per-pixel longitude/latitude rasters supplied with a copy source.
pub trait GeolocationArrays {
    /// Width and height of the geolocation rasters.
    fn size(&self) -> (usize, usize);

    fn lon_row(&self, row: usize) -> NetCdfResult<Vec<f64>>;

    fn lat_row(&self, row: usize) -> NetCdfResult<Vec<f64>>;
}

/// Spatial dimensions of the raster being written.
#[derive(Debug, Clone, Copy)]
pub struct EmitGrid {
    pub x_dim: usize,
    pub y_dim: usize,
    pub width: usize,
    pub height: usize,
    pub bottom_up: bool,
}

impl EmitGrid {
    /// Raster row stored at `index`.
    fn raster_row(&self, index: usize) -> usize {
        if self.bottom_up {
            self.height - 1 - index
        } else {
            index
        }
    }
}

/// CF `units` for projected coordinates in the system's linear unit.
fn projected_units(srs: &SpatialRef) -> String {
    let Some(unit) = srs.projected_cs().map(|p| &p.linear_unit) else {
        return "m".to_string();
    };
    if (unit.to_meters - 1.0).abs() < 1e-10 {
        "m".to_string()
    } else if (unit.to_meters - 0.3048006096012192).abs() < 1e-12 {
        "US_survey_foot".to_string()
    } else if (unit.to_meters - 0.3048).abs() < 1e-12 {
        "ft".to_string()
    } else if (unit.to_meters - 1000.0).abs() < 1e-10 {
        "km".to_string()
    } else {
        unit.name.clone()
    }
}

fn coord_nc_type(coord_type: CoordType) -> NcType {
    match coord_type {
        CoordType::Float => NcType::Float,
        CoordType::Double => NcType::Double,
    }
}

#[derive(Debug, Clone, Copy)]
struct LonLatVars {
    lon: usize,
    lat: usize,
}

struct CoordVar<'a> {
    name: &'a str,
    dims: Vec<usize>,
    standard_name: &'a str,
    long_name: &'a str,
    units: &'a str,
}

fn def_coord_var(
    state: &mut ContainerState,
    var: &CoordVar<'_>,
    nc_type: NcType,
) -> NetCdfResult<usize> {
    let id = state.store.def_var(var.name, nc_type, &var.dims)?;
    let owner = AttrOwner::Var(id);
    state
        .store
        .put_attr(owner, "standard_name", var.standard_name.into())?;
    state.store.put_attr(owner, "long_name", var.long_name.into())?;
    state.store.put_attr(owner, "units", var.units.into())?;
    Ok(id)
}

/// Rename a spatial dimension, keeping its name when the store cannot.
fn rename_or_keep(state: &mut ContainerState, dim: usize, name: &str) -> NetCdfResult<String> {
    match state.store.rename_dim(dim, name) {
        Ok(()) => Ok(name.to_string()),
        Err(StoreError::Unsupported(reason)) => {
            let kept = state.store.dimension(dim)?.name;
            state.diagnostics.warn(
                DiagnosticDomain::Emission,
                format!("Keeping dimension {} ({})", kept, reason),
            );
            Ok(kept)
        }
        Err(e) => Err(e.into()),
    }
}

/// Emit georeferencing for a raster and record the band attachment.
///
/// Leaves the container in data mode.
pub fn emit(
    state: &mut ContainerState,
    srs: &SpatialRef,
    transform: &GeoTransform,
    grid: &EmitGrid,
    options: &CreateOptions,
    geolocation: Option<&dyn GeolocationArrays>,
) -> NetCdfResult<Attachment> {
    if transform.is_rotated() {
        return Err(NetCdfError::Unsupported(
            "rotated geotransforms cannot be written".to_string(),
        ));
    }
    state.ensure_mode(Mode::Define)?;

    let coord_type = coord_nc_type(options.coord_type);
    let vendor_needed = !is_convention_projection(srs) || geolocation.is_some();
    let write_vendor = options.write_vendor_tags.resolve(vendor_needed);

    // Grid-mapping variable
    let (cf_name, gm_attrs) = grid_mapping_attrs(srs);
    let write_gm = srs.is_projected() || srs.geog_cs().is_datum_known() || write_vendor;
    let gm_name = if srs.is_projected() {
        cf_name
    } else {
        GEOGRAPHIC_GRID_MAPPING.to_string()
    };
    if write_gm {
        let gm = state.store.def_var(&gm_name, NcType::Char, &[])?;
        let owner = AttrOwner::Var(gm);
        for (name, value) in gm_attrs {
            state.store.put_attr(owner, &name, value)?;
        }
        if write_vendor {
            state.store.put_attr(owner, SPATIAL_REF, srs.to_wkt().into())?;
            state
                .store
                .put_attr(owner, GEO_TRANSFORM, transform.to_vendor_string().into())?;
        }
    }

    // Dimension coordinate variables
    let (x_var, y_var) = if srs.is_projected() {
        let units = projected_units(srs);
        let x = CoordVar {
            name: "x",
            dims: vec![grid.x_dim],
            standard_name: "projection_x_coordinate",
            long_name: "x coordinate of projection",
            units: &units,
        };
        let y = CoordVar {
            name: "y",
            dims: vec![grid.y_dim],
            standard_name: "projection_y_coordinate",
            long_name: "y coordinate of projection",
            units: &units,
        };
        (def_coord_var(state, &x, coord_type)?, def_coord_var(state, &y, coord_type)?)
    } else {
        let lon_name = rename_or_keep(state, grid.x_dim, "lon")?;
        let lat_name = rename_or_keep(state, grid.y_dim, "lat")?;
        let lat = CoordVar {
            name: &lat_name,
            dims: vec![grid.y_dim],
            standard_name: "latitude",
            long_name: "latitude",
            units: "degrees_north",
        };
        let lon = CoordVar {
            name: &lon_name,
            dims: vec![grid.x_dim],
            standard_name: "longitude",
            long_name: "longitude",
            units: "degrees_east",
        };
        let lat_id = def_coord_var(state, &lat, coord_type)?;
        (def_coord_var(state, &lon, coord_type)?, lat_id)
    };

    // Optional 2D longitude/latitude arrays
    let lonlat_needed = !is_convention_projection(srs) || geolocation.is_some();
    let lonlat = if srs.is_projected() && options.write_lonlat.resolve(lonlat_needed) {
        let dims = vec![grid.y_dim, grid.x_dim];
        let lat = CoordVar {
            name: "lat",
            dims: dims.clone(),
            standard_name: "latitude",
            long_name: "latitude",
            units: "degrees_north",
        };
        let lon = CoordVar {
            name: "lon",
            dims,
            standard_name: "longitude",
            long_name: "longitude",
            units: "degrees_east",
        };
        let lat = def_coord_var(state, &lat, coord_type)?;
        let lon = def_coord_var(state, &lon, coord_type)?;
        Some(LonLatVars { lon, lat })
    } else {
        None
    };

    // Coordinate values
    state.ensure_mode(Mode::Data)?;
    let xs: Vec<f64> = (0..grid.width)
        .map(|col| transform.pixel_center(col, 0).0)
        .collect();
    let ys: Vec<f64> = (0..grid.height)
        .map(|index| transform.pixel_center(0, grid.raster_row(index)).1)
        .collect();
    state.store.write(
        x_var,
        &[0],
        &[grid.width],
        &ArrayData::from_f64(coord_type, &xs),
    )?;
    state.store.write(
        y_var,
        &[0],
        &[grid.height],
        &ArrayData::from_f64(coord_type, &ys),
    )?;

    let mut wrote_lonlat = false;
    if let Some(vars) = lonlat {
        wrote_lonlat = match geolocation {
            Some(source) => write_resampled(state, grid, coord_type, source, vars)?,
            None => write_projected(state, grid, coord_type, srs, transform, vars)?,
        };
    }

    let attachment = Attachment {
        grid_mapping: write_gm.then_some(gm_name),
        coordinates: wrote_lonlat.then(|| "lon lat".to_string()),
    };
    info!(
        grid_mapping = ?attachment.grid_mapping,
        projected = srs.is_projected(),
        vendor_tags = write_vendor,
        lonlat = wrote_lonlat,
        "Emitted georeferencing"
    );
    state.attachment = Some(attachment.clone());
    Ok(attachment)
}

/// Inverse-project pixel centres row by row.
fn write_projected(
    state: &mut ContainerState,
    grid: &EmitGrid,
    coord_type: NcType,
    srs: &SpatialRef,
    transform: &GeoTransform,
    vars: LonLatVars,
) -> NetCdfResult<bool> {
    let ct = match CoordinateTransform::new(srs) {
        Ok(ct) => ct,
        Err(e) => {
            state.diagnostics.warn(
                DiagnosticDomain::Emission,
                format!("Cannot compute longitude/latitude arrays: {}", e),
            );
            return Ok(false);
        }
    };

    for index in 0..grid.height {
        let row = grid.raster_row(index);
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = (0..grid.width)
            .map(|col| transform.pixel_center(col, row))
            .unzip();
        ct.to_geographic(&mut xs, &mut ys);
        write_lonlat_row(state, grid, coord_type, index, vars, &xs, &ys)?;
    }
    debug!(rows = grid.height, "Wrote projected longitude/latitude arrays");
    Ok(true)
}

/// Nearest-neighbour resample of supplied geolocation rasters.
fn write_resampled(
    state: &mut ContainerState,
    grid: &EmitGrid,
    coord_type: NcType,
    source: &dyn GeolocationArrays,
    vars: LonLatVars,
) -> NetCdfResult<bool> {
    let (src_w, src_h) = source.size();
    if src_w == 0 || src_h == 0 {
        state.diagnostics.warn(
            DiagnosticDomain::Emission,
            "Empty geolocation arrays, longitude/latitude not written",
        );
        return Ok(false);
    }
    let columns: Vec<usize> = (0..grid.width).map(|c| c * src_w / grid.width).collect();

    for index in 0..grid.height {
        let src_row = grid.raster_row(index) * src_h / grid.height;
        let lon_row = source.lon_row(src_row)?;
        let lat_row = source.lat_row(src_row)?;
        let pick = |row: &[f64]| -> Vec<f64> {
            columns
                .iter()
                .map(|&c| row.get(c).copied().unwrap_or(f64::NAN))
                .collect()
        };
        let (lons, lats) = (pick(&lon_row), pick(&lat_row));
        write_lonlat_row(state, grid, coord_type, index, vars, &lons, &lats)?;
    }
    debug!(rows = grid.height, "Resampled geolocation arrays");
    Ok(true)
}

fn write_lonlat_row(
    state: &mut ContainerState,
    grid: &EmitGrid,
    coord_type: NcType,
    index: usize,
    vars: LonLatVars,
    lons: &[f64],
    lats: &[f64],
) -> NetCdfResult<()> {
    let start = [index, 0];
    let count = [1, grid.width];
    state
        .store
        .write(vars.lon, &start, &count, &ArrayData::from_f64(coord_type, lons))?;
    state
        .store
        .write(vars.lat, &start, &count, &ArrayData::from_f64(coord_type, lats))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::{GeogCs, LinearUnit};

    fn lcc(unit: LinearUnit) -> SpatialRef {
        let mut srs = SpatialRef::projected(
            GeogCs::wgs84(),
            "Lambert_Conformal_Conic_2SP",
            vec![("standard_parallel_1".to_string(), 33.0)],
        );
        if let Some(p) = srs.projected_cs_mut() {
            p.linear_unit = unit;
        }
        srs
    }

    #[test]
    fn test_projected_units() {
        assert_eq!(projected_units(&lcc(LinearUnit::metre())), "m");
        let survey = LinearUnit {
            name: "US survey foot".to_string(),
            to_meters: 0.3048006096012192,
        };
        assert_eq!(projected_units(&lcc(survey)), "US_survey_foot");
        let foot = LinearUnit {
            name: "foot".to_string(),
            to_meters: 0.3048,
        };
        assert_eq!(projected_units(&lcc(foot)), "ft");
        let chain = LinearUnit {
            name: "chain".to_string(),
            to_meters: 20.1168,
        };
        assert_eq!(projected_units(&lcc(chain)), "chain");
        assert_eq!(projected_units(&SpatialRef::wgs84()), "m");
    }
}
