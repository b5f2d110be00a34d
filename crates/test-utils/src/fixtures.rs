//! In-memory containers and rasters shared by the test suites.

use netcdf_raster::store::{ArrayData, ArrayStore, AttrOwner, AttrValue, Format, NcType};
use netcdf_raster::{GeoTransform, MemBand, MemRaster, MemoryStore};
use projection::SpatialRef;

use crate::generators::{band_pattern, regular_axis};

/// Builds a [`MemoryStore`] declaratively.
///
/// Dimensions, variables and attributes are defined in order; values are
/// queued and written after leaving define mode. Panics on any store error.
///
/// ```
/// use netcdf_raster::store::{ArrayData, ArrayStore, Format, NcType};
/// use test_utils::ContainerBuilder;
///
/// let store = ContainerBuilder::new("t.nc", Format::Nc)
///     .dim("x", 2)
///     .var("v", NcType::Int, &["x"])
///     .values("v", ArrayData::Int(vec![1, 2]))
///     .build();
/// assert_eq!(store.variables().len(), 1);
/// ```
pub struct ContainerBuilder {
    store: MemoryStore,
    pending: Vec<(String, ArrayData)>,
}

impl ContainerBuilder {
    pub fn new(path: &str, format: Format) -> Self {
        Self {
            store: MemoryStore::create(path, format),
            pending: Vec::new(),
        }
    }

    /// Define a dimension; `len == 0` is the unlimited dimension.
    pub fn dim(mut self, name: &str, len: usize) -> Self {
        self.store.def_dim(name, len).expect("def_dim");
        self
    }

    pub fn var(mut self, name: &str, nc_type: NcType, dims: &[&str]) -> Self {
        let ids: Vec<usize> = dims
            .iter()
            .map(|d| self.store.dim_id(d).expect("dimension defined"))
            .collect();
        self.store.def_var(name, nc_type, &ids).expect("def_var");
        self
    }

    pub fn chunking(mut self, var: &str, chunks: &[usize]) -> Self {
        let id = self.store.var_id(var).expect("variable defined");
        self.store.set_chunking(id, chunks).expect("set_chunking");
        self
    }

    /// A 1D coordinate variable over the dimension of the same name.
    pub fn coord(self, name: &str, units: &str, values: Vec<f64>) -> Self {
        self.var(name, NcType::Double, &[name])
            .attr(name, "units", units)
            .values(name, ArrayData::Double(values))
    }

    pub fn attr(mut self, var: &str, name: &str, value: impl Into<AttrValue>) -> Self {
        let id = self.store.var_id(var).expect("variable defined");
        self.store
            .put_attr(AttrOwner::Var(id), name, value.into())
            .expect("put_attr");
        self
    }

    pub fn global_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.store
            .put_attr(AttrOwner::Global, name, value.into())
            .expect("put_attr");
        self
    }

    /// Queue the full contents of `var`.
    pub fn values(mut self, var: &str, data: ArrayData) -> Self {
        self.pending.push((var.to_string(), data));
        self
    }

    pub fn build(mut self) -> MemoryStore {
        self.store.enddef().expect("enddef");
        for (name, data) in self.pending {
            let id = self.store.var_id(&name).expect("variable defined");
            let info = self.store.variable(id).expect("variable");
            let mut count: Vec<usize> = info
                .dims
                .iter()
                .map(|&d| self.store.dimension(d).expect("dimension").len)
                .collect();
            let record = info
                .dims
                .first()
                .is_some_and(|&d| self.store.dimension(d).expect("dimension").unlimited);
            // Size the record dimension from the data
            if record {
                let rest: usize = count[1..].iter().product();
                count[0] = data.len() / rest.max(1);
            }
            let start = vec![0; count.len()];
            self.store.write(id, &start, &count, &data).expect("write");
        }
        self.store
    }

    pub fn boxed(self) -> Box<dyn ArrayStore> {
        Box::new(self.build())
    }
}

/// Number of time steps of [`four_d_container`].
pub const FOUR_D_TIMES: usize = 2;
/// Number of levels of [`four_d_container`].
pub const FOUR_D_LEVELS: usize = 3;

/// A `temp(time=2, level=3, lat=10, lon=10)` float container.
///
/// Latitudes ascend from 40.5 to 49.5 and longitudes from 0.5 to 9.5, so the
/// raster is stored bottom-up on a 1 degree grid with origin (0, 50). Band
/// `b` (1-based) holds [`band_pattern`]`(b - 1, 10, 10)` with row 0 at the
/// top.
pub fn four_d_container(format: Format) -> MemoryStore {
    let (w, h) = (10, 10);
    let mut temp = Vec::with_capacity(FOUR_D_TIMES * FOUR_D_LEVELS * w * h);
    for band in 0..FOUR_D_TIMES * FOUR_D_LEVELS {
        let pattern = band_pattern(band, w, h);
        for stored_row in 0..h {
            let row = h - 1 - stored_row;
            temp.extend_from_slice(&pattern[row * w..(row + 1) * w]);
        }
    }

    ContainerBuilder::new("four_d.nc", format)
        .dim("time", FOUR_D_TIMES)
        .dim("level", FOUR_D_LEVELS)
        .dim("lat", h)
        .dim("lon", w)
        .coord("time", "hours since 2000-01-01 00:00:00", vec![0.0, 6.0])
        .coord("level", "hPa", vec![1000.0, 850.0, 500.0])
        .coord("lat", "degrees_north", regular_axis(40.5, 1.0, h))
        .attr("lat", "standard_name", "latitude")
        .coord("lon", "degrees_east", regular_axis(0.5, 1.0, w))
        .attr("lon", "standard_name", "longitude")
        .var("temp", NcType::Float, &["time", "level", "lat", "lon"])
        .attr("temp", "units", "K")
        .attr("temp", "_FillValue", ArrayData::Float(vec![-9999.0]))
        .values("temp", ArrayData::Float(temp))
        .global_attr("Conventions", "CF-1.5")
        .build()
}

/// Projected `tas(y=3, x=4)` on a CF Lambert conformal conic grid.
///
/// Coordinates are 1 km apart, x from 0 m and y descending from 2000 m.
pub fn cf_lcc_container() -> MemoryStore {
    let gm = "lambert_conformal_conic";
    ContainerBuilder::new("lcc.nc", Format::Nc)
        .dim("y", 3)
        .dim("x", 4)
        .var(gm, NcType::Char, &[])
        .attr(gm, "grid_mapping_name", gm)
        .attr(gm, "standard_parallel", AttrValue::doubles(vec![25.0, 45.0]))
        .attr(gm, "longitude_of_central_meridian", -95.0)
        .attr(gm, "latitude_of_projection_origin", 35.0)
        .attr(gm, "false_easting", 0.0)
        .attr(gm, "false_northing", 0.0)
        .attr(gm, "semi_major_axis", 6378137.0)
        .attr(gm, "inverse_flattening", 298.257223563)
        .coord("x", "m", regular_axis(0.0, 1000.0, 4))
        .attr("x", "standard_name", "projection_x_coordinate")
        .coord("y", "m", regular_axis(2000.0, -1000.0, 3))
        .attr("y", "standard_name", "projection_y_coordinate")
        .var("tas", NcType::Short, &["y", "x"])
        .attr("tas", "grid_mapping", gm)
        .attr("tas", "scale_factor", 0.01)
        .attr("tas", "add_offset", 273.15)
        .values("tas", ArrayData::Short((0..12).collect()))
        .build()
}

/// Station records along an unlimited dimension with point coordinates.
pub fn station_container() -> MemoryStore {
    ContainerBuilder::new("stations.nc", Format::Nc4)
        .dim("station", 0)
        .dim("name_strlen", 8)
        .var("lon", NcType::Double, &["station"])
        .attr("lon", "standard_name", "longitude")
        .var("lat", NcType::Double, &["station"])
        .attr("lat", "standard_name", "latitude")
        .var("name", NcType::Char, &["station", "name_strlen"])
        .var("elevation", NcType::Float, &["station"])
        .attr("elevation", "coordinates", "lon lat")
        .attr("elevation", "_FillValue", ArrayData::Float(vec![-999.0]))
        .var("observed", NcType::Double, &["station"])
        .attr("observed", "ogr_field_type", "DateTime")
        .values("lon", ArrayData::Double(vec![2.35, -0.13, 13.40]))
        .values("lat", ArrayData::Double(vec![48.85, 51.51, 52.52]))
        .values("name", ArrayData::Char(b"Paris\0\0\0London\0\0Berlin\0\0".to_vec()))
        .values("elevation", ArrayData::Float(vec![35.0, -999.0, 34.0]))
        .values("observed", ArrayData::Double(vec![0.0, 86400.5, 1.0e9]))
        .build()
}

/// A WGS84 raster covering the globe with `bands` [`band_pattern`] bands.
pub fn geographic_raster(width: usize, height: usize, bands: usize) -> MemRaster {
    let mut raster = MemRaster::new(width, height);
    raster.srs = Some(SpatialRef::wgs84());
    raster.transform = Some(GeoTransform([
        -180.0,
        360.0 / width as f64,
        0.0,
        90.0,
        0.0,
        -180.0 / height as f64,
    ]));
    for band in 0..bands {
        let mut mem = MemBand::new(ArrayData::Float(band_pattern(band, width, height)));
        mem.nodata = Some(-9999.0);
        mem.unit_type = Some("K".to_string());
        raster.bands.push(mem);
    }
    raster
}

/// A path inside a fresh temporary directory, for native store tests.
pub fn temp_container_path(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    (dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_d_container_shape() {
        let store = four_d_container(Format::Nc);
        let temp = store.var_id("temp").unwrap();
        assert_eq!(store.variable(temp).unwrap().dims.len(), 4);
        assert_eq!(store.dimensions().len(), 4);
    }

    #[test]
    fn test_station_records_sized_from_data() {
        let store = station_container();
        let station = store.dim_id("station").unwrap();
        assert_eq!(store.dimension(station).unwrap().len, 3);
    }

    #[test]
    fn test_geographic_raster() {
        let raster = geographic_raster(36, 18, 2);
        assert_eq!(raster.bands.len(), 2);
        assert_eq!(raster.transform.unwrap().0[1], 10.0);
    }
}
