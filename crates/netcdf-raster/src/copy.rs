//! Copying any raster source into a new container.

use projection::SpatialRef;
use tracing::{debug, info, warn};

use crate::attributes::{is_band_denied, is_managed_global, namespace_foreign, strip_global_prefix};
use crate::config::CreateOptions;
use crate::dataset::{Dataset, ExtraDimSpec, RasterSpec};
use crate::error::{NetCdfError, NetCdfResult};
use crate::georef::GeolocationArrays;
use crate::geotransform::GeoTransform;
use crate::metadata::{MetadataMap, DEFAULT_DOMAIN};
use crate::store::{ArrayData, ArrayStore, NcType};

/// Progress callback; returning `false` aborts the copy.
pub type ProgressFn<'a> = dyn FnMut(f64) -> bool + 'a;

/// Band attributes copied through dedicated setters or not at all.
const COPY_SKIPPED: &[&str] = &["coordinates", "bounds", "units"];

/// Read access to a raster, bands numbered from 1.
pub trait RasterSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn band_count(&self) -> usize;

    fn band_data_type(&self, band: usize) -> NetCdfResult<NcType>;

    fn band_nodata(&self, band: usize) -> NetCdfResult<Option<f64>>;

    fn band_unit_type(&self, band: usize) -> NetCdfResult<Option<String>> {
        let _ = band;
        Ok(None)
    }

    /// Scale and offset of packed values.
    fn band_scale_offset(&self, band: usize) -> NetCdfResult<(Option<f64>, Option<f64>)> {
        let _ = band;
        Ok((None, None))
    }

    fn band_metadata(&self, band: usize) -> NetCdfResult<MetadataMap>;

    /// One scanline, row 0 at the top.
    fn read_row(&self, band: usize, row: usize) -> NetCdfResult<ArrayData>;

    fn spatial_ref(&self) -> Option<SpatialRef>;

    fn geo_transform(&self) -> Option<GeoTransform>;

    fn metadata(&self) -> MetadataMap;

    /// Per-pixel longitude/latitude rasters, when the source has them.
    fn geolocation(&self) -> Option<&dyn GeolocationArrays> {
        None
    }
}

impl RasterSource for Dataset {
    fn width(&self) -> usize {
        Dataset::width(self)
    }

    fn height(&self) -> usize {
        Dataset::height(self)
    }

    fn band_count(&self) -> usize {
        Dataset::band_count(self)
    }

    fn band_data_type(&self, band: usize) -> NetCdfResult<NcType> {
        Ok(self.band(band)?.data_type())
    }

    fn band_nodata(&self, band: usize) -> NetCdfResult<Option<f64>> {
        Ok(self.band(band)?.nodata())
    }

    fn band_unit_type(&self, band: usize) -> NetCdfResult<Option<String>> {
        Ok(self.band(band)?.unit_type().map(str::to_string))
    }

    fn band_scale_offset(&self, band: usize) -> NetCdfResult<(Option<f64>, Option<f64>)> {
        let band = self.band(band)?;
        Ok((band.scale(), band.offset()))
    }

    fn band_metadata(&self, band: usize) -> NetCdfResult<MetadataMap> {
        Ok(self.band(band)?.metadata().clone())
    }

    fn read_row(&self, band: usize, row: usize) -> NetCdfResult<ArrayData> {
        self.band(band)?.read_row(row)
    }

    fn spatial_ref(&self) -> Option<SpatialRef> {
        Dataset::spatial_ref(self).cloned()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        Dataset::geo_transform(self)
    }

    fn metadata(&self) -> MetadataMap {
        Dataset::metadata(self, DEFAULT_DOMAIN)
            .cloned()
            .unwrap_or_default()
    }
}

/// A band held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemBand {
    /// Row-major pixels, row 0 at the top
    pub data: ArrayData,
    pub nodata: Option<f64>,
    pub unit_type: Option<String>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub metadata: MetadataMap,
}

impl MemBand {
    pub fn new(data: ArrayData) -> Self {
        Self {
            data,
            nodata: None,
            unit_type: None,
            scale: None,
            offset: None,
            metadata: MetadataMap::new(),
        }
    }
}

/// Per-pixel longitude/latitude rasters held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemGeolocation {
    pub width: usize,
    pub height: usize,
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
}

impl MemGeolocation {
    fn row<'a>(&self, values: &'a [f64], row: usize) -> NetCdfResult<&'a [f64]> {
        let start = row * self.width;
        values
            .get(start..start + self.width)
            .ok_or_else(|| NetCdfError::OutOfRange(format!("geolocation row {}", row)))
    }
}

impl GeolocationArrays for MemGeolocation {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn lon_row(&self, row: usize) -> NetCdfResult<Vec<f64>> {
        Ok(self.row(&self.lon, row)?.to_vec())
    }

    fn lat_row(&self, row: usize) -> NetCdfResult<Vec<f64>> {
        Ok(self.row(&self.lat, row)?.to_vec())
    }
}

/// A raster held entirely in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemRaster {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<MemBand>,
    pub srs: Option<SpatialRef>,
    pub transform: Option<GeoTransform>,
    pub metadata: MetadataMap,
    pub geolocation: Option<MemGeolocation>,
}

impl MemRaster {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    fn mem_band(&self, band: usize) -> NetCdfResult<&MemBand> {
        band.checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or_else(|| {
                NetCdfError::OutOfRange(format!("band {} of {}", band, self.bands.len()))
            })
    }
}

impl RasterSource for MemRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_data_type(&self, band: usize) -> NetCdfResult<NcType> {
        Ok(self.mem_band(band)?.data.nc_type())
    }

    fn band_nodata(&self, band: usize) -> NetCdfResult<Option<f64>> {
        Ok(self.mem_band(band)?.nodata)
    }

    fn band_unit_type(&self, band: usize) -> NetCdfResult<Option<String>> {
        Ok(self.mem_band(band)?.unit_type.clone())
    }

    fn band_scale_offset(&self, band: usize) -> NetCdfResult<(Option<f64>, Option<f64>)> {
        let band = self.mem_band(band)?;
        Ok((band.scale, band.offset))
    }

    fn band_metadata(&self, band: usize) -> NetCdfResult<MetadataMap> {
        Ok(self.mem_band(band)?.metadata.clone())
    }

    fn read_row(&self, band: usize, row: usize) -> NetCdfResult<ArrayData> {
        let data = &self.mem_band(band)?.data;
        if row >= self.height || data.len() < self.width * self.height {
            return Err(NetCdfError::OutOfRange(format!("row {} of band {}", row, band)));
        }
        let start = row * self.width;
        Ok(crate::store::map_array!(data, v => v[start..start + self.width].to_vec()))
    }

    fn spatial_ref(&self) -> Option<SpatialRef> {
        self.srs.clone()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.transform
    }

    fn metadata(&self) -> MetadataMap {
        self.metadata.clone()
    }

    fn geolocation(&self) -> Option<&dyn GeolocationArrays> {
        self.geolocation
            .as_ref()
            .map(|g| g as &dyn GeolocationArrays)
    }
}

/// Values of a `{a,b,c}` metadata list.
fn parse_list(text: &str) -> Vec<String> {
    text.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Extra dimensions described by `NETCDF_DIM_*` entries of `metadata`.
pub fn extra_dims_from_metadata(metadata: &MetadataMap) -> Option<Vec<ExtraDimSpec>> {
    let names = parse_list(metadata.get("NETCDF_DIM_EXTRA")?);
    if names.is_empty() {
        return None;
    }
    names
        .into_iter()
        .map(|name| {
            let def = parse_list(metadata.get(&format!("NETCDF_DIM_{}_DEF", name))?);
            let len: usize = def.first()?.parse().ok()?;
            let nc_type = def
                .get(1)
                .and_then(|c| c.parse().ok())
                .and_then(NcType::from_code)
                .unwrap_or(NcType::Int);
            let values: Option<Vec<f64>> = metadata
                .get(&format!("NETCDF_DIM_{}_VALUES", name))
                .map(parse_list)
                .and_then(|v| v.iter().map(|t| t.parse().ok()).collect());
            let spec = ExtraDimSpec::new(name, len);
            Some(match values {
                Some(values) if values.len() == len && nc_type.is_numeric() => {
                    spec.with_values(nc_type, values)
                }
                _ => spec,
            })
        })
        .collect()
}

/// Write `source` into `store` as a new raster.
pub fn create_copy(
    store: Box<dyn ArrayStore>,
    source: &dyn RasterSource,
    options: CreateOptions,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> NetCdfResult<Dataset> {
    let (width, height, band_count) = (source.width(), source.height(), source.band_count());
    if band_count == 0 {
        return Err(NetCdfError::Precondition("source has no bands".to_string()));
    }
    let source_metadata = source.metadata();

    let extra_dims = extra_dims_from_metadata(&source_metadata).filter(|dims| {
        let product: usize = dims.iter().map(|d| d.len).product();
        if product != band_count {
            warn!(
                product,
                band_count, "Extra dimensions do not match band count, copying bands separately"
            );
        }
        product == band_count
    });

    let mut spec = RasterSpec::new(width, height);
    spec.extra_dims = extra_dims.clone().unwrap_or_default();
    let mut dataset = Dataset::create(store, spec, options)?;

    // Global metadata
    for (key, value) in source_metadata.iter() {
        if key.starts_with("NETCDF_DIM_") {
            continue;
        }
        let key = namespace_foreign(key);
        match strip_global_prefix(&key) {
            Some(name) if !is_managed_global(name) => dataset.set_metadata_item(&key, value)?,
            _ => {}
        }
    }

    // Band variables
    let first_name = source.band_metadata(1)?.get("NETCDF_VARNAME").map(str::to_string);
    if extra_dims.is_some() {
        let name = first_name.unwrap_or_else(|| "Band1".to_string());
        dataset.add_variable(&name, source.band_data_type(1)?)?;
    } else {
        let mut used: Vec<String> = Vec::new();
        for band in 1..=band_count {
            let name = source
                .band_metadata(band)?
                .get("NETCDF_VARNAME")
                .map(str::to_string)
                .filter(|n| !used.contains(n))
                .unwrap_or_else(|| format!("Band{}", band));
            dataset.add_variable(&name, source.band_data_type(band)?)?;
            used.push(name);
        }
    }

    // Band attributes
    for number in 1..=band_count {
        let nodata = source.band_nodata(number)?;
        let units = source.band_unit_type(number)?;
        let (scale, offset) = source.band_scale_offset(number)?;
        let metadata = source.band_metadata(number)?;
        let band = dataset.band_mut(number)?;
        if let Some(nodata) = nodata {
            band.set_nodata(nodata)?;
        }
        if let Some(units) = units {
            band.set_unit_type(&units)?;
        }
        if let Some(scale) = scale {
            band.set_scale(scale)?;
        }
        if let Some(offset) = offset {
            band.set_offset(offset)?;
        }
        // Bands sharing a variable share its attributes
        if extra_dims.is_some() && number > 1 {
            continue;
        }
        for (key, value) in metadata.iter() {
            if is_band_denied(key) || COPY_SKIPPED.contains(&key) {
                continue;
            }
            band.set_metadata_item(key, value)?;
        }
    }

    // Georeferencing
    match (source.spatial_ref(), source.geo_transform()) {
        (Some(srs), Some(transform)) => {
            dataset.set_georeferencing(srs, transform, source.geolocation())?
        }
        (Some(srs), None) => dataset.set_spatial_ref(srs)?,
        (None, Some(transform)) => dataset.set_geo_transform(transform)?,
        (None, None) => {}
    }

    dataset.add_history("Copied by netcdf-raster")?;

    // Pixels
    dataset.enter_data_mode()?;
    let total = (band_count * height) as f64;
    let mut done = 0usize;
    for number in 1..=band_count {
        for row in 0..height {
            let data = source.read_row(number, row)?;
            dataset.band(number)?.write_row(row, &data)?;
            done += 1;
            if let Some(callback) = progress.as_mut() {
                if !callback(done as f64 / total) {
                    info!(band = number, row, "Copy aborted");
                    return Err(NetCdfError::Aborted);
                }
            }
        }
        debug!(band = number, rows = height, "Copied band");
    }

    info!(width, height, bands = band_count, "Copied raster");
    Ok(dataset)
}
