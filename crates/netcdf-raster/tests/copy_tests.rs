//! Copying rasters from other sources into new containers.

use netcdf_raster::copy::MemGeolocation;
use netcdf_raster::store::{ArrayData, ArrayStore, Format, NcType};
use netcdf_raster::{
    create_copy, CreateOptions, Dataset, MemBand, MemRaster, MemoryStore, NetCdfError,
    OpenOptions, ProgressFn,
};
use projection::SpatialRef;
use test_utils::{
    assert_array_approx_eq, band_pattern, cf_lcc_container, four_d_container, geographic_raster,
};

fn target(name: &str) -> Box<dyn ArrayStore> {
    Box::new(MemoryStore::create(name, Format::Nc))
}

#[test]
fn test_copy_preserves_band_stack() {
    let source = Dataset::open_store(Box::new(four_d_container(Format::Nc)), OpenOptions::default())
        .unwrap();
    let copy = create_copy(target("copy.nc"), &source, CreateOptions::default(), None).unwrap();
    assert_eq!(copy.band_count(), 6);
    let store = copy.into_store().unwrap();

    // One shared variable over both extra dimensions
    let temp = store.var_id("temp").unwrap();
    assert_eq!(store.variable(temp).unwrap().dims.len(), 4);
    assert!(store.var_id("Band1").is_none());

    let reopened = Dataset::open_store(store, OpenOptions::default()).unwrap();
    assert_eq!(reopened.band_count(), 6);
    assert_eq!(reopened.metadata_item("NETCDF_DIM_EXTRA"), Some("{time,level}"));
    assert_eq!(
        reopened.metadata_item("NETCDF_DIM_level_VALUES"),
        Some("{1000,850,500}")
    );
    assert!(reopened.spatial_ref().unwrap().is_geographic());
    assert_array_approx_eq!(
        reopened.geo_transform().unwrap().0,
        source.geo_transform().unwrap().0,
        1e-9
    );

    let band = reopened.band(4).unwrap();
    assert_eq!(band.nodata(), Some(-9999.0));
    assert_eq!(band.unit_type(), Some("K"));
    assert_eq!(band.metadata_item("NETCDF_DIM_time"), Some("6"));
    let expected = band_pattern(3, 10, 10);
    assert_eq!(band.read_row(0).unwrap(), ArrayData::Float(expected[..10].to_vec()));
    assert!(reopened
        .metadata_item("NC_GLOBAL#history")
        .unwrap()
        .contains("Copied by netcdf-raster"));
}

#[test]
fn test_copy_keeps_scale_and_offset() {
    let source = Dataset::open_store(Box::new(cf_lcc_container()), OpenOptions::default()).unwrap();
    let copy = create_copy(target("tas.nc"), &source, CreateOptions::default(), None).unwrap();
    let store = copy.into_store().unwrap();
    assert!(store.var_id("tas").is_some());

    let reopened = Dataset::open_store(store, OpenOptions::default()).unwrap();
    let band = reopened.band(1).unwrap();
    assert_eq!(band.data_type(), NcType::Short);
    assert_eq!(band.scale(), Some(0.01));
    assert_eq!(band.offset(), Some(273.15));
    assert_eq!(band.read_row(0).unwrap(), ArrayData::Short(vec![0, 1, 2, 3]));
    assert!(reopened.spatial_ref().unwrap().is_projected());
}

#[test]
fn test_copy_separate_bands() {
    let mut raster = geographic_raster(6, 3, 2);
    raster.bands[1].metadata.set("NETCDF_VARNAME", "second");
    raster.bands[1].metadata.set("long_name", "second band");
    raster.metadata.set("title", "two bands");

    let copy = create_copy(target("bands.nc"), &raster, CreateOptions::default(), None).unwrap();
    let reopened = Dataset::open_store(copy.into_store().unwrap(), OpenOptions::variable("second"))
        .unwrap();
    assert_eq!(reopened.metadata_item("NC_GLOBAL#title"), Some("two bands"));
    let band = reopened.band(1).unwrap();
    assert_eq!(band.metadata_item("long_name"), Some("second band"));
    assert_eq!(
        band.read_row(2).unwrap(),
        ArrayData::Float(band_pattern(1, 6, 3)[12..].to_vec())
    );
}

#[test]
fn test_copy_abort_from_progress() {
    let raster = geographic_raster(8, 4, 2);
    let mut calls = Vec::new();
    let progress: &mut ProgressFn = &mut |fraction| {
        calls.push(fraction);
        fraction < 0.5
    };
    let result = create_copy(target("abort.nc"), &raster, CreateOptions::default(), Some(progress));
    assert!(matches!(result, Err(NetCdfError::Aborted)));
    assert_eq!(calls, vec![0.125, 0.25, 0.375, 0.5]);
}

#[test]
fn test_copy_without_bands_fails() {
    let raster = MemRaster::new(4, 4);
    assert!(matches!(
        create_copy(target("empty.nc"), &raster, CreateOptions::default(), None),
        Err(NetCdfError::Precondition(_))
    ));
}

#[test]
fn test_copy_resamples_geolocation() {
    let source = Dataset::open_store(Box::new(cf_lcc_container()), OpenOptions::default()).unwrap();
    let (w, h) = (4, 3);
    let mut raster = MemRaster::new(w, h);
    raster.srs = source.spatial_ref().cloned();
    raster.transform = source.geo_transform();
    raster
        .bands
        .push(MemBand::new(ArrayData::Float(vec![0.0; w * h])));
    raster.geolocation = Some(MemGeolocation {
        width: w,
        height: h,
        lon: (0..w * h).map(|i| (i % w) as f64).collect(),
        lat: (0..w * h).map(|i| (i / w) as f64).collect(),
    });

    let copy = create_copy(target("geoloc.nc"), &raster, CreateOptions::default(), None).unwrap();
    let store = copy.into_store().unwrap();
    let lat = store.var_id("lat").unwrap();
    let lon = store.var_id("lon").unwrap();
    // Stored row 0 is the bottom raster row
    assert_eq!(
        store.read(lat, &[0, 0], &[1, w], NcType::Double).unwrap(),
        ArrayData::Double(vec![2.0; w])
    );
    assert_eq!(
        store.read(lon, &[0, 0], &[1, w], NcType::Double).unwrap(),
        ArrayData::Double(vec![0.0, 1.0, 2.0, 3.0])
    );
}

#[test]
fn test_copy_crs_only_gets_default_transform() {
    let mut raster = MemRaster::new(2, 2);
    raster.srs = Some(SpatialRef::wgs84());
    raster
        .bands
        .push(MemBand::new(ArrayData::Int(vec![1, 2, 3, 4])));
    let copy = create_copy(target("crs_only.nc"), &raster, CreateOptions::default(), None).unwrap();
    let store = copy.into_store().unwrap();
    assert!(store.var_id("crs").is_some());
    assert!(store.var_id("lat").is_some());
}

fn copy_row(format: Format, row: ArrayData) -> Dataset {
    let mut raster = MemRaster::new(row.len(), 1);
    raster.bands.push(MemBand::new(row));
    let options = CreateOptions {
        format,
        ..Default::default()
    };
    let store = Box::new(MemoryStore::create("bytes.nc", format));
    let copy = create_copy(store, &raster, options, None).unwrap();
    Dataset::open_store(copy.into_store().unwrap(), OpenOptions::default()).unwrap()
}

#[test]
fn test_copy_byte_signedness() {
    let unsigned = ArrayData::UByte(vec![0, 200, 255, 1]);
    let signed = ArrayData::Byte(vec![-5, 7]);
    for format in [Format::Nc, Format::Nc4] {
        let reopened = copy_row(format, unsigned.clone());
        let band = reopened.band(1).unwrap();
        assert_eq!(band.data_type(), NcType::UByte);
        assert_eq!(band.read_row(0).unwrap(), unsigned);

        let reopened = copy_row(format, signed.clone());
        let band = reopened.band(1).unwrap();
        assert_eq!(band.data_type(), NcType::Byte);
        assert_eq!(band.read_row(0).unwrap(), signed);
    }
}
