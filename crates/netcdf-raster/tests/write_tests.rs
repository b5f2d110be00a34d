//! Creating containers: georeferencing emission, attributes and round trips.

use netcdf_raster::georef::CrsSource;
use netcdf_raster::store::{ArrayData, ArrayStore, AttrOwner, AttrValue, Format, NcType};
use netcdf_raster::{
    CreateOptions, Dataset, DiagnosticDomain, ExtraDimSpec, GeoTransform, MemoryStore,
    NetCdfError, OpenOptions, Policy, RasterSpec,
};
use projection::SpatialRef;
use test_utils::{
    assert_approx_eq, assert_array_approx_eq, cf_lcc_container, create_test_grid,
};

fn create(format: Format, width: usize, height: usize) -> Dataset {
    let options = CreateOptions {
        format,
        ..Default::default()
    };
    Dataset::create(
        Box::new(MemoryStore::create("out.nc", format)),
        RasterSpec::new(width, height),
        options,
    )
    .unwrap()
}

fn write_grid(ds: &Dataset, band: usize) -> Vec<f32> {
    let (w, h) = (ds.width(), ds.height());
    let grid = create_test_grid(w, h);
    for row in 0..h {
        ds.band(band)
            .unwrap()
            .write_row(row, &ArrayData::Float(grid[row * w..(row + 1) * w].to_vec()))
            .unwrap();
    }
    grid
}

fn text(store: &dyn ArrayStore, owner: AttrOwner, name: &str) -> Option<String> {
    match store.get_attr(owner, name).unwrap() {
        Some(AttrValue::Text(s)) => Some(s),
        _ => None,
    }
}

#[test]
fn test_geographic_round_trip() {
    let mut ds = create(Format::Nc, 4, 3);
    assert_eq!(ds.add_band(NcType::Float).unwrap(), 1);
    ds.set_spatial_ref(SpatialRef::wgs84()).unwrap();
    let gt = GeoTransform::north_up(-180.0, 90.0, 90.0, -60.0);
    ds.set_geo_transform(gt).unwrap();
    let grid = write_grid(&ds, 1);

    let store = ds.into_store().unwrap();
    let crs = store.var_id("crs").unwrap();
    assert_eq!(
        text(store.as_ref(), AttrOwner::Var(crs), "grid_mapping_name").as_deref(),
        Some("latitude_longitude")
    );
    let band_var = store.var_id("Band1").unwrap();
    assert_eq!(
        text(store.as_ref(), AttrOwner::Var(band_var), "grid_mapping").as_deref(),
        Some("crs")
    );
    assert!(store.dim_id("lat").is_some());
    assert!(store.dim_id("lon").is_some());
    assert_eq!(
        text(store.as_ref(), AttrOwner::Global, "Conventions").as_deref(),
        Some("CF-1.5")
    );
    assert!(text(store.as_ref(), AttrOwner::Global, "GDAL")
        .unwrap()
        .starts_with("netcdf-raster"));

    // Stored bottom-up
    let lat = store.read(store.var_id("lat").unwrap(), &[0], &[3], NcType::Double).unwrap();
    assert_eq!(lat, ArrayData::Double(vec![-60.0, 0.0, 60.0]));

    let reopened = Dataset::open_store(store, OpenOptions::default()).unwrap();
    assert!(reopened.spatial_ref().unwrap().is_same(&SpatialRef::wgs84()));
    assert_array_approx_eq!(reopened.geo_transform().unwrap().0, gt.0, 1e-9);
    let georef = reopened.georeference().unwrap();
    assert_eq!(georef.crs_source, CrsSource::VendorString);
    assert!(georef.bottom_up);
    let band = reopened.band(1).unwrap();
    assert_eq!(band.read_row(0).unwrap(), ArrayData::Float(grid[..4].to_vec()));
    assert_eq!(band.read_row(2).unwrap(), ArrayData::Float(grid[8..].to_vec()));
}

#[test]
fn test_setters_commute_and_emit_once() {
    let mut ds = create(Format::Nc, 4, 3);
    ds.set_geo_transform(GeoTransform::north_up(0.0, 1.0, 3.0, -1.0))
        .unwrap();
    ds.add_band(NcType::Short).unwrap();
    ds.set_spatial_ref(SpatialRef::wgs84()).unwrap();
    assert!(matches!(
        ds.set_spatial_ref(SpatialRef::wgs84()),
        Err(NetCdfError::Precondition(_))
    ));
    assert!(matches!(
        ds.set_geo_transform(GeoTransform::default()),
        Err(NetCdfError::Precondition(_))
    ));

    let store = ds.into_store().unwrap();
    let band_var = store.var_id("Band1").unwrap();
    assert_eq!(
        text(store.as_ref(), AttrOwner::Var(band_var), "grid_mapping").as_deref(),
        Some("crs")
    );
}

#[test]
fn test_rotated_transform_rejected() {
    let mut ds = create(Format::Nc, 4, 3);
    let rotated = GeoTransform([0.0, 1.0, 0.5, 3.0, 0.0, -1.0]);
    assert!(matches!(
        ds.set_geo_transform(rotated),
        Err(NetCdfError::Unsupported(_))
    ));
}

#[test]
fn test_pending_crs_emitted_on_close() {
    let mut ds = create(Format::Nc, 2, 2);
    ds.add_band(NcType::Float).unwrap();
    ds.set_spatial_ref(SpatialRef::wgs84()).unwrap();
    let store = ds.into_store().unwrap();
    assert!(store.var_id("crs").is_some());
    assert!(store.var_id("lon").is_some());
}

#[test]
fn test_transform_without_crs_warns() {
    let mut ds = create(Format::Nc, 2, 2);
    ds.add_band(NcType::Float).unwrap();
    ds.set_geo_transform(GeoTransform::north_up(0.0, 1.0, 2.0, -1.0))
        .unwrap();
    let diagnostics = ds.close().unwrap();
    assert!(diagnostics.contains(DiagnosticDomain::Emission, "without spatial reference"));
}

#[test]
fn test_projected_emission_with_lonlat() {
    let source = Dataset::open_store(Box::new(cf_lcc_container()), OpenOptions::default()).unwrap();
    let srs = source.spatial_ref().unwrap().clone();
    let gt = source.geo_transform().unwrap();

    let options = CreateOptions {
        write_lonlat: Policy::Yes,
        ..Default::default()
    };
    let mut ds = Dataset::create(
        Box::new(MemoryStore::create("lcc_out.nc", Format::Nc)),
        RasterSpec::new(4, 3),
        options,
    )
    .unwrap();
    ds.add_band(NcType::Float).unwrap();
    ds.set_spatial_ref(srs.clone()).unwrap();
    ds.set_geo_transform(gt).unwrap();
    write_grid(&ds, 1);

    let store = ds.into_store().unwrap();
    let gm = store.var_id("lambert_conformal_conic").unwrap();
    assert!(text(store.as_ref(), AttrOwner::Var(gm), "spatial_ref").is_some());
    let band_var = store.var_id("Band1").unwrap();
    assert_eq!(
        text(store.as_ref(), AttrOwner::Var(band_var), "coordinates").as_deref(),
        Some("lon lat")
    );

    // Stored row 0 is the southern row, whose first centre is the projection origin
    let lat = store.read(store.var_id("lat").unwrap(), &[0, 0], &[1, 1], NcType::Double).unwrap();
    let lon = store.read(store.var_id("lon").unwrap(), &[0, 0], &[1, 1], NcType::Double).unwrap();
    assert_approx_eq!(lat.get_f64(0).unwrap(), 35.0, 1e-6);
    assert_approx_eq!(lon.get_f64(0).unwrap(), -95.0, 1e-6);

    let reopened = Dataset::open_store(store, OpenOptions::default()).unwrap();
    assert!(reopened.spatial_ref().unwrap().is_same(&srs));
    assert_array_approx_eq!(reopened.geo_transform().unwrap().0, gt.0, 1e-6);
}

#[test]
fn test_projected_units_follow_linear_unit() {
    let source = Dataset::open_store(Box::new(cf_lcc_container()), OpenOptions::default()).unwrap();
    let mut srs = source.spatial_ref().unwrap().clone();
    let unit = &mut srs.projected_cs_mut().unwrap().linear_unit;
    unit.name = "US survey foot".to_string();
    unit.to_meters = 0.3048006096012192;

    let mut ds = create(Format::Nc, 4, 3);
    ds.add_band(NcType::Float).unwrap();
    ds.set_spatial_ref(srs).unwrap();
    ds.set_geo_transform(source.geo_transform().unwrap()).unwrap();

    let store = ds.into_store().unwrap();
    for name in ["x", "y"] {
        let var = store.var_id(name).unwrap();
        assert_eq!(
            text(store.as_ref(), AttrOwner::Var(var), "units").as_deref(),
            Some("US_survey_foot")
        );
    }
}

fn write_bytes(format: Format, data_type: NcType, row: &ArrayData) -> Box<dyn ArrayStore> {
    let mut ds = create(format, row.len(), 1);
    ds.add_band(data_type).unwrap();
    ds.band(1).unwrap().write_row(0, row).unwrap();
    ds.into_store().unwrap()
}

fn byte_round_trip(format: Format, data_type: NcType, row: &ArrayData) -> Dataset {
    Dataset::open_store(write_bytes(format, data_type, row), OpenOptions::default()).unwrap()
}

#[test]
fn test_unsigned_bytes_on_classic_formats() {
    let row = ArrayData::UByte(vec![0, 200, 255, 1]);
    for format in [Format::Nc, Format::Nc2, Format::Nc4Classic, Format::Nc4] {
        let reopened = byte_round_trip(format, NcType::UByte, &row);
        let band = reopened.band(1).unwrap();
        assert_eq!(band.data_type(), NcType::UByte, "{:?}", format);
        assert_eq!(band.read_row(0).unwrap(), row, "{:?}", format);
    }

    let store = write_bytes(Format::Nc, NcType::UByte, &row);
    let var = store.var_id("Band1").unwrap();
    assert_eq!(store.variable(var).unwrap().nc_type, NcType::Byte);
    assert_eq!(
        text(store.as_ref(), AttrOwner::Var(var), "_Unsigned").as_deref(),
        Some("true")
    );
}

#[test]
fn test_signed_bytes_keep_sign() {
    let row = ArrayData::Byte(vec![-5, 7]);
    for format in [Format::Nc, Format::Nc4Classic, Format::Nc4] {
        let reopened = byte_round_trip(format, NcType::Byte, &row);
        let band = reopened.band(1).unwrap();
        assert_eq!(band.data_type(), NcType::Byte, "{:?}", format);
        assert_eq!(band.read_row(0).unwrap(), row, "{:?}", format);
    }
}

#[test]
fn test_extra_dimensions_written() {
    let mut spec = RasterSpec::new(3, 2);
    spec.extra_dims =
        vec![ExtraDimSpec::new("time", 2).with_values(NcType::Double, vec![0.0, 24.0])];
    let mut ds = Dataset::create(
        Box::new(MemoryStore::create("stack.nc", Format::Nc4)),
        spec,
        CreateOptions {
            format: Format::Nc4,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ds.add_variable("precip", NcType::Float).unwrap(), 1);
    assert_eq!(ds.band_count(), 2);
    assert_eq!(ds.band(2).unwrap().metadata_item("NETCDF_DIM_time"), Some("24"));
    ds.band(2)
        .unwrap()
        .write_row(0, &ArrayData::Float(vec![1.0, 2.0, 3.0]))
        .unwrap();

    let store = ds.into_store().unwrap();
    let var = store.var_id("precip").unwrap();
    let info = store.variable(var).unwrap();
    assert_eq!(info.dims.len(), 3);
    assert_eq!(info.chunking, Some(vec![1, 1, 3]));
    // Bottom-up: raster row 0 is stored row 1
    let stored = store.read(var, &[1, 1, 0], &[1, 1, 3], NcType::Float).unwrap();
    assert_eq!(stored, ArrayData::Float(vec![1.0, 2.0, 3.0]));
}

#[test]
fn test_metadata_items_auto_typed() {
    let mut ds = create(Format::Nc, 2, 2);
    ds.add_band(NcType::Float).unwrap();
    ds.set_metadata_item("NC_GLOBAL#institution", "ACME").unwrap();
    ds.set_metadata_item("NC_GLOBAL#GDAL", "someone else").unwrap();
    let band = ds.band_mut(1).unwrap();
    band.set_metadata_item("counts", "{1,2,3}").unwrap();
    band.set_metadata_item("ratio", "0.5").unwrap();
    band.set_metadata_item("long_name", "air temperature").unwrap();
    band.set_metadata_item("NETCDF_VARNAME", "renamed").unwrap();

    let store = ds.into_store().unwrap();
    let var = AttrOwner::Var(store.var_id("Band1").unwrap());
    assert_eq!(
        store.get_attr(var, "counts").unwrap(),
        Some(AttrValue::Values(ArrayData::Int(vec![1, 2, 3])))
    );
    assert_eq!(
        store.get_attr(var, "ratio").unwrap(),
        Some(AttrValue::Values(ArrayData::Float(vec![0.5])))
    );
    assert_eq!(text(store.as_ref(), var, "long_name").as_deref(), Some("air temperature"));
    assert!(store.get_attr(var, "NETCDF_VARNAME").unwrap().is_none());
    assert_eq!(
        text(store.as_ref(), AttrOwner::Global, "institution").as_deref(),
        Some("ACME")
    );
    assert!(text(store.as_ref(), AttrOwner::Global, "GDAL")
        .unwrap()
        .starts_with("netcdf-raster"));
}

#[test]
fn test_history_appends_lines() {
    let mut ds = create(Format::Nc, 2, 2);
    ds.add_history("first step").unwrap();
    ds.add_history("second step").unwrap();
    let history = ds.metadata_item("NC_GLOBAL#history").unwrap().to_string();
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with("first step"));
    assert!(lines[2].ends_with("second step"));
}

#[test]
fn test_late_fill_value() {
    let mut enhanced = create(Format::Nc4, 2, 2);
    enhanced.add_band(NcType::Float).unwrap();
    enhanced
        .band(1)
        .unwrap()
        .write_row(0, &ArrayData::Float(vec![1.0, 2.0]))
        .unwrap();
    assert!(matches!(
        enhanced.band_mut(1).unwrap().set_nodata(-1.0),
        Err(NetCdfError::Precondition(_))
    ));

    let mut classic = create(Format::Nc, 2, 2);
    classic.add_band(NcType::Float).unwrap();
    classic
        .band(1)
        .unwrap()
        .write_row(0, &ArrayData::Float(vec![1.0, 2.0]))
        .unwrap();
    classic.band_mut(1).unwrap().set_nodata(-1.0).unwrap();
    assert_eq!(classic.band(1).unwrap().nodata(), Some(-1.0));
}

#[test]
fn test_fill_value_in_data_mode_warns() {
    let mut ds = create(Format::Nc4, 2, 2);
    ds.add_band(NcType::Float).unwrap();
    ds.enter_data_mode().unwrap();
    ds.band_mut(1).unwrap().set_nodata(-1.0).unwrap();
    assert!(ds
        .diagnostics()
        .contains(DiagnosticDomain::BlockIo, "outside define mode"));
}

#[test]
fn test_create_preconditions() {
    let mismatched = Dataset::create(
        Box::new(MemoryStore::create("x.nc", Format::Nc4)),
        RasterSpec::new(2, 2),
        CreateOptions::default(),
    );
    assert!(matches!(mismatched, Err(NetCdfError::Precondition(_))));

    let empty = Dataset::create(
        Box::new(MemoryStore::create("x.nc", Format::Nc)),
        RasterSpec::new(0, 2),
        CreateOptions::default(),
    );
    assert!(matches!(empty, Err(NetCdfError::ZeroLengthDimension(_))));

    let mut ds = create(Format::Nc, 2, 2);
    assert!(matches!(
        ds.add_band(NcType::Char),
        Err(NetCdfError::Unsupported(_))
    ));
}
