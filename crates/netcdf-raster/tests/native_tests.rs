//! File round trips through libnetcdf. Run with `--features native`.
#![cfg(feature = "native")]

use netcdf_raster::store::{ArrayData, Format};
use netcdf_raster::{CreateOptions, OpenOptions};
use projection::SpatialRef;
use test_utils::{assert_array_approx_eq, band_pattern, geographic_raster, temp_container_path};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("netcdf_raster=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_copy_to_file_and_reopen() {
    init_tracing();
    let (_dir, path) = temp_container_path("globe.nc");
    let raster = geographic_raster(12, 6, 2);

    let dataset = netcdf_raster::copy_to(&path, &raster, CreateOptions::default(), None).unwrap();
    dataset.close().unwrap();

    let reopened = netcdf_raster::open(path.to_str().unwrap(), OpenOptions::default()).unwrap();
    assert_eq!(reopened.band_count(), 0);
    let name = reopened
        .metadata("SUBDATASETS")
        .unwrap()
        .get("SUBDATASET_2_NAME")
        .unwrap()
        .to_string();

    let band_two = netcdf_raster::open(&name, OpenOptions::default()).unwrap();
    assert!(band_two.spatial_ref().unwrap().is_same(&SpatialRef::wgs84()));
    assert_array_approx_eq!(
        band_two.geo_transform().unwrap().0,
        raster.transform.unwrap().0,
        1e-9
    );
    let expected = band_pattern(1, 12, 6);
    assert_eq!(
        band_two.band(1).unwrap().read_row(5).unwrap(),
        ArrayData::Float(expected[60..].to_vec())
    );
}

#[test]
fn test_create_enhanced_file() {
    init_tracing();
    let (_dir, path) = temp_container_path("chunked.nc");
    let options = CreateOptions {
        format: Format::Nc4,
        ..Default::default()
    };
    let mut dataset =
        netcdf_raster::create(&path, netcdf_raster::RasterSpec::new(4, 2), options).unwrap();
    dataset.add_band(netcdf_raster::store::NcType::Int).unwrap();
    dataset
        .band(1)
        .unwrap()
        .write_row(1, &ArrayData::Int(vec![5, 6, 7, 8]))
        .unwrap();
    dataset.close().unwrap();

    let reopened = netcdf_raster::open(path.to_str().unwrap(), OpenOptions::default()).unwrap();
    let band = reopened.band(1).unwrap();
    assert_eq!(band.block_size(), (4, 1));
    assert_eq!(band.read_row(1).unwrap(), ArrayData::Int(vec![5, 6, 7, 8]));
}
