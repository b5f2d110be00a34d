//! Reading record-dimension containers as feature layers.

use chrono::{DateTime, TimeZone, Utc};
use netcdf_raster::store::{ArrayData, Format, NcType};
use netcdf_raster::vector::{FieldKind, FieldValue, Geometry, GEOMETRY_FIELD_ATTR, LAYER_NAME_ATTR};
use netcdf_raster::{DiagnosticDomain, NetCdfError, VectorLayer};
use test_utils::{station_container, ContainerBuilder};

#[test]
fn test_station_fields() {
    let layer = VectorLayer::open(Box::new(station_container())).unwrap();
    assert_eq!(layer.name(), "stations");
    assert_eq!(layer.feature_count(), 3);

    let names: Vec<&str> = layer.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "elevation", "observed"]);
    assert_eq!(layer.fields()[0].kind, FieldKind::String { width: Some(8) });
    assert_eq!(layer.fields()[1].kind, FieldKind::Real);
    assert_eq!(layer.fields()[1].nodata, Some(-999.0));
    assert_eq!(layer.fields()[2].kind, FieldKind::DateTime);
    assert_eq!(layer.field_index("observed"), Some(2));
    assert_eq!(layer.field_index("lon"), None);
}

#[test]
fn test_station_features() {
    let layer = VectorLayer::open(Box::new(station_container())).unwrap();
    let features: Vec<_> = layer.collect::<Result<_, _>>().unwrap();
    assert_eq!(features.len(), 3);

    let london = &features[1];
    assert_eq!(london.fid, 1);
    assert_eq!(london.field(0), Some(&FieldValue::String("London".to_string())));
    assert!(london.field(1).unwrap().is_null());
    let half_second = DateTime::from_timestamp(86_400, 500_000_000).unwrap();
    assert_eq!(london.field(2), Some(&FieldValue::DateTime(half_second)));
    assert_eq!(
        london.geometry,
        Some(Geometry::Point {
            x: -0.13,
            y: 51.51,
            z: None
        })
    );

    let berlin = &features[2];
    assert_eq!(berlin.field(1), Some(&FieldValue::Real(34.0)));
    assert_eq!(
        berlin.field(2),
        Some(&FieldValue::DateTime(
            Utc.with_ymd_and_hms(2001, 9, 9, 1, 46, 40).unwrap()
        ))
    );
}

#[test]
fn test_random_access_bounds() {
    let layer = VectorLayer::open(Box::new(station_container())).unwrap();
    assert_eq!(
        layer.get_feature(0).unwrap().field(0),
        Some(&FieldValue::String("Paris".to_string()))
    );
    assert!(matches!(layer.get_feature(3), Err(NetCdfError::OutOfRange(_))));
}

fn roads() -> ContainerBuilder {
    ContainerBuilder::new("roads.nc", Format::Nc4)
        .dim("feature", 0)
        .dim("wkt_len", 24)
        .var("geom", NcType::Char, &["feature", "wkt_len"])
        .var("lanes", NcType::Int, &["feature"])
        .global_attr(GEOMETRY_FIELD_ATTR, "geom")
        .global_attr(LAYER_NAME_ATTR, "roads")
}

fn padded(texts: &[&str], width: usize) -> ArrayData {
    let mut bytes = Vec::new();
    for text in texts {
        let mut record = text.as_bytes().to_vec();
        record.resize(width, 0);
        bytes.extend(record);
    }
    ArrayData::Char(bytes)
}

#[test]
fn test_wkt_geometry_layer() {
    let store = roads()
        .values("geom", padded(&["LINESTRING (0 0,1 1)", ""], 24))
        .values("lanes", ArrayData::Int(vec![2, 4]))
        .build();
    let mut layer = VectorLayer::open(Box::new(store)).unwrap();
    assert_eq!(layer.name(), "roads");
    assert!(layer.has_geometry());
    // The geometry variable is not a field
    assert_eq!(layer.fields().len(), 1);
    assert_eq!(layer.fields()[0].kind, FieldKind::Integer);

    let first = layer.next_feature().unwrap().unwrap();
    assert_eq!(
        first.geometry,
        Some(Geometry::Wkt("LINESTRING (0 0,1 1)".to_string()))
    );
    assert_eq!(first.field(0), Some(&FieldValue::Integer(2)));

    let second = layer.next_feature().unwrap().unwrap();
    assert_eq!(second.geometry, None);
    assert!(layer.next_feature().unwrap().is_none());
}

#[test]
fn test_field_type_override_mismatch_warns() {
    let store = roads()
        .attr("lanes", "ogr_field_type", "String")
        .values("geom", padded(&["POINT (1 2)"], 24))
        .values("lanes", ArrayData::Int(vec![1]))
        .build();
    let layer = VectorLayer::open(Box::new(store)).unwrap();
    assert_eq!(layer.fields()[0].kind, FieldKind::Integer);
    assert!(layer
        .diagnostics()
        .contains(DiagnosticDomain::Vector, "Ignoring field type"));
}

#[test]
fn test_missing_geometry_variable() {
    let store = roads()
        .global_attr(GEOMETRY_FIELD_ATTR, "shape")
        .values("lanes", ArrayData::Int(vec![1]))
        .build();
    assert!(matches!(
        VectorLayer::open(Box::new(store)),
        Err(NetCdfError::VariableNotFound(_))
    ));
}
