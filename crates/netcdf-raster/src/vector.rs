//! Tabular features stored along a record dimension.
//!
//! A 1D variable on the record dimension, or a `(record, text)` character
//! variable, is a field. Geometry comes either from a WKT variable named by
//! the global `ogr_geometry_field` or from point coordinate variables listed
//! in a `coordinates` attribute.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::access::{ContainerAccess, ContainerState, Mode};
use crate::attributes::text_attr;
use crate::diagnostics::{DiagnosticDomain, Diagnostics};
use crate::error::{NetCdfError, NetCdfResult};
use crate::georef::heuristics::{is_latitude, is_longitude};
use crate::store::{default_fill, ArrayData, ArrayStore, AttrOwner, NcType, VarInfo};

/// Global attribute naming the record dimension.
pub const RECORD_DIM_ATTR: &str = "ogr_record_dim";
/// Global attribute naming the WKT geometry variable.
pub const GEOMETRY_FIELD_ATTR: &str = "ogr_geometry_field";
/// Variable attribute overriding the inferred field kind.
pub const FIELD_TYPE_ATTR: &str = "ogr_field_type";
/// Global attribute naming the layer.
pub const LAYER_NAME_ATTR: &str = "ogr_layer_name";

/// Kind of a feature field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Integer64,
    Real,
    /// Text, bounded by the text dimension when there is one
    String { width: Option<usize> },
    /// Days since 1970-01-01
    Date,
    /// Seconds since 1970-01-01T00:00:00Z
    DateTime,
}

impl FieldKind {
    /// Narrowest field kind holding every value of `nc_type`.
    pub fn from_storage(nc_type: NcType, text_width: Option<usize>) -> Self {
        match nc_type {
            NcType::Byte | NcType::UByte | NcType::Short | NcType::UShort | NcType::Int => {
                FieldKind::Integer
            }
            NcType::UInt | NcType::Int64 | NcType::UInt64 => FieldKind::Integer64,
            NcType::Float | NcType::Double => FieldKind::Real,
            NcType::Char => FieldKind::String {
                width: Some(text_width.unwrap_or(1)),
            },
            NcType::String => FieldKind::String { width: None },
        }
    }

    fn from_override(name: &str, text_width: Option<usize>) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "integer" => FieldKind::Integer,
            "integer64" => FieldKind::Integer64,
            "real" => FieldKind::Real,
            "string" => FieldKind::String { width: text_width },
            "date" => FieldKind::Date,
            "datetime" => FieldKind::DateTime,
            _ => return None,
        })
    }

    fn is_text(self) -> bool {
        matches!(self, FieldKind::String { .. })
    }
}

/// A field of the layer and the variable backing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefn {
    pub name: String,
    pub kind: FieldKind,
    #[serde(skip)]
    pub var_id: usize,
    #[serde(skip)]
    pub storage: NcType,
    /// Value marking a missing numeric entry
    pub nodata: Option<f64>,
}

/// Value of one field of one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Feature geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { x: f64, y: f64, z: Option<f64> },
    Wkt(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Record index
    pub fid: usize,
    pub fields: Vec<FieldValue>,
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GeometrySource {
    None,
    Wkt { var: usize, storage: NcType },
    Point { x: usize, y: usize, z: Option<usize> },
}

/// A sequentially readable feature layer.
pub struct VectorLayer {
    access: ContainerAccess,
    name: String,
    record_dim: usize,
    record_count: usize,
    fields: Vec<FieldDefn>,
    geometry: GeometrySource,
    cursor: usize,
}

impl std::fmt::Debug for VectorLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorLayer")
            .field("name", &self.name)
            .field("record_dim", &self.record_dim)
            .field("record_count", &self.record_count)
            .field("fields", &self.fields)
            .field("geometry", &self.geometry)
            .finish()
    }
}

/// Names listed in `attr` on any variable.
fn referenced_names(store: &dyn ArrayStore, attr: &str) -> HashSet<String> {
    store
        .variables()
        .iter()
        .filter_map(|v| text_attr(store, AttrOwner::Var(v.id), attr))
        .flat_map(|text| {
            text.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn find_record_dim(store: &dyn ArrayStore) -> NetCdfResult<usize> {
    if let Some(name) = text_attr(store, AttrOwner::Global, RECORD_DIM_ATTR) {
        return store
            .dim_id(&name)
            .ok_or_else(|| NetCdfError::VariableNotFound(format!("record dimension {}", name)));
    }
    store
        .dimensions()
        .into_iter()
        .find(|d| d.unlimited)
        .map(|d| d.id)
        .ok_or_else(|| NetCdfError::InvalidFormat("no record dimension".to_string()))
}

/// Width of the text dimension when `var` is a `(record, text)` variable.
fn record_shape(store: &dyn ArrayStore, var: &VarInfo, record_dim: usize) -> Option<Option<usize>> {
    match var.dims.as_slice() {
        [d] if *d == record_dim => Some(None),
        [d, text] if *d == record_dim && var.nc_type == NcType::Char => store
            .dimension(*text)
            .ok()
            .map(|dim| Some(dim.len)),
        _ => None,
    }
}

fn field_nodata(store: &dyn ArrayStore, var: &VarInfo) -> Option<f64> {
    if !var.nc_type.is_numeric() {
        return None;
    }
    let owner = AttrOwner::Var(var.id);
    ["_FillValue", "missing_value"]
        .iter()
        .find_map(|name| {
            store
                .get_attr(owner, name)
                .ok()
                .flatten()
                .and_then(|v| v.first_f64())
        })
        .or(Some(default_fill(var.nc_type)))
}

fn infer_fields(
    store: &dyn ArrayStore,
    record_dim: usize,
    geometry_var: Option<usize>,
    diagnostics: &mut Diagnostics,
) -> Vec<FieldDefn> {
    let mut excluded = referenced_names(store, "coordinates");
    excluded.extend(referenced_names(store, "bounds"));

    let mut fields = Vec::new();
    for var in store.variables() {
        if Some(var.id) == geometry_var || excluded.contains(&var.name) {
            continue;
        }
        let Some(text_width) = record_shape(store, &var, record_dim) else {
            continue;
        };
        let stored = FieldKind::from_storage(var.nc_type, text_width);
        let kind = match text_attr(store, AttrOwner::Var(var.id), FIELD_TYPE_ATTR) {
            Some(name) => match FieldKind::from_override(&name, text_width) {
                Some(kind) if kind.is_text() == stored.is_text() => kind,
                _ => {
                    diagnostics.warn(
                        DiagnosticDomain::Vector,
                        format!("Ignoring field type {} of {}", name, var.name),
                    );
                    stored
                }
            },
            None => stored,
        };
        fields.push(FieldDefn {
            name: var.name.clone(),
            kind,
            var_id: var.id,
            storage: var.nc_type,
            nodata: field_nodata(store, &var),
        });
    }
    fields
}

fn point_source(store: &dyn ArrayStore, record_dim: usize) -> GeometrySource {
    let names = referenced_names(store, "coordinates");
    let on_record: Vec<usize> = names
        .iter()
        .filter_map(|name| store.var_id(name))
        .filter(|&id| {
            store
                .variable(id)
                .map(|v| v.dims == [record_dim] && v.nc_type.is_numeric())
                .unwrap_or(false)
        })
        .collect();
    let attr_is = |id: usize, name: &str, value: &str| {
        text_attr(store, AttrOwner::Var(id), name).is_some_and(|v| v.eq_ignore_ascii_case(value))
    };
    let x = on_record.iter().copied().find(|&id| {
        is_longitude(store, id) || attr_is(id, "standard_name", "projection_x_coordinate")
    });
    let y = on_record.iter().copied().find(|&id| {
        is_latitude(store, id) || attr_is(id, "standard_name", "projection_y_coordinate")
    });
    let z = on_record.iter().copied().find(|&id| attr_is(id, "axis", "Z"));
    match (x, y) {
        (Some(x), Some(y)) => GeometrySource::Point { x, y, z },
        _ => GeometrySource::None,
    }
}

/// Decode the text of one record from a char or string read.
fn record_text(data: ArrayData) -> Option<String> {
    match data {
        ArrayData::Char(bytes) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Some(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
        }
        ArrayData::Str(mut values) => values.pop(),
        _ => None,
    }
}

fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        _ if value.is_nan() => true,
        Some(nd) => value == nd,
        None => false,
    }
}

/// 1970-01-01
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

impl VectorLayer {
    /// Open the record-dimension layer of a container.
    pub fn open(store: Box<dyn ArrayStore>) -> NetCdfResult<Self> {
        let access = ContainerAccess::new(store, false);
        let mut guard = access.lock();
        let state: &mut ContainerState = &mut guard;
        state.ensure_mode(Mode::Data)?;
        let store = state.store.as_ref();

        let record_dim = find_record_dim(store)?;
        let record_count = store.dimension(record_dim)?.len;
        let name = text_attr(store, AttrOwner::Global, LAYER_NAME_ATTR).unwrap_or_else(|| {
            std::path::Path::new(store.path())
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "layer".to_string())
        });

        let geometry = match text_attr(store, AttrOwner::Global, GEOMETRY_FIELD_ATTR) {
            Some(field) => {
                let var = store
                    .var_id(&field)
                    .ok_or_else(|| NetCdfError::VariableNotFound(field.clone()))?;
                let info = store.variable(var)?;
                if info.nc_type.is_numeric() {
                    return Err(NetCdfError::InvalidFormat(format!(
                        "geometry field {} is not text",
                        field
                    )));
                }
                GeometrySource::Wkt {
                    var,
                    storage: info.nc_type,
                }
            }
            None => point_source(store, record_dim),
        };
        let geometry_var = match geometry {
            GeometrySource::Wkt { var, .. } => Some(var),
            _ => None,
        };
        let fields = infer_fields(store, record_dim, geometry_var, &mut state.diagnostics);

        info!(
            layer = %name,
            records = record_count,
            fields = fields.len(),
            "Opened vector layer"
        );
        drop(guard);

        Ok(Self {
            access,
            name,
            record_dim,
            record_count,
            fields,
            geometry,
            cursor: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    /// Index of the field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn feature_count(&self) -> usize {
        self.record_count
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry != GeometrySource::None
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.access.lock().diagnostics.clone()
    }

    pub fn reset_reading(&mut self) {
        self.cursor = 0;
    }

    /// The next feature, or `None` past the last record.
    pub fn next_feature(&mut self) -> NetCdfResult<Option<Feature>> {
        if self.cursor >= self.record_count {
            return Ok(None);
        }
        let feature = self.get_feature(self.cursor)?;
        self.cursor += 1;
        Ok(Some(feature))
    }

    /// Feature at record `fid`.
    pub fn get_feature(&self, fid: usize) -> NetCdfResult<Feature> {
        if fid >= self.record_count {
            return Err(NetCdfError::OutOfRange(format!(
                "feature {} of {}",
                fid, self.record_count
            )));
        }
        let guard = self.access.lock();
        let store = guard.store.as_ref();
        let fields = self
            .fields
            .iter()
            .map(|field| read_field(store, field, fid))
            .collect::<NetCdfResult<Vec<_>>>()?;
        let geometry = self.read_geometry(store, fid)?;
        debug!(fid, "Read feature");
        Ok(Feature {
            fid,
            fields,
            geometry,
        })
    }

    fn read_geometry(&self, store: &dyn ArrayStore, fid: usize) -> NetCdfResult<Option<Geometry>> {
        match self.geometry {
            GeometrySource::None => Ok(None),
            GeometrySource::Wkt { var, storage } => {
                let text = read_text(store, var, storage, fid)?;
                Ok(text.filter(|t| !t.is_empty()).map(Geometry::Wkt))
            }
            GeometrySource::Point { x, y, z } => {
                let x = read_number(store, x, fid)?;
                let y = read_number(store, y, fid)?;
                let z = z.map(|z| read_number(store, z, fid)).transpose()?;
                if x.is_nan() || y.is_nan() {
                    return Ok(None);
                }
                Ok(Some(Geometry::Point { x, y, z }))
            }
        }
    }
}

impl Iterator for VectorLayer {
    type Item = NetCdfResult<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_feature().transpose()
    }
}

fn read_number(store: &dyn ArrayStore, var: usize, fid: usize) -> NetCdfResult<f64> {
    let data = store.read(var, &[fid], &[1], NcType::Double)?;
    Ok(data.get_f64(0).unwrap_or(f64::NAN))
}

fn read_text(
    store: &dyn ArrayStore,
    var: usize,
    storage: NcType,
    fid: usize,
) -> NetCdfResult<Option<String>> {
    let info = store.variable(var)?;
    let data = match info.dims.as_slice() {
        [_, text] => {
            let width = store.dimension(*text)?.len;
            store.read(var, &[fid, 0], &[1, width], storage)?
        }
        _ => store.read(var, &[fid], &[1], storage)?,
    };
    Ok(record_text(data))
}

fn read_field(store: &dyn ArrayStore, field: &FieldDefn, fid: usize) -> NetCdfResult<FieldValue> {
    if field.kind.is_text() {
        return Ok(match read_text(store, field.var_id, field.storage, fid)? {
            Some(text) if !text.is_empty() => FieldValue::String(text),
            _ => FieldValue::Null,
        });
    }
    if matches!(field.kind, FieldKind::Integer | FieldKind::Integer64)
        && matches!(field.storage, NcType::Int64 | NcType::UInt64)
    {
        // Wide integers lose precision through doubles
        let data = store.read(field.var_id, &[fid], &[1], NcType::Int64)?;
        if let ArrayData::Int64(v) = data {
            let value = v.first().copied().unwrap_or_default();
            if field.nodata == Some(value as f64) {
                return Ok(FieldValue::Null);
            }
            return Ok(FieldValue::Integer(value));
        }
    }

    let value = read_number(store, field.var_id, fid)?;
    if is_nodata(value, field.nodata) {
        return Ok(FieldValue::Null);
    }
    Ok(match field.kind {
        FieldKind::Integer | FieldKind::Integer64 => FieldValue::Integer(value as i64),
        FieldKind::Date => Duration::try_days(value.floor() as i64)
            .and_then(|days| epoch().checked_add_signed(days))
            .map_or(FieldValue::Null, FieldValue::Date),
        FieldKind::DateTime => {
            let secs = value.floor();
            let nanos = ((value - secs) * 1e9).round() as u32;
            DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
                .map_or(FieldValue::Null, FieldValue::DateTime)
        }
        _ => FieldValue::Real(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Format, MemoryStore};

    fn stations() -> Box<dyn ArrayStore> {
        let mut store = MemoryStore::create("stations.nc", Format::Nc4);
        let rec = store.def_dim("record", 0).unwrap();
        let text = store.def_dim("name_len", 8).unwrap();
        let lon = store.def_var("lon", NcType::Double, &[rec]).unwrap();
        store
            .put_attr(AttrOwner::Var(lon), "standard_name", "longitude".into())
            .unwrap();
        let lat = store.def_var("lat", NcType::Double, &[rec]).unwrap();
        store
            .put_attr(AttrOwner::Var(lat), "standard_name", "latitude".into())
            .unwrap();
        let name = store.def_var("name", NcType::Char, &[rec, text]).unwrap();
        let count = store.def_var("count", NcType::Short, &[rec]).unwrap();
        store
            .put_attr(AttrOwner::Var(count), "_FillValue", ArrayData::Short(vec![-1]).into())
            .unwrap();
        store
            .put_attr(AttrOwner::Var(count), "coordinates", "lon lat".into())
            .unwrap();
        let day = store.def_var("day", NcType::Double, &[rec]).unwrap();
        store
            .put_attr(AttrOwner::Var(day), FIELD_TYPE_ATTR, "Date".into())
            .unwrap();
        store.enddef().unwrap();

        store
            .write(lon, &[0], &[2], &ArrayData::Double(vec![2.35, -0.13]))
            .unwrap();
        store
            .write(lat, &[0], &[2], &ArrayData::Double(vec![48.85, 51.51]))
            .unwrap();
        let names = b"Paris\0\0\0London\0\0".to_vec();
        store
            .write(name, &[0, 0], &[2, 8], &ArrayData::Char(names))
            .unwrap();
        store
            .write(count, &[0], &[2], &ArrayData::Short(vec![12, -1]))
            .unwrap();
        store
            .write(day, &[0], &[2], &ArrayData::Double(vec![0.0, 365.0]))
            .unwrap();
        Box::new(store)
    }

    #[test]
    fn test_field_inference() {
        let layer = VectorLayer::open(stations()).unwrap();
        let names: Vec<&str> = layer.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "count", "day"]);
        assert_eq!(layer.fields()[0].kind, FieldKind::String { width: Some(8) });
        assert_eq!(layer.fields()[1].kind, FieldKind::Integer);
        assert_eq!(layer.fields()[1].nodata, Some(-1.0));
        assert_eq!(layer.fields()[2].kind, FieldKind::Date);
        assert_eq!(layer.feature_count(), 2);
        assert!(layer.has_geometry());
        assert_eq!(layer.name(), "stations");
    }

    #[test]
    fn test_feature_values() {
        let mut layer = VectorLayer::open(stations()).unwrap();
        let first = layer.next_feature().unwrap().unwrap();
        assert_eq!(first.field(0), Some(&FieldValue::String("Paris".to_string())));
        assert_eq!(first.field(1), Some(&FieldValue::Integer(12)));
        assert_eq!(
            first.field(2),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()))
        );
        assert_eq!(
            first.geometry,
            Some(Geometry::Point {
                x: 2.35,
                y: 48.85,
                z: None
            })
        );

        let second = layer.next_feature().unwrap().unwrap();
        assert!(second.field(1).unwrap().is_null());
        assert_eq!(
            second.field(2),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(1971, 1, 1).unwrap()))
        );
        assert!(layer.next_feature().unwrap().is_none());

        layer.reset_reading();
        assert_eq!(layer.count(), 2);
    }

    #[test]
    fn test_storage_kinds() {
        assert_eq!(FieldKind::from_storage(NcType::UInt, None), FieldKind::Integer64);
        assert_eq!(
            FieldKind::from_storage(NcType::String, None),
            FieldKind::String { width: None }
        );
        assert_eq!(FieldKind::from_override("DateTime", None), Some(FieldKind::DateTime));
        assert_eq!(FieldKind::from_override("Polygon", None), None);
    }

    #[test]
    fn test_no_record_dimension() {
        let mut store = MemoryStore::create("grid.nc", Format::Nc);
        store.def_dim("x", 4).unwrap();
        assert!(matches!(
            VectorLayer::open(Box::new(store)),
            Err(NetCdfError::InvalidFormat(_))
        ));
    }
}
