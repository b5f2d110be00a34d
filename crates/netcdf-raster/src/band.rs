//! Raster bands: one 2D slice of a raster variable.

use std::sync::Arc;

use tracing::debug;

use crate::access::{ContainerAccess, ContainerState, Mode};
use crate::attributes::{decode, is_band_denied, numeric_attr, text_attr, write_item};
use crate::block::{
    apply_validity_data, compact_block, needs_longitude_shift, repack_block,
    shift_longitudes_data, BlockLayout, Validity, Window,
};
use crate::diagnostics::DiagnosticDomain;
use crate::error::{NetCdfError, NetCdfResult};
use crate::georef::heuristics;
use crate::indexer::{coordinate_label, DimensionIndexer};
use crate::metadata::MetadataMap;
use crate::store::{default_fill, ArrayData, ArrayStore, AttrOwner, AttrValue, Format, NcType};

/// Layout of a raster variable shared by all of its bands.
#[derive(Debug, Clone)]
pub struct RasterShape {
    pub var_id: usize,
    pub var_name: String,
    /// Stored element type of the variable
    pub var_type: NcType,
    pub ndims: usize,
    pub x_axis: usize,
    pub y_axis: usize,
    pub width: usize,
    pub height: usize,
    pub indexer: DimensionIndexer,
    pub bottom_up: bool,
}

impl RasterShape {
    /// Start/count for `window` of the slice at `level`.
    fn hyperslab(&self, level: usize, window: &Window) -> NetCdfResult<(Vec<usize>, Vec<usize>)> {
        let (mut start, mut count) = self.indexer.start_count(level, self.ndims)?;
        start[self.x_axis] = window.x_start;
        count[self.x_axis] = window.width;
        start[self.y_axis] = window.y_start;
        count[self.y_axis] = window.height;
        Ok((start, count))
    }
}

/// Element type used to transfer a byte variable.
///
/// `_Unsigned` wins, then a `valid_range` of exactly `{0,255}` or
/// `{-128,127}`, then the format default: netCDF-3 bytes are unsigned,
/// netCDF-4 bytes signed.
pub fn resolve_byte_type(store: &dyn ArrayStore, var: usize, var_type: NcType) -> NcType {
    if var_type != NcType::Byte {
        return var_type;
    }
    let owner = AttrOwner::Var(var);
    if let Some(flag) = text_attr(store, owner, "_Unsigned") {
        return if flag.trim().eq_ignore_ascii_case("true") {
            NcType::UByte
        } else {
            NcType::Byte
        };
    }
    if let Some(range) = numeric_attr(store, owner, "valid_range") {
        if range == [0.0, 255.0] {
            return NcType::UByte;
        }
        if range == [-128.0, 127.0] {
            return NcType::Byte;
        }
    }
    if store.format().is_netcdf4() {
        NcType::Byte
    } else {
        NcType::UByte
    }
}

/// Storage type of a new band and the attributes that pin its byte
/// signedness for [`resolve_byte_type`].
///
/// Unsigned bytes without the enhanced model are stored as `NC_BYTE` with
/// `_Unsigned = "true"`. Signed bytes are flagged where the format default
/// is unsigned.
pub fn byte_storage(
    data_type: NcType,
    format: Format,
) -> (NcType, Vec<(&'static str, AttrValue)>) {
    match data_type {
        NcType::UByte if !format.has_enhanced_model() => (
            NcType::Byte,
            vec![
                ("_Unsigned", AttrValue::text("true")),
                ("valid_range", AttrValue::Values(ArrayData::Short(vec![0, 255]))),
            ],
        ),
        NcType::Byte if !format.is_netcdf4() => {
            (NcType::Byte, vec![("_Unsigned", AttrValue::text("false"))])
        }
        _ => (data_type, Vec::new()),
    }
}

/// Reinterpret a value stored in a signed byte attribute for an unsigned
/// band.
fn as_unsigned_byte(v: f64) -> f64 {
    if (-128.0..0.0).contains(&v) {
        v + 256.0
    } else {
        v
    }
}

fn type_bounds(t: NcType) -> (f64, f64) {
    match t {
        NcType::Byte => (i8::MIN as f64, i8::MAX as f64),
        NcType::UByte | NcType::Char => (0.0, u8::MAX as f64),
        NcType::Short => (i16::MIN as f64, i16::MAX as f64),
        NcType::UShort => (0.0, u16::MAX as f64),
        NcType::Int => (i32::MIN as f64, i32::MAX as f64),
        NcType::UInt => (0.0, u32::MAX as f64),
        NcType::Int64 => (i64::MIN as f64, i64::MAX as f64),
        NcType::UInt64 => (0.0, u64::MAX as f64),
        NcType::Float => (f32::MIN as f64, f32::MAX as f64),
        NcType::Double | NcType::String => (f64::MIN, f64::MAX),
    }
}

/// One band of a raster dataset.
pub struct RasterBand {
    access: Arc<ContainerAccess>,
    shape: Arc<RasterShape>,
    level: usize,
    data_type: NcType,
    nodata: Option<f64>,
    valid_range: Option<(f64, f64)>,
    scale: Option<f64>,
    offset: Option<f64>,
    unit_type: Option<String>,
    block_width: usize,
    block_height: usize,
    check_longitude: bool,
    metadata: MetadataMap,
}

impl std::fmt::Debug for RasterBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBand")
            .field("variable", &self.shape.var_name)
            .field("level", &self.level)
            .field("data_type", &self.data_type)
            .field("nodata", &self.nodata)
            .finish()
    }
}

impl RasterBand {
    /// Build band `level` of `shape` from the variable's attributes.
    pub(crate) fn discover(
        state: &mut ContainerState,
        access: Arc<ContainerAccess>,
        shape: Arc<RasterShape>,
        level: usize,
    ) -> NetCdfResult<Self> {
        let store = state.store.as_ref();
        let var = shape.var_id;
        let owner = AttrOwner::Var(var);
        let info = store.variable(var)?;

        let data_type = resolve_byte_type(store, var, info.nc_type);
        let unsigned_byte = info.nc_type == NcType::Byte && data_type == NcType::UByte;
        let adjust = |v: f64| if unsigned_byte { as_unsigned_byte(v) } else { v };

        let nodata = numeric_attr(store, owner, "_FillValue")
            .or_else(|| numeric_attr(store, owner, "missing_value"))
            .and_then(|v| v.first().copied())
            .map(adjust)
            .unwrap_or_else(|| adjust(default_fill(info.nc_type)));

        let valid_range = match numeric_attr(store, owner, "valid_range") {
            Some(r) if r.len() >= 2 => Some((adjust(r[0]), adjust(r[1]))),
            _ => {
                let lo = numeric_attr(store, owner, "valid_min").and_then(|v| v.first().copied());
                let hi = numeric_attr(store, owner, "valid_max").and_then(|v| v.first().copied());
                let (tmin, tmax) = type_bounds(data_type);
                match (lo, hi) {
                    (None, None) => None,
                    (lo, hi) => Some((
                        lo.map(adjust).unwrap_or(tmin),
                        hi.map(adjust).unwrap_or(tmax),
                    )),
                }
            }
        }
        .filter(|(lo, hi)| *lo != nodata && *hi != nodata);

        let scale = numeric_attr(store, owner, "scale_factor").and_then(|v| v.first().copied());
        let offset = numeric_attr(store, owner, "add_offset").and_then(|v| v.first().copied());
        let unit_type = text_attr(store, owner, "units");

        let (mut block_width, mut block_height) = match &info.chunking {
            Some(chunks) => (chunks[shape.x_axis], chunks[shape.y_axis]),
            None => (shape.width, 1),
        };
        if shape.bottom_up && block_height != 1 {
            block_width = shape.width;
            block_height = 1;
        }

        let check_longitude = heuristics::is_longitude(store, var);

        let mut metadata = MetadataMap::new();
        metadata.set("NETCDF_VARNAME", shape.var_name.as_str());
        if !shape.indexer.dims().is_empty() {
            state.ensure_mode(Mode::Data)?;
            let coords = shape.indexer.decode(level)?;
            for (dim, c) in shape.indexer.dims().iter().zip(coords) {
                metadata.set(
                    format!("NETCDF_DIM_{}", dim.name),
                    coordinate_label(state.store.as_ref(), &dim.name, c),
                );
            }
        }
        let store = state.store.as_ref();
        for name in store.attr_names(owner)? {
            if let Some(value) = store.get_attr(owner, &name)? {
                metadata.set(name, decode(&value).text);
            }
        }

        debug!(
            variable = %shape.var_name,
            band = level + 1,
            data_type = ?data_type,
            block_width,
            block_height,
            "Discovered band"
        );

        Ok(Self {
            access,
            shape,
            level,
            data_type,
            nodata: Some(nodata),
            valid_range,
            scale,
            offset,
            unit_type,
            block_width,
            block_height,
            check_longitude,
            metadata,
        })
    }

    /// 1-based band number.
    pub fn number(&self) -> usize {
        self.level + 1
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn var_id(&self) -> usize {
        self.shape.var_id
    }

    pub fn variable_name(&self) -> &str {
        &self.shape.var_name
    }

    /// Element type of block buffers.
    pub fn data_type(&self) -> NcType {
        self.data_type
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn valid_range(&self) -> Option<(f64, f64)> {
        self.valid_range
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn unit_type(&self) -> Option<&str> {
        self.unit_type.as_deref()
    }

    pub fn block_size(&self) -> (usize, usize) {
        (self.block_width, self.block_height)
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)
    }

    pub fn layout(&self) -> BlockLayout {
        BlockLayout {
            raster_width: self.shape.width,
            raster_height: self.shape.height,
            block_width: self.block_width,
            block_height: self.block_height,
            bottom_up: self.shape.bottom_up,
        }
    }

    fn validity(&self) -> Validity {
        Validity {
            nodata: self.nodata,
            nan_check: self.data_type.is_float(),
            valid_range: self.valid_range,
        }
    }

    fn fill_value(&self) -> f64 {
        self.nodata.unwrap_or_else(|| default_fill(self.data_type))
    }

    fn read_window(
        &self,
        state: &mut ContainerState,
        window: &Window,
        layout: &BlockLayout,
    ) -> NetCdfResult<ArrayData> {
        let (start, count) = self.shape.hyperslab(self.level, window)?;
        state.ensure_mode(Mode::Data)?;
        let mut data = state
            .store
            .read(self.shape.var_id, &start, &count, self.data_type)?;

        let shift = if self.check_longitude && state.longitude_check_pending {
            state.longitude_check_pending = false;
            needs_longitude_shift(&data)
        } else {
            false
        };

        repack_block(&mut data, window, layout, self.fill_value());
        apply_validity_data(&mut data, &self.validity());
        if shift {
            debug!(variable = %self.shape.var_name, "Shifting longitudes by -360");
            shift_longitudes_data(&mut data, self.nodata);
        }
        Ok(data)
    }

    /// Read block `(col, row)` into a nominal-size buffer.
    pub fn read_block(&self, col: usize, row: usize) -> NetCdfResult<ArrayData> {
        let layout = self.layout();
        let window = layout.plan_window(col, row)?;
        let mut guard = self.access.lock();
        self.read_window(&mut guard, &window, &layout)
    }

    /// Read one full scanline, row 0 being the top of the raster.
    pub fn read_row(&self, row: usize) -> NetCdfResult<ArrayData> {
        let layout = self.row_layout();
        let window = layout.plan_window(0, row)?;
        let mut guard = self.access.lock();
        self.read_window(&mut guard, &window, &layout)
    }

    fn row_layout(&self) -> BlockLayout {
        BlockLayout {
            block_width: self.shape.width,
            block_height: 1,
            ..self.layout()
        }
    }

    fn write_window(
        &self,
        state: &mut ContainerState,
        window: &Window,
        layout: &BlockLayout,
        data: &ArrayData,
    ) -> NetCdfResult<()> {
        if data.len() != layout.block_len() {
            return Err(NetCdfError::OutOfRange(format!(
                "buffer of {} elements for a {}x{} block",
                data.len(),
                layout.block_width,
                layout.block_height
            )));
        }
        let typed = data.convert(self.data_type)?;
        let clipped = if window.width < layout.block_width || window.height < layout.block_height
        {
            compact_block(&typed, window, layout)
        } else {
            typed
        };
        let (start, count) = self.shape.hyperslab(self.level, window)?;

        state.attach_references(self.shape.var_id)?;
        state.ensure_mode(Mode::Data)?;
        state.store.write(self.shape.var_id, &start, &count, &clipped)?;
        state.mark_written(self.shape.var_id);
        Ok(())
    }

    /// Write block `(col, row)` from a nominal-size buffer.
    pub fn write_block(&self, col: usize, row: usize, data: &ArrayData) -> NetCdfResult<()> {
        let layout = self.layout();
        let window = layout.plan_window(col, row)?;
        let mut guard = self.access.lock();
        self.write_window(&mut guard, &window, &layout, data)
    }

    /// Write one full scanline, row 0 being the top of the raster.
    pub fn write_row(&self, row: usize, data: &ArrayData) -> NetCdfResult<()> {
        let layout = self.row_layout();
        let window = layout.plan_window(0, row)?;
        let mut guard = self.access.lock();
        self.write_window(&mut guard, &window, &layout, data)
    }

    /// Put a variable attribute, entering define mode.
    fn put_attr(
        &self,
        state: &mut ContainerState,
        name: &str,
        value: AttrValue,
    ) -> NetCdfResult<()> {
        state.ensure_mode(Mode::Define)?;
        state
            .store
            .put_attr(AttrOwner::Var(self.shape.var_id), name, value)?;
        Ok(())
    }

    /// Set `_FillValue`.
    ///
    /// Fails once data has been written to a netCDF-4 variable. Changing it
    /// in data mode before any write only warns.
    pub fn set_nodata(&mut self, value: f64) -> NetCdfResult<()> {
        let var = self.shape.var_id;
        let mut guard = self.access.lock();
        let format = guard.store.format();

        if guard.has_written(var) && format.is_netcdf4() {
            return Err(NetCdfError::Precondition(format!(
                "_FillValue of {} cannot change after data was written",
                self.shape.var_name
            )));
        }
        if guard.mode() == Mode::Data && !guard.has_written(var) {
            guard.diagnostics.warn(
                DiagnosticDomain::BlockIo,
                format!(
                    "Setting _FillValue of {} outside define mode",
                    self.shape.var_name
                ),
            );
        }

        let attr = ArrayData::from_f64(self.data_type, &[value]).convert(self.shape.var_type)?;
        self.put_attr(&mut guard, "_FillValue", AttrValue::Values(attr))?;
        self.nodata = Some(value);
        self.metadata.set("_FillValue", decode(&AttrValue::double(value)).text);
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f64) -> NetCdfResult<()> {
        let mut guard = self.access.lock();
        self.put_attr(&mut guard, "scale_factor", AttrValue::double(scale))?;
        self.scale = Some(scale);
        Ok(())
    }

    pub fn set_offset(&mut self, offset: f64) -> NetCdfResult<()> {
        let mut guard = self.access.lock();
        self.put_attr(&mut guard, "add_offset", AttrValue::double(offset))?;
        self.offset = Some(offset);
        Ok(())
    }

    pub fn set_unit_type(&mut self, units: &str) -> NetCdfResult<()> {
        let mut guard = self.access.lock();
        self.put_attr(&mut guard, "units", AttrValue::text(units))?;
        self.unit_type = Some(units.to_string());
        Ok(())
    }

    /// Set a band metadata item, persisting it as an auto-typed attribute
    /// unless it is derived state.
    pub fn set_metadata_item(&mut self, key: &str, value: &str) -> NetCdfResult<()> {
        if !is_band_denied(key) {
            let mut guard = self.access.lock();
            guard.ensure_mode(Mode::Define)?;
            write_item(
                guard.store.as_mut(),
                AttrOwner::Var(self.shape.var_id),
                key,
                value,
            )?;
        }
        self.metadata.set(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Format, MemoryStore};

    fn byte_store(format: Format, attrs: &[(&str, AttrValue)]) -> (MemoryStore, usize) {
        let mut store = MemoryStore::create("b.nc", format);
        let y = store.def_dim("y", 1).unwrap();
        let x = store.def_dim("x", 2).unwrap();
        let v = store.def_var("b", NcType::Byte, &[y, x]).unwrap();
        for (k, val) in attrs {
            store.put_attr(AttrOwner::Var(v), k, val.clone()).unwrap();
        }
        (store, v)
    }

    #[test]
    fn test_byte_sign_from_valid_range() {
        let range = AttrValue::Values(ArrayData::Short(vec![0, 255]));
        let (store, v) = byte_store(Format::Nc4, &[("valid_range", range)]);
        assert_eq!(resolve_byte_type(&store, v, NcType::Byte), NcType::UByte);

        let range = AttrValue::Values(ArrayData::Short(vec![-128, 127]));
        let (store, v) = byte_store(Format::Nc, &[("valid_range", range)]);
        assert_eq!(resolve_byte_type(&store, v, NcType::Byte), NcType::Byte);
    }

    #[test]
    fn test_unsigned_flag_overrides_range() {
        let range = AttrValue::Values(ArrayData::Short(vec![-128, 127]));
        let (store, v) = byte_store(
            Format::Nc,
            &[("valid_range", range), ("_Unsigned", AttrValue::text("true"))],
        );
        assert_eq!(resolve_byte_type(&store, v, NcType::Byte), NcType::UByte);
    }

    #[test]
    fn test_byte_format_default() {
        let (store, v) = byte_store(Format::Nc, &[]);
        assert_eq!(resolve_byte_type(&store, v, NcType::Byte), NcType::UByte);
        let (store, v) = byte_store(Format::Nc4, &[]);
        assert_eq!(resolve_byte_type(&store, v, NcType::Byte), NcType::Byte);
    }

    #[test]
    fn test_non_byte_types_unchanged() {
        let (store, v) = byte_store(Format::Nc, &[]);
        assert_eq!(resolve_byte_type(&store, v, NcType::Short), NcType::Short);
    }

    #[test]
    fn test_byte_storage_markers() {
        let (storage, attrs) = byte_storage(NcType::UByte, Format::Nc4Classic);
        assert_eq!(storage, NcType::Byte);
        let (store, v) = byte_store(Format::Nc4Classic, &attrs);
        assert_eq!(resolve_byte_type(&store, v, storage), NcType::UByte);

        let (storage, attrs) = byte_storage(NcType::Byte, Format::Nc);
        assert_eq!(attrs[0], ("_Unsigned", AttrValue::text("false")));
        let (store, v) = byte_store(Format::Nc, &attrs);
        assert_eq!(resolve_byte_type(&store, v, storage), NcType::Byte);

        assert_eq!(byte_storage(NcType::UByte, Format::Nc4), (NcType::UByte, Vec::new()));
        assert!(byte_storage(NcType::Byte, Format::Nc4Classic).1.is_empty());
        assert!(byte_storage(NcType::Short, Format::Nc).1.is_empty());
    }

    #[test]
    fn test_unsigned_reinterpretation() {
        assert_eq!(as_unsigned_byte(-1.0), 255.0);
        assert_eq!(as_unsigned_byte(-127.0), 129.0);
        assert_eq!(as_unsigned_byte(12.0), 12.0);
    }
}
