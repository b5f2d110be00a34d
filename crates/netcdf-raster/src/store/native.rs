//! Array store backed by libnetcdf through the `netcdf` crate.
//!
//! The library manages define mode internally, so `redef`/`enddef` only
//! track the mode for the driver's bookkeeping. Dimension renaming and
//! text variable transfer are not exposed by the bindings and report
//! [`StoreError::Unsupported`].

use std::io::Read;
use std::ops::Range;
use std::path::Path;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;

use super::{
    ArrayData, ArrayStore, AttrOwner, AttrValue, DimInfo, Format, NcType, StoreError,
    StoreResult, VarInfo,
};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library reports every failed lookup on stderr even when the
/// caller handles it, e.g. probing for an optional attribute. Safe to call
/// repeatedly; only the first call has an effect. Call it before the first
/// container is opened.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable automatic error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

enum Handle {
    Read(netcdf::File),
    Write(netcdf::FileMut),
}

impl Handle {
    fn file(&self) -> &netcdf::File {
        match self {
            Handle::Read(f) => f,
            Handle::Write(f) => f,
        }
    }
}

/// netCDF container on disk.
pub struct NativeStore {
    path: String,
    format: Format,
    handle: Handle,
    define_mode: bool,
}

fn native_err(e: netcdf::Error) -> StoreError {
    StoreError::Native(e.to_string())
}

/// Detect the container generation from its magic number.
fn sniff_format(path: &Path) -> StoreResult<Format> {
    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map_err(|e| StoreError::Native(format!("{}: {}", path.display(), e)))?;
    match &magic {
        b"CDF\x01" => Ok(Format::Nc),
        b"CDF\x02" | b"CDF\x05" => Ok(Format::Nc2),
        b"\x89HDF" => Ok(Format::Nc4),
        _ => Err(StoreError::Native(format!(
            "{} is not a netCDF container",
            path.display()
        ))),
    }
}

fn nc_type_of(vartype: &NcVariableType) -> StoreResult<NcType> {
    Ok(match vartype {
        NcVariableType::Int(IntType::I8) => NcType::Byte,
        NcVariableType::Int(IntType::U8) => NcType::UByte,
        NcVariableType::Int(IntType::I16) => NcType::Short,
        NcVariableType::Int(IntType::U16) => NcType::UShort,
        NcVariableType::Int(IntType::I32) => NcType::Int,
        NcVariableType::Int(IntType::U32) => NcType::UInt,
        NcVariableType::Int(IntType::I64) => NcType::Int64,
        NcVariableType::Int(IntType::U64) => NcType::UInt64,
        NcVariableType::Float(FloatType::F32) => NcType::Float,
        NcVariableType::Float(FloatType::F64) => NcType::Double,
        NcVariableType::Char => NcType::Char,
        NcVariableType::String => NcType::String,
        other => {
            return Err(StoreError::Unsupported(format!(
                "variable type {:?}",
                other
            )))
        }
    })
}

fn attr_from_native(value: AttributeValue) -> AttrValue {
    match value {
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Strs(v) => AttrValue::Values(ArrayData::Str(v)),
        AttributeValue::Schar(v) => AttrValue::Values(ArrayData::Byte(vec![v])),
        AttributeValue::Schars(v) => AttrValue::Values(ArrayData::Byte(v)),
        AttributeValue::Uchar(v) => AttrValue::Values(ArrayData::UByte(vec![v])),
        AttributeValue::Uchars(v) => AttrValue::Values(ArrayData::UByte(v)),
        AttributeValue::Short(v) => AttrValue::Values(ArrayData::Short(vec![v])),
        AttributeValue::Shorts(v) => AttrValue::Values(ArrayData::Short(v)),
        AttributeValue::Ushort(v) => AttrValue::Values(ArrayData::UShort(vec![v])),
        AttributeValue::Ushorts(v) => AttrValue::Values(ArrayData::UShort(v)),
        AttributeValue::Int(v) => AttrValue::Values(ArrayData::Int(vec![v])),
        AttributeValue::Ints(v) => AttrValue::Values(ArrayData::Int(v)),
        AttributeValue::Uint(v) => AttrValue::Values(ArrayData::UInt(vec![v])),
        AttributeValue::Uints(v) => AttrValue::Values(ArrayData::UInt(v)),
        AttributeValue::Longlong(v) => AttrValue::Values(ArrayData::Int64(vec![v])),
        AttributeValue::Longlongs(v) => AttrValue::Values(ArrayData::Int64(v)),
        AttributeValue::Ulonglong(v) => AttrValue::Values(ArrayData::UInt64(vec![v])),
        AttributeValue::Ulonglongs(v) => AttrValue::Values(ArrayData::UInt64(v)),
        AttributeValue::Float(v) => AttrValue::Values(ArrayData::Float(vec![v])),
        AttributeValue::Floats(v) => AttrValue::Values(ArrayData::Float(v)),
        AttributeValue::Double(v) => AttrValue::Values(ArrayData::Double(vec![v])),
        AttributeValue::Doubles(v) => AttrValue::Values(ArrayData::Double(v)),
    }
}

fn attr_to_native(value: AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(s) => AttributeValue::Str(s),
        AttrValue::Values(data) => match data {
            ArrayData::Byte(v) => AttributeValue::Schars(v),
            ArrayData::Char(v) => AttributeValue::Str(String::from_utf8_lossy(&v).into_owned()),
            ArrayData::Short(v) => AttributeValue::Shorts(v),
            ArrayData::Int(v) => AttributeValue::Ints(v),
            ArrayData::Float(v) => AttributeValue::Floats(v),
            ArrayData::Double(v) => AttributeValue::Doubles(v),
            ArrayData::UByte(v) => AttributeValue::Uchars(v),
            ArrayData::UShort(v) => AttributeValue::Ushorts(v),
            ArrayData::UInt(v) => AttributeValue::Uints(v),
            ArrayData::Int64(v) => AttributeValue::Longlongs(v),
            ArrayData::UInt64(v) => AttributeValue::Ulonglongs(v),
            ArrayData::Str(v) => AttributeValue::Strs(v),
        },
    }
}

fn extents(start: &[usize], count: &[usize]) -> Vec<netcdf::Extent> {
    start
        .iter()
        .zip(count)
        .map(|(&s, &c)| Range { start: s, end: s + c }.into())
        .collect()
}

impl NativeStore {
    /// Open an existing container read-only.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let format = sniff_format(path)?;
        let file = netcdf::open(path).map_err(native_err)?;
        Ok(Self {
            path: path.display().to_string(),
            format,
            handle: Handle::Read(file),
            define_mode: false,
        })
    }

    /// Create a new container, replacing any existing file.
    pub fn create(path: impl AsRef<Path>, format: Format) -> StoreResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let options = match format {
            Format::Nc => netcdf::Options::empty(),
            Format::Nc2 => netcdf::Options::_64BIT_OFFSET,
            Format::Nc4 => netcdf::Options::NETCDF4,
            Format::Nc4Classic => netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC,
        };
        let file = netcdf::create_with(path, options).map_err(native_err)?;
        Ok(Self {
            path: path.display().to_string(),
            format,
            handle: Handle::Write(file),
            define_mode: true,
        })
    }

    fn file_mut(&mut self) -> StoreResult<&mut netcdf::FileMut> {
        match &mut self.handle {
            Handle::Write(f) => Ok(f),
            Handle::Read(_) => Err(StoreError::Unsupported(
                "container was opened read-only".to_string(),
            )),
        }
    }

    fn var_name(&self, id: usize) -> StoreResult<String> {
        self.handle
            .file()
            .variables()
            .nth(id)
            .map(|v| v.name())
            .ok_or_else(|| StoreError::NotFound(format!("variable id {}", id)))
    }

    fn dim_name(&self, id: usize) -> StoreResult<String> {
        self.handle
            .file()
            .dimensions()
            .nth(id)
            .map(|d| d.name())
            .ok_or_else(|| StoreError::NotFound(format!("dimension id {}", id)))
    }
}

impl ArrayStore for NativeStore {
    fn path(&self) -> &str {
        &self.path
    }

    fn format(&self) -> Format {
        self.format
    }

    fn dimensions(&self) -> Vec<DimInfo> {
        self.handle
            .file()
            .dimensions()
            .enumerate()
            .map(|(id, d)| DimInfo {
                id,
                name: d.name(),
                len: d.len(),
                unlimited: d.is_unlimited(),
            })
            .collect()
    }

    fn dimension(&self, id: usize) -> StoreResult<DimInfo> {
        self.dimensions()
            .into_iter()
            .nth(id)
            .ok_or_else(|| StoreError::NotFound(format!("dimension id {}", id)))
    }

    fn dim_id(&self, name: &str) -> Option<usize> {
        self.handle
            .file()
            .dimensions()
            .position(|d| d.name() == name)
    }

    fn def_dim(&mut self, name: &str, len: usize) -> StoreResult<usize> {
        if !self.define_mode {
            return Err(StoreError::NotInDefineMode);
        }
        if self.dim_id(name).is_some() {
            return Err(StoreError::NameInUse(name.to_string()));
        }
        let file = self.file_mut()?;
        if len == 0 {
            file.add_unlimited_dimension(name).map_err(native_err)?;
        } else {
            file.add_dimension(name, len).map_err(native_err)?;
        }
        self.dim_id(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn rename_dim(&mut self, _id: usize, name: &str) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!("renaming dimension to {}", name)))
    }

    fn variables(&self) -> Vec<VarInfo> {
        (0..self.handle.file().variables().count())
            .filter_map(|id| self.variable(id).ok())
            .collect()
    }

    fn variable(&self, id: usize) -> StoreResult<VarInfo> {
        let file = self.handle.file();
        let var = file
            .variables()
            .nth(id)
            .ok_or_else(|| StoreError::NotFound(format!("variable id {}", id)))?;
        let dims = var
            .dimensions()
            .iter()
            .filter_map(|d| self.dim_id(&d.name()))
            .collect();
        Ok(VarInfo {
            id,
            name: var.name(),
            nc_type: nc_type_of(&var.vartype())?,
            dims,
            chunking: var.chunking().ok().flatten(),
        })
    }

    fn var_id(&self, name: &str) -> Option<usize> {
        self.handle
            .file()
            .variables()
            .position(|v| v.name() == name)
    }

    fn def_var(&mut self, name: &str, nc_type: NcType, dims: &[usize]) -> StoreResult<usize> {
        if !self.define_mode {
            return Err(StoreError::NotInDefineMode);
        }
        let dim_names = dims
            .iter()
            .map(|&d| self.dim_name(d))
            .collect::<StoreResult<Vec<_>>>()?;
        let dim_refs: Vec<&str> = dim_names.iter().map(String::as_str).collect();
        let file = self.file_mut()?;
        let result = match nc_type {
            NcType::Byte => file.add_variable::<i8>(name, &dim_refs).map(|_| ()),
            NcType::UByte => file.add_variable::<u8>(name, &dim_refs).map(|_| ()),
            NcType::Short => file.add_variable::<i16>(name, &dim_refs).map(|_| ()),
            NcType::UShort => file.add_variable::<u16>(name, &dim_refs).map(|_| ()),
            NcType::Int => file.add_variable::<i32>(name, &dim_refs).map(|_| ()),
            NcType::UInt => file.add_variable::<u32>(name, &dim_refs).map(|_| ()),
            NcType::Int64 => file.add_variable::<i64>(name, &dim_refs).map(|_| ()),
            NcType::UInt64 => file.add_variable::<u64>(name, &dim_refs).map(|_| ()),
            NcType::Float => file.add_variable::<f32>(name, &dim_refs).map(|_| ()),
            NcType::Double => file.add_variable::<f64>(name, &dim_refs).map(|_| ()),
            NcType::String => file.add_string_variable(name, &dim_refs).map(|_| ()),
            NcType::Char => {
                return Err(StoreError::Unsupported(format!(
                    "text variable {} in native store",
                    name
                )))
            }
        };
        result.map_err(native_err)?;
        self.var_id(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn set_chunking(&mut self, var: usize, chunks: &[usize]) -> StoreResult<()> {
        if !self.format.is_netcdf4() {
            return Err(StoreError::Unsupported(
                "chunking requires a netCDF-4 container".to_string(),
            ));
        }
        let name = self.var_name(var)?;
        let file = self.file_mut()?;
        let mut v = file
            .variable_mut(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        v.set_chunking(chunks).map_err(native_err)
    }

    fn attr_names(&self, owner: AttrOwner) -> StoreResult<Vec<String>> {
        let file = self.handle.file();
        match owner {
            AttrOwner::Global => Ok(file.attributes().map(|a| a.name().to_string()).collect()),
            AttrOwner::Var(id) => {
                let name = self.var_name(id)?;
                let var = file
                    .variable(&name)
                    .ok_or_else(|| StoreError::NotFound(name.clone()))?;
                Ok(var.attributes().map(|a| a.name().to_string()).collect())
            }
        }
    }

    fn get_attr(&self, owner: AttrOwner, name: &str) -> StoreResult<Option<AttrValue>> {
        // Probe the names first; a failed lookup makes HDF5 noisy.
        if !self.attr_names(owner)?.iter().any(|n| n == name) {
            return Ok(None);
        }
        let file = self.handle.file();
        let value = match owner {
            AttrOwner::Global => file
                .attribute(name)
                .map(|a| a.value())
                .transpose()
                .map_err(native_err)?,
            AttrOwner::Var(id) => {
                let var_name = self.var_name(id)?;
                let var = file
                    .variable(&var_name)
                    .ok_or_else(|| StoreError::NotFound(var_name.clone()))?;
                var.attribute(name)
                    .map(|a| a.value())
                    .transpose()
                    .map_err(native_err)?
            }
        };
        Ok(value.map(attr_from_native))
    }

    fn put_attr(&mut self, owner: AttrOwner, name: &str, value: AttrValue) -> StoreResult<()> {
        let native = attr_to_native(value);
        match owner {
            AttrOwner::Global => {
                let file = self.file_mut()?;
                file.add_attribute(name, native).map_err(native_err)?;
            }
            AttrOwner::Var(id) => {
                let var_name = self.var_name(id)?;
                let file = self.file_mut()?;
                let mut var = file
                    .variable_mut(&var_name)
                    .ok_or_else(|| StoreError::NotFound(var_name.clone()))?;
                var.put_attribute(name, native).map_err(|e| {
                    if name == "_FillValue" {
                        StoreError::LateFill(var_name.clone())
                    } else {
                        native_err(e)
                    }
                })?;
            }
        }
        Ok(())
    }

    fn read(
        &self,
        var: usize,
        start: &[usize],
        count: &[usize],
        mem_type: NcType,
    ) -> StoreResult<ArrayData> {
        let name = self.var_name(var)?;
        let v = self
            .handle
            .file()
            .variable(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        let ext = extents(start, count);
        let ext = ext.as_slice();
        let data = match nc_type_of(&v.vartype())? {
            NcType::Byte => ArrayData::Byte(v.get_values::<i8, _>(ext).map_err(native_err)?),
            NcType::UByte => ArrayData::UByte(v.get_values::<u8, _>(ext).map_err(native_err)?),
            NcType::Short => ArrayData::Short(v.get_values::<i16, _>(ext).map_err(native_err)?),
            NcType::UShort => {
                ArrayData::UShort(v.get_values::<u16, _>(ext).map_err(native_err)?)
            }
            NcType::Int => ArrayData::Int(v.get_values::<i32, _>(ext).map_err(native_err)?),
            NcType::UInt => ArrayData::UInt(v.get_values::<u32, _>(ext).map_err(native_err)?),
            NcType::Int64 => ArrayData::Int64(v.get_values::<i64, _>(ext).map_err(native_err)?),
            NcType::UInt64 => {
                ArrayData::UInt64(v.get_values::<u64, _>(ext).map_err(native_err)?)
            }
            NcType::Float => ArrayData::Float(v.get_values::<f32, _>(ext).map_err(native_err)?),
            NcType::Double => {
                ArrayData::Double(v.get_values::<f64, _>(ext).map_err(native_err)?)
            }
            other => {
                return Err(StoreError::Unsupported(format!(
                    "reading {} variable {} in native store",
                    other, name
                )))
            }
        };
        data.convert(mem_type)
    }

    fn write(
        &mut self,
        var: usize,
        start: &[usize],
        count: &[usize],
        data: &ArrayData,
    ) -> StoreResult<()> {
        let info = self.variable(var)?;
        let converted = data.convert(info.nc_type)?;
        let ext = extents(start, count);
        let ext = ext.as_slice();
        let file = self.file_mut()?;
        let mut v = file
            .variable_mut(&info.name)
            .ok_or_else(|| StoreError::NotFound(info.name.clone()))?;
        let result = match &converted {
            ArrayData::Byte(d) => v.put_values(d, ext),
            ArrayData::UByte(d) => v.put_values(d, ext),
            ArrayData::Short(d) => v.put_values(d, ext),
            ArrayData::UShort(d) => v.put_values(d, ext),
            ArrayData::Int(d) => v.put_values(d, ext),
            ArrayData::UInt(d) => v.put_values(d, ext),
            ArrayData::Int64(d) => v.put_values(d, ext),
            ArrayData::UInt64(d) => v.put_values(d, ext),
            ArrayData::Float(d) => v.put_values(d, ext),
            ArrayData::Double(d) => v.put_values(d, ext),
            ArrayData::Char(_) | ArrayData::Str(_) => {
                return Err(StoreError::Unsupported(format!(
                    "writing text variable {} in native store",
                    info.name
                )))
            }
        };
        result.map_err(native_err)
    }

    fn redef(&mut self) -> StoreResult<()> {
        if self.define_mode {
            return Err(StoreError::InDefineMode);
        }
        self.define_mode = true;
        Ok(())
    }

    fn enddef(&mut self) -> StoreResult<()> {
        if !self.define_mode {
            return Err(StoreError::NotInDefineMode);
        }
        self.define_mode = false;
        Ok(())
    }

    fn is_define_mode(&self) -> bool {
        self.define_mode
    }

    fn sync(&mut self) -> StoreResult<()> {
        match &mut self.handle {
            Handle::Write(f) => f.sync().map_err(native_err),
            Handle::Read(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_write_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.nc");

        let mut store = NativeStore::create(&path, Format::Nc4).unwrap();
        let y = store.def_dim("y", 2).unwrap();
        let x = store.def_dim("x", 3).unwrap();
        let var = store.def_var("t", NcType::Float, &[y, x]).unwrap();
        store
            .put_attr(AttrOwner::Var(var), "units", "K".into())
            .unwrap();
        store.enddef().unwrap();
        store
            .write(
                var,
                &[0, 0],
                &[2, 3],
                &ArrayData::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            )
            .unwrap();
        store.sync().unwrap();
        drop(store);

        let store = NativeStore::open(&path).unwrap();
        assert_eq!(store.format(), Format::Nc4);
        let var = store.var_id("t").unwrap();
        let row = store.read(var, &[1, 0], &[1, 3], NcType::Double).unwrap();
        assert_eq!(row, ArrayData::Double(vec![4.0, 5.0, 6.0]));
        assert_eq!(
            store.get_attr(AttrOwner::Var(var), "units").unwrap(),
            Some(AttrValue::text("K"))
        );
        assert_eq!(store.get_attr(AttrOwner::Var(var), "missing").unwrap(), None);
    }

    #[test]
    fn test_sniff_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.nc");
        std::fs::write(&path, b"GRIB0000").unwrap();
        assert!(sniff_format(&path).is_err());
    }
}
