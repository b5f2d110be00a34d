//! In-memory array store.
//!
//! Follows the netCDF data model closely enough to exercise the driver
//! without a native library: define/data modes, one leading unlimited
//! dimension, typed fill-initialised variables and ordered attributes.

use super::{
    default_fill, map_array, ArrayData, ArrayStore, AttrOwner, AttrValue, DimInfo, Format, NcType,
    StoreError, StoreResult, VarInfo,
};

#[derive(Debug, Clone)]
struct MemDim {
    name: String,
    len: usize,
    unlimited: bool,
}

#[derive(Debug, Clone)]
struct MemVar {
    name: String,
    nc_type: NcType,
    dims: Vec<usize>,
    chunking: Option<Vec<usize>>,
    attrs: Vec<(String, AttrValue)>,
    data: ArrayData,
    written: bool,
}

impl MemVar {
    fn fill_value(&self) -> f64 {
        self.attrs
            .iter()
            .find(|(name, _)| name == "_FillValue")
            .and_then(|(_, value)| value.first_f64())
            .unwrap_or_else(|| default_fill(self.nc_type))
    }
}

/// netCDF-like container held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: String,
    format: Format,
    define_mode: bool,
    dims: Vec<MemDim>,
    vars: Vec<MemVar>,
    globals: Vec<(String, AttrValue)>,
}

impl MemoryStore {
    /// New empty container in define mode.
    pub fn create(path: impl Into<String>, format: Format) -> Self {
        Self {
            path: path.into(),
            format,
            define_mode: true,
            dims: Vec::new(),
            vars: Vec::new(),
            globals: Vec::new(),
        }
    }

    fn var(&self, id: usize) -> StoreResult<&MemVar> {
        self.vars
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("variable id {}", id)))
    }

    fn shape(&self, var: &MemVar) -> Vec<usize> {
        var.dims.iter().map(|&d| self.dims[d].len).collect()
    }

    fn attrs(&self, owner: AttrOwner) -> StoreResult<&Vec<(String, AttrValue)>> {
        match owner {
            AttrOwner::Global => Ok(&self.globals),
            AttrOwner::Var(id) => Ok(&self.var(id)?.attrs),
        }
    }

    fn require_define(&self) -> StoreResult<()> {
        if self.define_mode {
            Ok(())
        } else {
            Err(StoreError::NotInDefineMode)
        }
    }

    fn require_data(&self) -> StoreResult<()> {
        if self.define_mode {
            Err(StoreError::InDefineMode)
        } else {
            Ok(())
        }
    }

    /// Grow the unlimited dimension and every variable that spans it.
    fn grow_records(&mut self, dim: usize, records: usize) -> StoreResult<()> {
        if records <= self.dims[dim].len {
            return Ok(());
        }
        self.dims[dim].len = records;
        for i in 0..self.vars.len() {
            if self.vars[i].dims.first() != Some(&dim) {
                continue;
            }
            let new_len: usize = self.shape(&self.vars[i]).iter().product();
            let var = &mut self.vars[i];
            let old_len = var.data.len();
            if new_len > old_len {
                let extra = fill_array(var.nc_type, new_len - old_len, var.fill_value());
                append(&mut var.data, extra)?;
            }
        }
        Ok(())
    }
}

fn fill_array(nc_type: NcType, len: usize, fill: f64) -> ArrayData {
    match nc_type {
        NcType::String => ArrayData::filled(nc_type, len),
        _ => ArrayData::filled_with(nc_type, len, fill),
    }
}

/// Element pair dispatch where both sides must be the same variant.
macro_rules! same_variant {
    ($dst:expr, $src:expr, ($d:ident, $s:ident) => $body:expr) => {{
        let expected = $dst.nc_type();
        let found = $src.nc_type();
        match ($dst, $src) {
            (ArrayData::Byte($d), ArrayData::Byte($s)) => $body,
            (ArrayData::Char($d), ArrayData::Char($s)) => $body,
            (ArrayData::Short($d), ArrayData::Short($s)) => $body,
            (ArrayData::Int($d), ArrayData::Int($s)) => $body,
            (ArrayData::Float($d), ArrayData::Float($s)) => $body,
            (ArrayData::Double($d), ArrayData::Double($s)) => $body,
            (ArrayData::UByte($d), ArrayData::UByte($s)) => $body,
            (ArrayData::UShort($d), ArrayData::UShort($s)) => $body,
            (ArrayData::UInt($d), ArrayData::UInt($s)) => $body,
            (ArrayData::Int64($d), ArrayData::Int64($s)) => $body,
            (ArrayData::UInt64($d), ArrayData::UInt64($s)) => $body,
            (ArrayData::Str($d), ArrayData::Str($s)) => $body,
            _ => Err(StoreError::TypeMismatch { expected, found }),
        }
    }};
}

fn append(dst: &mut ArrayData, src: ArrayData) -> StoreResult<()> {
    same_variant!(dst, src, (d, s) => {
        d.extend(s);
        Ok(())
    })
}

fn gather(data: &ArrayData, offsets: &[usize]) -> ArrayData {
    map_array!(data, v => offsets.iter().map(|&o| v[o].clone()).collect())
}

fn scatter(dst: &mut ArrayData, src: &ArrayData, offsets: &[usize]) -> StoreResult<()> {
    same_variant!(dst, src, (d, s) => {
        for (&o, x) in offsets.iter().zip(s.iter()) {
            d[o] = x.clone();
        }
        Ok(())
    })
}

/// Row-major flat offsets of the hyperslab `start`/`count` within `shape`.
fn hyperslab_offsets(shape: &[usize], start: &[usize], count: &[usize]) -> Vec<usize> {
    let total: usize = count.iter().product();
    if total == 0 {
        return Vec::new();
    }
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }

    let mut offsets = Vec::with_capacity(total);
    let mut index = vec![0usize; count.len()];
    for _ in 0..total {
        let offset = index
            .iter()
            .zip(start)
            .zip(&strides)
            .map(|((i, s), stride)| (i + s) * stride)
            .sum();
        offsets.push(offset);
        for d in (0..index.len()).rev() {
            index[d] += 1;
            if index[d] < count[d] {
                break;
            }
            index[d] = 0;
        }
    }
    offsets
}

fn check_rank(var: &MemVar, start: &[usize], count: &[usize]) -> StoreResult<()> {
    if start.len() != var.dims.len() || count.len() != var.dims.len() {
        return Err(StoreError::OutOfBounds(format!(
            "{}: expected {} indices, got start {} count {}",
            var.name,
            var.dims.len(),
            start.len(),
            count.len()
        )));
    }
    Ok(())
}

impl ArrayStore for MemoryStore {
    fn path(&self) -> &str {
        &self.path
    }

    fn format(&self) -> Format {
        self.format
    }

    fn dimensions(&self) -> Vec<DimInfo> {
        self.dims
            .iter()
            .enumerate()
            .map(|(id, d)| DimInfo {
                id,
                name: d.name.clone(),
                len: d.len,
                unlimited: d.unlimited,
            })
            .collect()
    }

    fn dimension(&self, id: usize) -> StoreResult<DimInfo> {
        self.dims
            .get(id)
            .map(|d| DimInfo {
                id,
                name: d.name.clone(),
                len: d.len,
                unlimited: d.unlimited,
            })
            .ok_or_else(|| StoreError::NotFound(format!("dimension id {}", id)))
    }

    fn dim_id(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    fn def_dim(&mut self, name: &str, len: usize) -> StoreResult<usize> {
        self.require_define()?;
        if self.dim_id(name).is_some() {
            return Err(StoreError::NameInUse(name.to_string()));
        }
        let unlimited = len == 0;
        if unlimited && self.dims.iter().any(|d| d.unlimited) {
            return Err(StoreError::Unsupported(
                "more than one unlimited dimension".to_string(),
            ));
        }
        self.dims.push(MemDim {
            name: name.to_string(),
            len,
            unlimited,
        });
        Ok(self.dims.len() - 1)
    }

    fn rename_dim(&mut self, id: usize, name: &str) -> StoreResult<()> {
        if let Some(existing) = self.dim_id(name) {
            if existing != id {
                return Err(StoreError::NameInUse(name.to_string()));
            }
        }
        let dim = self
            .dims
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("dimension id {}", id)))?;
        dim.name = name.to_string();
        Ok(())
    }

    fn variables(&self) -> Vec<VarInfo> {
        (0..self.vars.len())
            .filter_map(|id| self.variable(id).ok())
            .collect()
    }

    fn variable(&self, id: usize) -> StoreResult<VarInfo> {
        let var = self.var(id)?;
        Ok(VarInfo {
            id,
            name: var.name.clone(),
            nc_type: var.nc_type,
            dims: var.dims.clone(),
            chunking: var.chunking.clone(),
        })
    }

    fn var_id(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    fn def_var(&mut self, name: &str, nc_type: NcType, dims: &[usize]) -> StoreResult<usize> {
        self.require_define()?;
        if self.var_id(name).is_some() {
            return Err(StoreError::NameInUse(name.to_string()));
        }
        if nc_type.requires_enhanced_model() && !self.format.has_enhanced_model() {
            return Err(StoreError::Unsupported(format!(
                "type {} in format {}",
                nc_type.description(),
                self.format.name()
            )));
        }
        for (position, &d) in dims.iter().enumerate() {
            let dim = self
                .dims
                .get(d)
                .ok_or_else(|| StoreError::NotFound(format!("dimension id {}", d)))?;
            if dim.unlimited && position != 0 {
                return Err(StoreError::Unsupported(format!(
                    "unlimited dimension {} must be the first dimension of {}",
                    dim.name, name
                )));
            }
        }
        let len: usize = dims.iter().map(|&d| self.dims[d].len).product();
        self.vars.push(MemVar {
            name: name.to_string(),
            nc_type,
            dims: dims.to_vec(),
            chunking: None,
            attrs: Vec::new(),
            data: ArrayData::filled(nc_type, len),
            written: false,
        });
        Ok(self.vars.len() - 1)
    }

    fn set_chunking(&mut self, var: usize, chunks: &[usize]) -> StoreResult<()> {
        self.require_define()?;
        if !self.format.is_netcdf4() {
            return Err(StoreError::Unsupported(
                "chunking requires a netCDF-4 container".to_string(),
            ));
        }
        let rank = self.var(var)?.dims.len();
        if chunks.len() != rank || chunks.contains(&0) {
            return Err(StoreError::OutOfBounds(format!(
                "chunk shape {:?} for rank {}",
                chunks, rank
            )));
        }
        self.vars[var].chunking = Some(chunks.to_vec());
        Ok(())
    }

    fn attr_names(&self, owner: AttrOwner) -> StoreResult<Vec<String>> {
        Ok(self.attrs(owner)?.iter().map(|(n, _)| n.clone()).collect())
    }

    fn get_attr(&self, owner: AttrOwner, name: &str) -> StoreResult<Option<AttrValue>> {
        Ok(self
            .attrs(owner)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    fn put_attr(&mut self, owner: AttrOwner, name: &str, value: AttrValue) -> StoreResult<()> {
        if !self.format.is_netcdf4() {
            self.require_define()?;
        }
        if let AttrValue::Values(data) = &value {
            if data.nc_type().requires_enhanced_model() && !self.format.has_enhanced_model() {
                return Err(StoreError::Unsupported(format!(
                    "attribute type {} in format {}",
                    data.nc_type().description(),
                    self.format.name()
                )));
            }
        }

        let attrs = match owner {
            AttrOwner::Global => &mut self.globals,
            AttrOwner::Var(id) => {
                let format = self.format;
                let var = self
                    .vars
                    .get_mut(id)
                    .ok_or_else(|| StoreError::NotFound(format!("variable id {}", id)))?;
                if name == "_FillValue" {
                    if var.written && format.is_netcdf4() {
                        return Err(StoreError::LateFill(var.name.clone()));
                    }
                    if !var.written {
                        if let Some(fill) = value.first_f64() {
                            var.data = fill_array(var.nc_type, var.data.len(), fill);
                        }
                    }
                }
                &mut var.attrs
            }
        };

        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
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
        self.require_data()?;
        let v = self.var(var)?;
        check_rank(v, start, count)?;
        let shape = self.shape(v);
        for (i, ((&s, &c), &len)) in start.iter().zip(count).zip(&shape).enumerate() {
            if s + c > len {
                return Err(StoreError::OutOfBounds(format!(
                    "{} dimension {}: {}+{} > {}",
                    v.name, i, s, c, len
                )));
            }
        }
        let offsets = hyperslab_offsets(&shape, start, count);
        gather(&v.data, &offsets).convert(mem_type)
    }

    fn write(
        &mut self,
        var: usize,
        start: &[usize],
        count: &[usize],
        data: &ArrayData,
    ) -> StoreResult<()> {
        self.require_data()?;
        let (nc_type, dims) = {
            let v = self.var(var)?;
            check_rank(v, start, count)?;
            (v.nc_type, v.dims.clone())
        };
        let expected: usize = count.iter().product();
        if data.len() != expected {
            return Err(StoreError::OutOfBounds(format!(
                "buffer holds {} elements, hyperslab needs {}",
                data.len(),
                expected
            )));
        }

        for (i, (&s, &c)) in start.iter().zip(count).enumerate() {
            let dim = &self.dims[dims[i]];
            if dim.unlimited {
                self.grow_records(dims[i], s + c)?;
            } else if s + c > dim.len {
                return Err(StoreError::OutOfBounds(format!(
                    "dimension {}: {}+{} > {}",
                    dim.name, s, c, dim.len
                )));
            }
        }

        let shape = self.shape(&self.vars[var]);
        let offsets = hyperslab_offsets(&shape, start, count);
        let converted = data.convert(nc_type)?;
        let target = &mut self.vars[var];
        scatter(&mut target.data, &converted, &offsets)?;
        target.written = true;
        Ok(())
    }

    fn redef(&mut self) -> StoreResult<()> {
        if self.define_mode {
            return Err(StoreError::InDefineMode);
        }
        self.define_mode = true;
        Ok(())
    }

    fn enddef(&mut self) -> StoreResult<()> {
        self.require_define()?;
        self.define_mode = false;
        Ok(())
    }

    fn is_define_mode(&self) -> bool {
        self.define_mode
    }

    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
