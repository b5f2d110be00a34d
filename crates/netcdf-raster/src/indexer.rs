//! Band number to extra-dimension index arithmetic.
//!
//! Extra dimensions are listed slowest to fastest; a band level is the
//! mixed-radix number formed by their indices. Everything that needs to turn
//! a band into hyperslab coordinates goes through [`DimensionIndexer`].

use crate::attributes::decode;
use crate::error::{NetCdfError, NetCdfResult};
use crate::store::{ArrayStore, AttrValue};

/// A non-spatial dimension of a raster variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDim {
    pub name: String,
    pub len: usize,
    /// Position of the dimension in the variable's storage order
    pub axis: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DimensionIndexer {
    dims: Vec<ExtraDim>,
}

impl DimensionIndexer {
    pub fn new(dims: Vec<ExtraDim>) -> NetCdfResult<Self> {
        if let Some(dim) = dims.iter().find(|d| d.len == 0) {
            return Err(NetCdfError::ZeroLengthDimension(dim.name.clone()));
        }
        Ok(Self { dims })
    }

    pub fn dims(&self) -> &[ExtraDim] {
        &self.dims
    }

    /// Number of bands: product of the extra dimension lengths.
    pub fn band_count(&self) -> usize {
        self.dims.iter().map(|d| d.len).product()
    }

    /// Per-dimension indices of a 0-based level.
    pub fn decode(&self, level: usize) -> NetCdfResult<Vec<usize>> {
        if level >= self.band_count() {
            return Err(NetCdfError::OutOfRange(format!(
                "level {} of {} bands",
                level,
                self.band_count()
            )));
        }
        let mut coords = vec![0; self.dims.len()];
        let mut rest = level;
        for (i, dim) in self.dims.iter().enumerate().rev() {
            coords[i] = rest % dim.len;
            rest /= dim.len;
        }
        Ok(coords)
    }

    /// 0-based level of per-dimension indices.
    pub fn encode(&self, coords: &[usize]) -> NetCdfResult<usize> {
        if coords.len() != self.dims.len() {
            return Err(NetCdfError::OutOfRange(format!(
                "{} coordinates for {} extra dimensions",
                coords.len(),
                self.dims.len()
            )));
        }
        let mut level = 0;
        for (c, dim) in coords.iter().zip(&self.dims) {
            if *c >= dim.len {
                return Err(NetCdfError::OutOfRange(format!(
                    "index {} on dimension {} of length {}",
                    c, dim.name, dim.len
                )));
            }
            level = level * dim.len + c;
        }
        Ok(level)
    }

    /// Start/count vectors of rank `ndims` with the extra axes set for
    /// `level`. The spatial axes are left at zero for the caller.
    pub fn start_count(
        &self,
        level: usize,
        ndims: usize,
    ) -> NetCdfResult<(Vec<usize>, Vec<usize>)> {
        let coords = self.decode(level)?;
        let mut start = vec![0; ndims];
        let mut count = vec![0; ndims];
        for (dim, c) in self.dims.iter().zip(coords) {
            if dim.axis >= ndims {
                return Err(NetCdfError::OutOfRange(format!(
                    "axis {} of dimension {} in rank {}",
                    dim.axis, dim.name, ndims
                )));
            }
            start[dim.axis] = c;
            count[dim.axis] = 1;
        }
        Ok((start, count))
    }
}

/// Descriptive value of `index` along dimension `dim_name`: the 1D
/// coordinate variable's value there, else the 1-based index.
///
/// Requires data mode.
pub fn coordinate_label(store: &dyn ArrayStore, dim_name: &str, index: usize) -> String {
    let value = store.dim_id(dim_name).and_then(|dim_id| {
        let var_id = store.var_id(dim_name)?;
        let info = store.variable(var_id).ok()?;
        if info.dims != [dim_id] || !info.nc_type.is_numeric() {
            return None;
        }
        let data = store.read(var_id, &[index], &[1], info.nc_type).ok()?;
        Some(decode(&AttrValue::Values(data)).text)
    });
    value.unwrap_or_else(|| (index + 1).to_string())
}
