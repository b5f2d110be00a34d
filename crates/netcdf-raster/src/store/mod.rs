//! Array store seam.
//!
//! The driver talks to the underlying container exclusively through the
//! [`ArrayStore`] trait: dimension and variable definition, attribute get/put,
//! typed sub-array transfer with start/count vectors, and explicit
//! define/data mode switching.

mod memory;
#[cfg(feature = "native")]
mod native;

pub use memory::MemoryStore;
#[cfg(feature = "native")]
pub use native::{silence_hdf5_errors, NativeStore};

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for array store primitives.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by an array store implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation requires define mode")]
    NotInDefineMode,

    #[error("operation not allowed in define mode")]
    InDefineMode,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: NcType, found: NcType },

    #[error("index out of bounds: {0}")]
    OutOfBounds(String),

    /// `_FillValue` changed after data was written (netCDF-4)
    #[error("fill value set after data was written for {0}")]
    LateFill(String),

    #[error("name already in use: {0}")]
    NameInUse(String),

    #[error("not supported by this store: {0}")]
    Unsupported(String),

    /// Error from the native library
    #[error("{0}")]
    Native(String),
}

// =============================================================================
// Element types and formats
// =============================================================================

/// Element type of a variable or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
    String,
}

impl NcType {
    /// netCDF C type code.
    pub fn code(self) -> i32 {
        match self {
            NcType::Byte => 1,
            NcType::Char => 2,
            NcType::Short => 3,
            NcType::Int => 4,
            NcType::Float => 5,
            NcType::Double => 6,
            NcType::UByte => 7,
            NcType::UShort => 8,
            NcType::UInt => 9,
            NcType::Int64 => 10,
            NcType::UInt64 => 11,
            NcType::String => 12,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            7 => NcType::UByte,
            8 => NcType::UShort,
            9 => NcType::UInt,
            10 => NcType::Int64,
            11 => NcType::UInt64,
            12 => NcType::String,
            _ => return None,
        })
    }

    /// Human readable description used in subdataset listings.
    pub fn description(self) -> &'static str {
        match self {
            NcType::Byte => "8-bit integer",
            NcType::Char => "8-bit character",
            NcType::Short => "16-bit integer",
            NcType::Int => "32-bit integer",
            NcType::Float => "32-bit floating-point",
            NcType::Double => "64-bit floating-point",
            NcType::UByte => "8-bit unsigned integer",
            NcType::UShort => "16-bit unsigned integer",
            NcType::UInt => "32-bit unsigned integer",
            NcType::Int64 => "64-bit integer",
            NcType::UInt64 => "64-bit unsigned integer",
            NcType::String => "string",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, NcType::Float | NcType::Double)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, NcType::Char | NcType::String)
    }

    /// Types only the netCDF-4 enhanced model can store.
    pub fn requires_enhanced_model(self) -> bool {
        matches!(
            self,
            NcType::UByte
                | NcType::UShort
                | NcType::UInt
                | NcType::Int64
                | NcType::UInt64
                | NcType::String
        )
    }
}

impl fmt::Display for NcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Default fill values of the netCDF library, by type.
pub mod fill {
    pub const BYTE: i8 = -127;
    pub const CHAR: u8 = 0;
    pub const SHORT: i16 = -32767;
    pub const INT: i32 = -2147483647;
    pub const FLOAT: f32 = 9.969_21e36;
    pub const DOUBLE: f64 = 9.969_209_968_386_869e36;
    pub const UBYTE: u8 = 255;
    pub const USHORT: u16 = 65535;
    pub const UINT: u32 = 4294967295;
    pub const INT64: i64 = -9223372036854775806;
    pub const UINT64: u64 = 18446744073709551614;
}

/// Default fill value for `nc_type` as a double.
pub fn default_fill(nc_type: NcType) -> f64 {
    match nc_type {
        NcType::Byte => fill::BYTE as f64,
        NcType::Char => fill::CHAR as f64,
        NcType::Short => fill::SHORT as f64,
        NcType::Int => fill::INT as f64,
        NcType::Float => fill::FLOAT as f64,
        NcType::Double | NcType::String => fill::DOUBLE,
        NcType::UByte => fill::UBYTE as f64,
        NcType::UShort => fill::USHORT as f64,
        NcType::UInt => fill::UINT as f64,
        NcType::Int64 => fill::INT64 as f64,
        NcType::UInt64 => fill::UINT64 as f64,
    }
}

/// Container format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Format {
    /// Classic netCDF-3
    #[default]
    #[serde(rename = "NC")]
    Nc,
    /// netCDF-3 with 64-bit offsets
    #[serde(rename = "NC2")]
    Nc2,
    /// netCDF-4 (HDF5) enhanced model
    #[serde(rename = "NC4")]
    Nc4,
    /// netCDF-4 restricted to the classic model
    #[serde(rename = "NC4C")]
    Nc4Classic,
}

impl Format {
    pub fn is_netcdf4(self) -> bool {
        matches!(self, Format::Nc4 | Format::Nc4Classic)
    }

    /// Whether unsigned, 64-bit and string types are available.
    pub fn has_enhanced_model(self) -> bool {
        self == Format::Nc4
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Nc => "NC",
            Format::Nc2 => "NC2",
            Format::Nc4 => "NC4",
            Format::Nc4Classic => "NC4C",
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NC" => Ok(Format::Nc),
            "NC2" => Ok(Format::Nc2),
            "NC4" => Ok(Format::Nc4),
            "NC4C" => Ok(Format::Nc4Classic),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

// =============================================================================
// Typed data
// =============================================================================

/// A typed, flat array of elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    UByte(Vec<u8>),
    UShort(Vec<u16>),
    UInt(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Str(Vec<String>),
}

/// Dispatch over the numeric variants of [`ArrayData`] with the inner vector
/// bound to `$v`.
macro_rules! with_numeric {
    ($data:expr, $v:ident => $body:expr, _ => $other:expr) => {
        match $data {
            ArrayData::Byte($v) => $body,
            ArrayData::Short($v) => $body,
            ArrayData::Int($v) => $body,
            ArrayData::Float($v) => $body,
            ArrayData::Double($v) => $body,
            ArrayData::UByte($v) => $body,
            ArrayData::UShort($v) => $body,
            ArrayData::UInt($v) => $body,
            ArrayData::Int64($v) => $body,
            ArrayData::UInt64($v) => $body,
            _ => $other,
        }
    };
}
pub(crate) use with_numeric;

/// Rebuild the same [`ArrayData`] variant from the inner vector bound to `$v`.
macro_rules! map_array {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Byte($v) => ArrayData::Byte($body),
            ArrayData::Char($v) => ArrayData::Char($body),
            ArrayData::Short($v) => ArrayData::Short($body),
            ArrayData::Int($v) => ArrayData::Int($body),
            ArrayData::Float($v) => ArrayData::Float($body),
            ArrayData::Double($v) => ArrayData::Double($body),
            ArrayData::UByte($v) => ArrayData::UByte($body),
            ArrayData::UShort($v) => ArrayData::UShort($body),
            ArrayData::UInt($v) => ArrayData::UInt($body),
            ArrayData::Int64($v) => ArrayData::Int64($body),
            ArrayData::UInt64($v) => ArrayData::UInt64($body),
            ArrayData::Str($v) => ArrayData::Str($body),
        }
    };
}
pub(crate) use map_array;

impl ArrayData {
    pub fn nc_type(&self) -> NcType {
        match self {
            ArrayData::Byte(_) => NcType::Byte,
            ArrayData::Char(_) => NcType::Char,
            ArrayData::Short(_) => NcType::Short,
            ArrayData::Int(_) => NcType::Int,
            ArrayData::Float(_) => NcType::Float,
            ArrayData::Double(_) => NcType::Double,
            ArrayData::UByte(_) => NcType::UByte,
            ArrayData::UShort(_) => NcType::UShort,
            ArrayData::UInt(_) => NcType::UInt,
            ArrayData::Int64(_) => NcType::Int64,
            ArrayData::UInt64(_) => NcType::UInt64,
            ArrayData::Str(_) => NcType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Char(v) => v.len(),
            ArrayData::Str(v) => v.len(),
            other => with_numeric!(other, v => v.len(), _ => 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array of `len` elements set to the library default fill value.
    pub fn filled(nc_type: NcType, len: usize) -> Self {
        match nc_type {
            NcType::Byte => ArrayData::Byte(vec![fill::BYTE; len]),
            NcType::Char => ArrayData::Char(vec![fill::CHAR; len]),
            NcType::Short => ArrayData::Short(vec![fill::SHORT; len]),
            NcType::Int => ArrayData::Int(vec![fill::INT; len]),
            NcType::Float => ArrayData::Float(vec![fill::FLOAT; len]),
            NcType::Double => ArrayData::Double(vec![fill::DOUBLE; len]),
            NcType::UByte => ArrayData::UByte(vec![fill::UBYTE; len]),
            NcType::UShort => ArrayData::UShort(vec![fill::USHORT; len]),
            NcType::UInt => ArrayData::UInt(vec![fill::UINT; len]),
            NcType::Int64 => ArrayData::Int64(vec![fill::INT64; len]),
            NcType::UInt64 => ArrayData::UInt64(vec![fill::UINT64; len]),
            NcType::String => ArrayData::Str(vec![String::new(); len]),
        }
    }

    /// Array of `len` elements set to `value`, cast to `nc_type`.
    pub fn filled_with(nc_type: NcType, len: usize, value: f64) -> Self {
        Self::from_f64(nc_type, &vec![value; len])
    }

    /// Cast doubles into an array of `nc_type` with `as` semantics.
    pub fn from_f64(nc_type: NcType, values: &[f64]) -> Self {
        match nc_type {
            NcType::Byte => ArrayData::Byte(values.iter().map(|&v| v as i8).collect()),
            NcType::Char => ArrayData::Char(values.iter().map(|&v| v as u8).collect()),
            NcType::Short => ArrayData::Short(values.iter().map(|&v| v as i16).collect()),
            NcType::Int => ArrayData::Int(values.iter().map(|&v| v as i32).collect()),
            NcType::Float => ArrayData::Float(values.iter().map(|&v| v as f32).collect()),
            NcType::Double => ArrayData::Double(values.to_vec()),
            NcType::UByte => ArrayData::UByte(values.iter().map(|&v| v as u8).collect()),
            NcType::UShort => ArrayData::UShort(values.iter().map(|&v| v as u16).collect()),
            NcType::UInt => ArrayData::UInt(values.iter().map(|&v| v as u32).collect()),
            NcType::Int64 => ArrayData::Int64(values.iter().map(|&v| v as i64).collect()),
            NcType::UInt64 => ArrayData::UInt64(values.iter().map(|&v| v as u64).collect()),
            NcType::String => ArrayData::Str(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    /// Numeric content widened to doubles. `None` for text.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        with_numeric!(
            self,
            v => Some(v.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).collect()),
            _ => None
        )
    }

    pub fn get_f64(&self, index: usize) -> Option<f64> {
        with_numeric!(self, v => v.get(index).and_then(|x| x.to_f64()), _ => None)
    }

    /// Convert to another element type.
    ///
    /// Signed and unsigned bytes are reinterpreted bit for bit; other numeric
    /// pairs convert through doubles.
    pub fn convert(&self, target: NcType) -> StoreResult<ArrayData> {
        let found = self.nc_type();
        if found == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (ArrayData::Byte(v), NcType::UByte) => {
                Ok(ArrayData::UByte(v.iter().map(|&b| b as u8).collect()))
            }
            (ArrayData::UByte(v), NcType::Byte) => {
                Ok(ArrayData::Byte(v.iter().map(|&b| b as i8).collect()))
            }
            (ArrayData::Int64(v), NcType::UInt64) => {
                Ok(ArrayData::UInt64(v.iter().map(|&b| b as u64).collect()))
            }
            (ArrayData::UInt64(v), NcType::Int64) => {
                Ok(ArrayData::Int64(v.iter().map(|&b| b as i64).collect()))
            }
            _ if found.is_numeric() && target.is_numeric() => {
                let values = self.to_f64_vec().ok_or(StoreError::TypeMismatch {
                    expected: target,
                    found,
                })?;
                Ok(ArrayData::from_f64(target, &values))
            }
            _ => Err(StoreError::TypeMismatch {
                expected: target,
                found,
            }),
        }
    }
}

/// Attribute value: text or a typed array.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Values(ArrayData),
}

impl AttrValue {
    pub fn text(s: impl Into<String>) -> Self {
        AttrValue::Text(s.into())
    }

    pub fn double(v: f64) -> Self {
        AttrValue::Values(ArrayData::Double(vec![v]))
    }

    pub fn doubles(v: Vec<f64>) -> Self {
        AttrValue::Values(ArrayData::Double(v))
    }

    pub fn float(v: f32) -> Self {
        AttrValue::Values(ArrayData::Float(vec![v]))
    }

    pub fn int(v: i32) -> Self {
        AttrValue::Values(ArrayData::Int(vec![v]))
    }

    pub fn nc_type(&self) -> NcType {
        match self {
            AttrValue::Text(_) => NcType::Char,
            AttrValue::Values(data) => data.nc_type(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AttrValue::Text(s) => s.len(),
            AttrValue::Values(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Values(_) => None,
        }
    }

    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().map(|v| vec![v]),
            AttrValue::Values(data) => data.to_f64_vec(),
        }
    }

    pub fn first_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Text(s) => s.trim().parse::<f64>().ok(),
            AttrValue::Values(data) => data.get_f64(0),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::double(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::int(v)
    }
}

impl From<ArrayData> for AttrValue {
    fn from(data: ArrayData) -> Self {
        AttrValue::Values(data)
    }
}

// =============================================================================
// Structure
// =============================================================================

/// A dimension of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimInfo {
    pub id: usize,
    pub name: String,
    /// Current length (record count for the unlimited dimension)
    pub len: usize,
    pub unlimited: bool,
}

/// A variable of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub id: usize,
    pub name: String,
    pub nc_type: NcType,
    /// Dimension ids, slowest varying first
    pub dims: Vec<usize>,
    /// Chunk shape when the variable is chunked
    pub chunking: Option<Vec<usize>>,
}

/// Owner of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOwner {
    Global,
    Var(usize),
}

/// Primitive operations the driver needs from a netCDF-like container.
///
/// Structure changes and attribute writes on classic formats require define
/// mode; sub-array transfer requires data mode. Implementations do not switch
/// modes on their own.
pub trait ArrayStore: Send {
    /// Path or name of the container.
    fn path(&self) -> &str;

    fn format(&self) -> Format;

    fn dimensions(&self) -> Vec<DimInfo>;

    fn dimension(&self, id: usize) -> StoreResult<DimInfo>;

    fn dim_id(&self, name: &str) -> Option<usize>;

    /// Define a dimension. `len == 0` defines the unlimited dimension.
    fn def_dim(&mut self, name: &str, len: usize) -> StoreResult<usize>;

    fn rename_dim(&mut self, id: usize, name: &str) -> StoreResult<()>;

    fn variables(&self) -> Vec<VarInfo>;

    fn variable(&self, id: usize) -> StoreResult<VarInfo>;

    fn var_id(&self, name: &str) -> Option<usize>;

    fn def_var(&mut self, name: &str, nc_type: NcType, dims: &[usize]) -> StoreResult<usize>;

    fn set_chunking(&mut self, var: usize, chunks: &[usize]) -> StoreResult<()>;

    /// Attribute names of `owner`, in definition order.
    fn attr_names(&self, owner: AttrOwner) -> StoreResult<Vec<String>>;

    fn get_attr(&self, owner: AttrOwner, name: &str) -> StoreResult<Option<AttrValue>>;

    fn put_attr(&mut self, owner: AttrOwner, name: &str, value: AttrValue) -> StoreResult<()>;

    /// Read a hyperslab converted to `mem_type`.
    fn read(
        &self,
        var: usize,
        start: &[usize],
        count: &[usize],
        mem_type: NcType,
    ) -> StoreResult<ArrayData>;

    /// Write a hyperslab; `data` is converted to the variable's type.
    fn write(
        &mut self,
        var: usize,
        start: &[usize],
        count: &[usize],
        data: &ArrayData,
    ) -> StoreResult<()>;

    /// Enter define mode.
    fn redef(&mut self) -> StoreResult<()>;

    /// Leave define mode.
    fn enddef(&mut self) -> StoreResult<()>;

    fn is_define_mode(&self) -> bool;

    /// Flush pending changes to the backing storage.
    fn sync(&mut self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_reinterpretation() {
        let data = ArrayData::Byte(vec![-1, 0, 127, -128]);
        assert_eq!(
            data.convert(NcType::UByte).unwrap(),
            ArrayData::UByte(vec![255, 0, 127, 128])
        );
    }

    #[test]
    fn test_numeric_conversion() {
        let data = ArrayData::Short(vec![1, -2, 300]);
        assert_eq!(
            data.convert(NcType::Double).unwrap(),
            ArrayData::Double(vec![1.0, -2.0, 300.0])
        );
        assert!(ArrayData::Str(vec!["a".into()]).convert(NcType::Int).is_err());
    }

    #[test]
    fn test_default_fills() {
        assert_eq!(default_fill(NcType::Byte), -127.0);
        assert_eq!(default_fill(NcType::Short), -32767.0);
        assert_eq!(default_fill(NcType::UByte), 255.0);
        assert_eq!(default_fill(NcType::Double), 9.969_209_968_386_869e36);
        assert_eq!(
            ArrayData::filled(NcType::Int, 2),
            ArrayData::Int(vec![-2147483647, -2147483647])
        );
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("nc4c".parse::<Format>().unwrap(), Format::Nc4Classic);
        assert!(Format::Nc4Classic.is_netcdf4());
        assert!(!Format::Nc4Classic.has_enhanced_model());
        assert!("HDF".parse::<Format>().is_err());
    }

    #[test]
    fn test_type_codes_roundtrip() {
        for code in 1..=12 {
            assert_eq!(NcType::from_code(code).unwrap().code(), code);
        }
        assert!(NcType::from_code(0).is_none());
    }
}
