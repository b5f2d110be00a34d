//! Attribute codec: typed store attributes to metadata strings and back.
//!
//! Reading renders any attribute as a string (integers plain, floats at 8
//! and doubles at 16 significant digits, arrays as `{a,b,...}`) plus the
//! first element as a double. Writing classifies a metadata string into the
//! narrowest numeric array type that holds every token, or text.

use crate::error::NetCdfResult;
use crate::metadata::{MetadataMap, GLOBAL_OWNER};
use crate::store::{ArrayData, ArrayStore, AttrOwner, AttrValue, Format};

/// Band metadata keys that are derived state rather than attributes.
const BAND_DENYLIST: &[&str] = &[
    "_FillValue",
    "missing_value",
    "NETCDF_VARNAME",
    "scale_factor",
    "add_offset",
    "valid_range",
    "_Unsigned",
    "grid_mapping",
];

const BAND_DENY_PREFIXES: &[&str] = &["STATISTICS_", "NETCDF_DIM_"];

/// Global attributes the writer manages itself.
const MANAGED_GLOBALS: &[&str] = &["GDAL", "Conventions", "history"];

/// Format a double like C's `%.{precision}g`.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Decoded form of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttr {
    /// First element as a double; `None` for text.
    pub first: Option<f64>,
    pub text: String,
}

fn render(data: &ArrayData) -> Vec<String> {
    fn plain<T: ToString>(v: &[T]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }
    match data {
        ArrayData::Byte(v) => plain(v),
        ArrayData::Char(v) => vec![String::from_utf8_lossy(v).into_owned()],
        ArrayData::Short(v) => plain(v),
        ArrayData::Int(v) => plain(v),
        ArrayData::Float(v) => v.iter().map(|&x| format_g(x as f64, 8)).collect(),
        ArrayData::Double(v) => v.iter().map(|&x| format_g(x, 16)).collect(),
        ArrayData::UByte(v) => plain(v),
        ArrayData::UShort(v) => plain(v),
        ArrayData::UInt(v) => plain(v),
        ArrayData::Int64(v) => plain(v),
        ArrayData::UInt64(v) => plain(v),
        ArrayData::Str(v) => v.clone(),
    }
}

/// Render an attribute value.
pub fn decode(value: &AttrValue) -> DecodedAttr {
    match value {
        AttrValue::Text(s) => DecodedAttr {
            first: None,
            text: s.clone(),
        },
        AttrValue::Values(data) => {
            let parts = render(data);
            let text = if parts.len() == 1 {
                parts.into_iter().next().unwrap_or_default()
            } else {
                format!("{{{}}}", parts.join(","))
            };
            DecodedAttr {
                first: data.get_f64(0),
                text,
            }
        }
    }
}

/// Classified metadata value ready to be written as an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedAttr {
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(String),
}

/// Classify a metadata string by its tokens.
///
/// A braces-delimited list is unwrapped first. All tokens must share one
/// numeric class; anything else is kept verbatim as text.
pub fn classify(value: &str) -> TypedAttr {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    let tokens: Vec<&str> = body.split(',').map(str::trim).collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return TypedAttr::Text(value.to_string());
    }

    if let Ok(ints) = tokens
        .iter()
        .map(|t| t.parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
    {
        return TypedAttr::Int64(ints);
    }

    let doubles = match tokens
        .iter()
        .map(|t| t.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(d) if d.iter().all(|v| v.is_finite()) => d,
        _ => return TypedAttr::Text(value.to_string()),
    };

    let single_exact = doubles
        .iter()
        .all(|&v| format_g(v, 8).parse::<f64>().map(|r| r == v).unwrap_or(false));
    if single_exact {
        TypedAttr::Float32(doubles.iter().map(|&v| v as f32).collect())
    } else {
        TypedAttr::Float64(doubles)
    }
}

impl TypedAttr {
    /// Store representation for `format`.
    ///
    /// Integers are written as 32-bit when every value fits, as 64-bit on
    /// the enhanced model, else as doubles.
    pub fn to_attr_value(&self, format: Format) -> AttrValue {
        match self {
            TypedAttr::Int64(v) => {
                if v.iter().all(|&x| i32::try_from(x).is_ok()) {
                    AttrValue::Values(ArrayData::Int(v.iter().map(|&x| x as i32).collect()))
                } else if format.has_enhanced_model() {
                    AttrValue::Values(ArrayData::Int64(v.clone()))
                } else {
                    AttrValue::Values(ArrayData::Double(v.iter().map(|&x| x as f64).collect()))
                }
            }
            TypedAttr::Float32(v) => AttrValue::Values(ArrayData::Float(v.clone())),
            TypedAttr::Float64(v) => AttrValue::Values(ArrayData::Double(v.clone())),
            TypedAttr::Text(s) => AttrValue::Text(s.clone()),
        }
    }
}

// =============================================================================
// Key translation
// =============================================================================

/// Key of a global attribute in the metadata map.
pub fn global_key(name: &str) -> String {
    format!("{}#{}", GLOBAL_OWNER, name)
}

/// Attribute name of a global metadata key, if it is one.
pub fn strip_global_prefix(key: &str) -> Option<&str> {
    key.strip_prefix(GLOBAL_OWNER)
        .and_then(|rest| rest.strip_prefix('#'))
}

/// Namespace a key from a foreign metadata source as a global attribute.
pub fn namespace_foreign(key: &str) -> String {
    if key.contains('#') {
        key.to_string()
    } else {
        global_key(key)
    }
}

/// Whether a band metadata key is derived state that must not be copied.
pub fn is_band_denied(key: &str) -> bool {
    BAND_DENYLIST.contains(&key) || BAND_DENY_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Whether a global attribute is managed by the writer.
pub fn is_managed_global(name: &str) -> bool {
    MANAGED_GLOBALS.contains(&name)
}

/// Entries of `metadata` owned by `prefix`, with the `prefix#` stripped.
pub fn filter_prefix<'a>(
    metadata: impl IntoIterator<Item = (&'a str, &'a str)>,
    prefix: &str,
) -> Vec<(String, String)> {
    let owner = format!("{}#", prefix);
    metadata
        .into_iter()
        .filter_map(|(k, v)| k.strip_prefix(&owner).map(|n| (n.to_string(), v.to_string())))
        .collect()
}

// =============================================================================
// Store helpers
// =============================================================================

/// Copy every attribute of `owner` into `metadata` as `<prefix>#<name>`.
pub fn read_into(
    store: &dyn ArrayStore,
    owner: AttrOwner,
    prefix: &str,
    metadata: &mut MetadataMap,
) -> NetCdfResult<()> {
    for name in store.attr_names(owner)? {
        if let Some(value) = store.get_attr(owner, &name)? {
            metadata.set(format!("{}#{}", prefix, name), decode(&value).text);
        }
    }
    Ok(())
}

/// Write a metadata string as an auto-typed attribute.
pub fn write_item(
    store: &mut dyn ArrayStore,
    owner: AttrOwner,
    name: &str,
    value: &str,
) -> NetCdfResult<()> {
    let typed = classify(value).to_attr_value(store.format());
    store.put_attr(owner, name, typed)?;
    Ok(())
}

/// Read a text attribute.
pub fn text_attr(store: &dyn ArrayStore, owner: AttrOwner, name: &str) -> Option<String> {
    match store.get_attr(owner, name).ok().flatten()? {
        AttrValue::Text(s) => Some(s),
        other => Some(decode(&other).text),
    }
}

/// Read a numeric attribute as doubles.
pub fn numeric_attr(store: &dyn ArrayStore, owner: AttrOwner, name: &str) -> Option<Vec<f64>> {
    store.get_attr(owner, name).ok().flatten()?.to_f64_vec()
}
