//! Driver configuration and creation options.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NetCdfError, NetCdfResult};
use crate::store::Format;

/// Process-wide driver switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Force bottom-up (`Some(true)`) or top-down storage on read. `None`
    /// keeps the provenance-dependent default.
    pub bottom_up: Option<bool>,

    /// Shift longitude bands with values above 180 into [-180, 180].
    pub center_longitude_180: bool,

    /// Minimum writer version (`GDAL x.y`) treated as convention compliant.
    pub convention_min_version: (u32, u32),
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bottom_up: None,
            center_longitude_180: true,
            convention_min_version: (1, 9),
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse_version(val: &str) -> Option<(u32, u32)> {
    let mut parts = val.trim().splitn(2, '.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

impl DriverConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("NETCDF_RASTER_BOTTOMUP") {
            config.bottom_up = parse_bool(&val);
        }

        if let Some(val) = lookup("NETCDF_RASTER_CENTERLONG_180") {
            if let Some(flag) = parse_bool(&val) {
                config.center_longitude_180 = flag;
            }
        }

        if let Some(val) = lookup("NETCDF_RASTER_CONVENTION_MIN_VERSION") {
            if let Some(version) = parse_version(&val) {
                config.convention_min_version = version;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.convention_min_version.0 == 0 {
            return Err("convention_min_version major must be > 0".to_string());
        }
        Ok(())
    }
}

/// Options for opening an existing container.
///
/// The default driver configuration is read from the environment.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Raster variable to expose; required when several candidates exist.
    pub variable: Option<String>,

    /// Extra dimension names, slowest to fastest, overriding storage order
    /// for band enumeration.
    pub band_dim_order: Option<Vec<String>>,

    pub config: DriverConfig,

    /// Request update access. Existing containers are read-only.
    pub update: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            variable: None,
            band_dim_order: None,
            config: DriverConfig::from_env(),
            update: false,
        }
    }
}

impl OpenOptions {
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            variable: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Tri-state emission switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Yes,
    No,
    #[default]
    IfNeeded,
}

impl Policy {
    fn parse(val: &str) -> Option<Self> {
        match val.trim().to_ascii_uppercase().as_str() {
            "IF_NEEDED" => Some(Policy::IfNeeded),
            other => parse_bool(other).map(|b| if b { Policy::Yes } else { Policy::No }),
        }
    }

    /// Resolve against whether the structures are actually needed.
    pub fn resolve(self, needed: bool) -> bool {
        match self {
            Policy::Yes => true,
            Policy::No => false,
            Policy::IfNeeded => needed,
        }
    }
}

/// Element type of emitted coordinate arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordType {
    Float,
    #[default]
    Double,
}

/// Options for creating a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    pub format: Format,

    /// Write `spatial_ref`/`GeoTransform` on the grid-mapping variable.
    pub write_vendor_tags: Policy,

    /// Write 2D longitude/latitude arrays for projected rasters.
    pub write_lonlat: Policy,

    pub coord_type: CoordType,

    /// Store rows south to north.
    pub bottom_up: bool,

    /// Chunk raster variables one row per chunk on netCDF-4.
    pub chunking: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            format: Format::Nc,
            write_vendor_tags: Policy::Yes,
            write_lonlat: Policy::IfNeeded,
            coord_type: CoordType::Double,
            bottom_up: true,
            chunking: true,
        }
    }
}

impl CreateOptions {
    /// Parse `KEY=VALUE` creation options.
    ///
    /// Unknown keys are ignored with a warning; malformed values are errors.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> NetCdfResult<Self> {
        let mut options = Self::default();

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                NetCdfError::Precondition(format!("creation option '{}' is not KEY=VALUE", pair))
            })?;
            let bad = || {
                NetCdfError::Precondition(format!("invalid value '{}' for {}", value, key))
            };

            match key.trim().to_ascii_uppercase().as_str() {
                "FORMAT" => options.format = value.parse().map_err(|_| bad())?,
                "WRITE_GDAL_TAGS" => {
                    options.write_vendor_tags = Policy::parse(value).ok_or_else(bad)?
                }
                "WRITE_LONLAT" => options.write_lonlat = Policy::parse(value).ok_or_else(bad)?,
                "TYPE_LONLAT" => {
                    options.coord_type = match value.trim().to_ascii_uppercase().as_str() {
                        "FLOAT" => CoordType::Float,
                        "DOUBLE" => CoordType::Double,
                        _ => return Err(bad()),
                    }
                }
                "WRITE_BOTTOMUP" => options.bottom_up = parse_bool(value).ok_or_else(bad)?,
                "CHUNKING" => options.chunking = parse_bool(value).ok_or_else(bad)?,
                other => warn!(option = %other, "Ignoring unknown creation option"),
            }
        }

        Ok(options)
    }

    /// Chunking only applies to netCDF-4 generations.
    pub fn chunking_enabled(&self) -> bool {
        self.chunking && self.format.is_netcdf4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.bottom_up, None);
        assert!(config.center_longitude_180);
        assert_eq!(config.convention_min_version, (1, 9));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_driver_from_lookup() {
        let config = DriverConfig::from_lookup(|key| match key {
            "NETCDF_RASTER_BOTTOMUP" => Some("NO".to_string()),
            "NETCDF_RASTER_CENTERLONG_180" => Some("off".to_string()),
            "NETCDF_RASTER_CONVENTION_MIN_VERSION" => Some("2.1".to_string()),
            _ => None,
        });
        assert_eq!(config.bottom_up, Some(false));
        assert!(!config.center_longitude_180);
        assert_eq!(config.convention_min_version, (2, 1));

        let config = DriverConfig::from_lookup(|key| {
            (key == "NETCDF_RASTER_CENTERLONG_180").then(|| "maybe".to_string())
        });
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_open_options_read_environment() {
        let options = OpenOptions::variable("tas");
        assert_eq!(options.variable.as_deref(), Some("tas"));
        assert_eq!(options.config, DriverConfig::from_env());
        assert!(!options.update);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.9"), Some((1, 9)));
        assert_eq!(parse_version("2"), Some((2, 0)));
        assert_eq!(parse_version("x.1"), None);
    }

    #[test]
    fn test_create_option_pairs() {
        let options = CreateOptions::from_pairs(&[
            "FORMAT=NC4",
            "WRITE_GDAL_TAGS=NO",
            "WRITE_LONLAT=IF_NEEDED",
            "TYPE_LONLAT=FLOAT",
            "WRITE_BOTTOMUP=NO",
            "COMPRESS=DEFLATE",
        ])
        .unwrap();
        assert_eq!(options.format, Format::Nc4);
        assert_eq!(options.write_vendor_tags, Policy::No);
        assert_eq!(options.write_lonlat, Policy::IfNeeded);
        assert_eq!(options.coord_type, CoordType::Float);
        assert!(!options.bottom_up);
        assert!(options.chunking_enabled());
    }

    #[test]
    fn test_create_option_bad_value() {
        assert!(matches!(
            CreateOptions::from_pairs(&["WRITE_LONLAT=maybe"]),
            Err(NetCdfError::Precondition(_))
        ));
        assert!(CreateOptions::from_pairs(&["FORMAT"]).is_err());
    }

    #[test]
    fn test_create_options_deserialize_with_defaults() {
        let options: CreateOptions =
            serde_json::from_str(r#"{"format":"NC4C","write_lonlat":"yes"}"#).unwrap();
        assert_eq!(options.format, Format::Nc4Classic);
        assert_eq!(options.write_lonlat, Policy::Yes);
        assert_eq!(options.write_vendor_tags, Policy::Yes);
        assert!(options.bottom_up);
    }

    #[test]
    fn test_policy_resolve() {
        assert!(Policy::Yes.resolve(false));
        assert!(!Policy::No.resolve(true));
        assert!(Policy::IfNeeded.resolve(true));
        assert!(!Policy::IfNeeded.resolve(false));
    }
}
