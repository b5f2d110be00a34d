//! Raster access to CF/netCDF array containers.
//!
//! A container's multi-dimensional variables are exposed as datasets of 2D
//! bands with an affine geotransform and a coordinate reference system.
//! Extra dimensions (time, level, ...) become band stacks. Writing goes the
//! other way: a raster and its georeferencing are laid out as CF variables,
//! a grid-mapping variable and coordinate arrays.
//!
//! # Layers
//!
//! - [`store`]: the [`ArrayStore`] primitives, with an in-memory store and a
//!   libnetcdf-backed one behind the `native` feature
//! - [`dataset`] / [`band`]: open, create and block I/O
//! - [`georef`]: CRS and geotransform inference and emission
//! - [`copy`]: copying any [`RasterSource`] into a new container
//! - [`vector`]: record-dimension feature layers
//!
//! # Example
//!
//! ```
//! use netcdf_raster::{Dataset, MemoryStore, OpenOptions};
//! use netcdf_raster::store::{ArrayData, ArrayStore, Format, NcType};
//!
//! let mut store = MemoryStore::create("mem.nc", Format::Nc);
//! let y = store.def_dim("y", 2).unwrap();
//! let x = store.def_dim("x", 3).unwrap();
//! let var = store.def_var("temp", NcType::Float, &[y, x]).unwrap();
//! store.enddef().unwrap();
//! store
//!     .write(var, &[0, 0], &[2, 3], &ArrayData::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
//!     .unwrap();
//!
//! let dataset = Dataset::open_store(Box::new(store), OpenOptions::default()).unwrap();
//! assert_eq!(dataset.band_count(), 1);
//! assert_eq!(dataset.band(1).unwrap().width(), 3);
//! ```

pub mod access;
pub mod attributes;
pub mod band;
pub mod block;
pub mod config;
pub mod copy;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod georef;
pub mod geotransform;
pub mod indexer;
pub mod metadata;
pub mod store;
pub mod vector;

pub use band::RasterBand;
pub use config::{CreateOptions, DriverConfig, OpenOptions, Policy};
pub use copy::{create_copy, MemBand, MemRaster, ProgressFn, RasterSource};
pub use dataset::{Dataset, ExtraDimSpec, RasterSpec};
pub use diagnostics::{Diagnostic, DiagnosticDomain, Diagnostics};
pub use error::{NetCdfError, NetCdfResult};
pub use geotransform::GeoTransform;
pub use metadata::MetadataMap;
pub use store::{ArrayStore, MemoryStore};
pub use vector::VectorLayer;

#[cfg(feature = "native")]
pub use store::NativeStore;

/// Open a container file, or one variable of it named
/// `NETCDF:"<path>":<variable>`.
#[cfg(feature = "native")]
pub fn open(name: &str, mut options: OpenOptions) -> NetCdfResult<Dataset> {
    let path = match dataset::parse_subdataset_name(name) {
        Some((path, variable)) => {
            options.variable = Some(variable);
            path
        }
        None => name.to_string(),
    };
    let store = NativeStore::open(&path)?;
    Dataset::open_store(Box::new(store), options)
}

/// Create a container file for a new raster.
#[cfg(feature = "native")]
pub fn create(
    path: impl AsRef<std::path::Path>,
    spec: RasterSpec,
    options: CreateOptions,
) -> NetCdfResult<Dataset> {
    let store = NativeStore::create(path, options.format)?;
    Dataset::create(Box::new(store), spec, options)
}

/// Copy `source` into a new container file.
#[cfg(feature = "native")]
pub fn copy_to(
    path: impl AsRef<std::path::Path>,
    source: &dyn RasterSource,
    options: CreateOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> NetCdfResult<Dataset> {
    let store = NativeStore::create(path, options.format)?;
    create_copy(Box::new(store), source, options, progress)
}
