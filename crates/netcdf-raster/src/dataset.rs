//! Raster view of an array container.
//!
//! Opening picks one variable of two or more dimensions, exposes its last
//! two dimensions as the raster grid and every combination of the others
//! as a band. Creating writes bands, global metadata and georeferencing in
//! a CF layout.

use std::sync::Arc;

use chrono::Utc;
use projection::SpatialRef;
use tracing::{debug, info, instrument};

use crate::access::{ContainerAccess, ContainerState, Mode};
use crate::attributes::{
    decode, is_managed_global, read_into, strip_global_prefix, text_attr, write_item,
};
use crate::band::{byte_storage, RasterBand, RasterShape};
use crate::config::{CreateOptions, OpenOptions};
use crate::diagnostics::{DiagnosticDomain, Diagnostics};
use crate::error::{NetCdfError, NetCdfResult};
use crate::georef::inference::{COORDINATES, WRITER_NAME, WRITER_TAG};
use crate::georef::{self, EmitGrid, GeolocationArrays, Georeference, SpatialAxes};
use crate::geotransform::GeoTransform;
use crate::indexer::{DimensionIndexer, ExtraDim};
use crate::metadata::{
    MetadataMap, DEFAULT_DOMAIN, GEOLOCATION_DOMAIN, GLOBAL_OWNER, SUBDATASETS_DOMAIN,
};
use crate::store::{ArrayData, ArrayStore, AttrOwner, AttrValue, NcType, VarInfo};

pub const CONVENTIONS: &str = "Conventions";
pub const CF_VERSION: &str = "CF-1.5";
pub const HISTORY: &str = "history";

/// Prefix of subdataset names.
pub const SUBDATASET_PREFIX: &str = "NETCDF";

/// Non-spatial dimension of a raster being created.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraDimSpec {
    pub name: String,
    pub len: usize,
    /// Coordinate variable type and values, when the dimension has one
    pub coordinate: Option<(NcType, Vec<f64>)>,
}

impl ExtraDimSpec {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
            coordinate: None,
        }
    }

    pub fn with_values(mut self, nc_type: NcType, values: Vec<f64>) -> Self {
        self.coordinate = Some((nc_type, values));
        self
    }
}

/// Shape of a raster being created.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSpec {
    pub width: usize,
    pub height: usize,
    /// Extra dimensions, slowest first
    pub extra_dims: Vec<ExtraDimSpec>,
}

impl RasterSpec {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            extra_dims: Vec::new(),
        }
    }
}

/// Write-side state of a dataset being created.
struct Creation {
    options: CreateOptions,
    grid: EmitGrid,
    extra: Vec<ExtraDim>,
    srs: Option<SpatialRef>,
    transform: Option<GeoTransform>,
    emitted: bool,
}

/// A raster dataset over one container.
pub struct Dataset {
    access: Arc<ContainerAccess>,
    path: String,
    width: usize,
    height: usize,
    bands: Vec<RasterBand>,
    metadata: MetadataMap,
    subdatasets: MetadataMap,
    geolocation: MetadataMap,
    srs: Option<SpatialRef>,
    transform: Option<GeoTransform>,
    georeference: Option<Georeference>,
    creation: Option<Creation>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bands", &self.bands.len())
            .finish()
    }
}

/// Split `NETCDF:"path":variable` into its parts.
pub fn parse_subdataset_name(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix(SUBDATASET_PREFIX)?.strip_prefix(':')?;
    let (path, var) = match rest.strip_prefix('"') {
        Some(quoted) => {
            let end = quoted.find('"')?;
            let var = quoted[end + 1..].strip_prefix(':')?;
            (&quoted[..end], var)
        }
        None => rest.rsplit_once(':')?,
    };
    if path.is_empty() || var.is_empty() {
        return None;
    }
    Some((path.to_string(), var.to_string()))
}

fn subdataset_name(path: &str, var: &str) -> String {
    format!("{}:\"{}\":{}", SUBDATASET_PREFIX, path, var)
}

fn braced(text: String) -> String {
    if text.starts_with('{') {
        text
    } else {
        format!("{{{}}}", text)
    }
}

/// Names of variables referenced by `coordinates` or `bounds` attributes.
fn referenced_variables(store: &dyn ArrayStore) -> Vec<String> {
    let mut names = Vec::new();
    for var in store.variables() {
        for attr in [COORDINATES, "bounds"] {
            if let Some(text) = text_attr(store, AttrOwner::Var(var.id), attr) {
                names.extend(text.split_whitespace().map(str::to_string));
            }
        }
    }
    names
}

/// Variables that can be exposed as rasters.
pub fn raster_candidates(store: &dyn ArrayStore) -> Vec<VarInfo> {
    let referenced = referenced_variables(store);
    store
        .variables()
        .into_iter()
        .filter(|v| v.dims.len() >= 2 && v.nc_type != NcType::Char)
        .filter(|v| !referenced.contains(&v.name))
        .collect()
}

fn history_line(entry: &str) -> String {
    format!("{}: {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), entry)
}

/// Append a timestamped line to the global history.
fn append_history(state: &mut ContainerState, entry: &str) -> NetCdfResult<String> {
    let line = history_line(entry);
    let history = match text_attr(state.store.as_ref(), AttrOwner::Global, HISTORY) {
        Some(old) if !old.is_empty() => format!("{}\n{}", old, line),
        _ => line,
    };
    state.ensure_mode(Mode::Define)?;
    state
        .store
        .put_attr(AttrOwner::Global, HISTORY, history.as_str().into())?;
    Ok(history)
}

impl Dataset {
    /// Open a container for reading.
    #[instrument(skip(store, options), fields(path = %store.path()))]
    pub fn open_store(store: Box<dyn ArrayStore>, options: OpenOptions) -> NetCdfResult<Self> {
        if options.update {
            return Err(NetCdfError::UpdateNotSupported);
        }
        options
            .config
            .validate()
            .map_err(NetCdfError::Precondition)?;

        let path = store.path().to_string();
        let access = Arc::new(ContainerAccess::new(
            store,
            options.config.center_longitude_180,
        ));
        let mut guard = access.lock();
        guard.ensure_mode(Mode::Data)?;

        let mut metadata = MetadataMap::new();
        read_into(
            guard.store.as_ref(),
            AttrOwner::Global,
            GLOBAL_OWNER,
            &mut metadata,
        )?;

        let candidates = raster_candidates(guard.store.as_ref());
        let mut subdatasets = MetadataMap::new();
        let selected = match &options.variable {
            Some(name) => {
                let id = guard
                    .store
                    .var_id(name)
                    .ok_or_else(|| NetCdfError::VariableNotFound(name.clone()))?;
                Some(guard.store.variable(id)?)
            }
            None if candidates.len() == 1 => candidates.into_iter().next(),
            None => {
                for (i, var) in candidates.iter().enumerate() {
                    let shape = var
                        .dims
                        .iter()
                        .map(|&d| guard.store.dimension(d).map(|info| info.len.to_string()))
                        .collect::<Result<Vec<_>, _>>()?
                        .join("x");
                    subdatasets.set(
                        format!("SUBDATASET_{}_NAME", i + 1),
                        subdataset_name(&path, &var.name),
                    );
                    subdatasets.set(
                        format!("SUBDATASET_{}_DESC", i + 1),
                        format!("[{}] {} ({})", shape, var.name, var.nc_type.description()),
                    );
                }
                None
            }
        };

        let Some(var) = selected else {
            debug!(subdatasets = subdatasets.len() / 2, "Opened container without raster");
            drop(guard);
            return Ok(Self {
                access,
                path,
                width: 0,
                height: 0,
                bands: Vec::new(),
                metadata,
                subdatasets,
                geolocation: MetadataMap::new(),
                srs: None,
                transform: None,
                georeference: None,
                creation: None,
            });
        };

        if var.dims.len() < 2 {
            return Err(NetCdfError::TooFewDimensions(var.name));
        }
        let dims = var
            .dims
            .iter()
            .map(|&d| guard.store.dimension(d))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(zero) = dims.iter().find(|d| d.len == 0) {
            return Err(NetCdfError::ZeroLengthDimension(zero.name.clone()));
        }

        let ndims = dims.len();
        let (x_dim, y_dim) = (&dims[ndims - 1], &dims[ndims - 2]);
        let mut extra: Vec<ExtraDim> = dims[..ndims - 2]
            .iter()
            .enumerate()
            .map(|(axis, d)| ExtraDim {
                name: d.name.clone(),
                len: d.len,
                axis,
            })
            .collect();
        if let Some(order) = &options.band_dim_order {
            extra = reorder_extra(extra, order)?;
        }
        describe_extra_dims(guard.store.as_ref(), &extra, &mut metadata)?;

        let state: &mut ContainerState = &mut guard;
        let georeference = georef::infer(
            state.store.as_ref(),
            SpatialAxes {
                var: var.id,
                x_dim: &x_dim.name,
                y_dim: &y_dim.name,
                width: x_dim.len,
                height: y_dim.len,
            },
            &options.config,
            &mut state.diagnostics,
        )?;
        metadata.extend(georeference.extra_metadata.iter());

        let shape = Arc::new(RasterShape {
            var_id: var.id,
            var_name: var.name.clone(),
            var_type: var.nc_type,
            ndims,
            x_axis: ndims - 1,
            y_axis: ndims - 2,
            width: x_dim.len,
            height: y_dim.len,
            indexer: DimensionIndexer::new(extra)?,
            bottom_up: georeference.bottom_up,
        });
        let bands = (0..shape.indexer.band_count())
            .map(|level| RasterBand::discover(&mut guard, access.clone(), shape.clone(), level))
            .collect::<NetCdfResult<Vec<_>>>()?;

        info!(
            variable = %var.name,
            width = shape.width,
            height = shape.height,
            bands = bands.len(),
            "Opened raster"
        );
        drop(guard);

        Ok(Self {
            access,
            path,
            width: shape.width,
            height: shape.height,
            bands,
            metadata,
            subdatasets,
            geolocation: georeference.geolocation.clone(),
            srs: georeference.srs.clone(),
            transform: georeference.transform,
            georeference: Some(georeference),
            creation: None,
        })
    }

    /// Create a raster in an empty store.
    #[instrument(skip(store, options), fields(path = %store.path()))]
    pub fn create(
        store: Box<dyn ArrayStore>,
        spec: RasterSpec,
        options: CreateOptions,
    ) -> NetCdfResult<Self> {
        if store.format() != options.format {
            return Err(NetCdfError::Precondition(format!(
                "store format {} does not match requested {}",
                store.format().name(),
                options.format.name()
            )));
        }
        if spec.width == 0 || spec.height == 0 {
            return Err(NetCdfError::ZeroLengthDimension(
                if spec.width == 0 { "x" } else { "y" }.to_string(),
            ));
        }

        let path = store.path().to_string();
        let access = Arc::new(ContainerAccess::new(store, false));
        let mut guard = access.lock();
        guard.ensure_mode(Mode::Define)?;

        let mut extra = Vec::new();
        let mut coordinates = Vec::new();
        for (axis, dim) in spec.extra_dims.iter().enumerate() {
            if dim.len == 0 {
                return Err(NetCdfError::ZeroLengthDimension(dim.name.clone()));
            }
            let id = guard.store.def_dim(&dim.name, dim.len)?;
            if let Some((nc_type, values)) = &dim.coordinate {
                let var = guard.store.def_var(&dim.name, *nc_type, &[id])?;
                coordinates.push((var, ArrayData::from_f64(*nc_type, values), dim.len));
            }
            extra.push(ExtraDim {
                name: dim.name.clone(),
                len: dim.len,
                axis,
            });
        }
        let y_dim = guard.store.def_dim("y", spec.height)?;
        let x_dim = guard.store.def_dim("x", spec.width)?;

        let globals = [
            (CONVENTIONS, CF_VERSION.to_string()),
            (
                WRITER_TAG,
                format!("{} {}", WRITER_NAME, env!("CARGO_PKG_VERSION")),
            ),
            (HISTORY, history_line(&format!("Created by {}", WRITER_NAME))),
        ];
        let mut metadata = MetadataMap::new();
        for (name, value) in globals {
            guard
                .store
                .put_attr(AttrOwner::Global, name, value.as_str().into())?;
            metadata.set(format!("{}#{}", GLOBAL_OWNER, name), value);
        }

        if !coordinates.is_empty() {
            guard.ensure_mode(Mode::Data)?;
            for (var, data, len) in coordinates {
                guard.store.write(var, &[0], &[len], &data)?;
            }
        }
        describe_extra_dims(guard.store.as_ref(), &extra, &mut metadata)?;
        drop(guard);

        info!(
            width = spec.width,
            height = spec.height,
            extra_dims = extra.len(),
            format = options.format.name(),
            "Created raster container"
        );

        let grid = EmitGrid {
            x_dim,
            y_dim,
            width: spec.width,
            height: spec.height,
            bottom_up: options.bottom_up,
        };
        Ok(Self {
            access,
            path,
            width: spec.width,
            height: spec.height,
            bands: Vec::new(),
            metadata,
            subdatasets: MetadataMap::new(),
            geolocation: MetadataMap::new(),
            srs: None,
            transform: None,
            georeference: None,
            creation: Some(Creation {
                options,
                grid,
                extra,
                srs: None,
                transform: None,
                emitted: false,
            }),
        })
    }

    fn creation(&self) -> NetCdfResult<&Creation> {
        self.creation
            .as_ref()
            .ok_or_else(|| NetCdfError::Precondition("dataset is read-only".to_string()))
    }

    fn creation_mut(&mut self) -> NetCdfResult<&mut Creation> {
        self.creation
            .as_mut()
            .ok_or_else(|| NetCdfError::Precondition("dataset is read-only".to_string()))
    }

    /// Define a raster variable spanning the extra dimensions and the grid,
    /// adding one band per extra-dimension combination. Returns the number
    /// of the first band added.
    pub fn add_variable(&mut self, name: &str, data_type: NcType) -> NetCdfResult<usize> {
        let creation = self.creation()?;
        if !data_type.is_numeric() {
            return Err(NetCdfError::Unsupported(format!(
                "{} bands",
                data_type.description()
            )));
        }
        let grid = creation.grid;
        let extra = creation.extra.clone();
        let chunking = creation.options.chunking_enabled();
        let bottom_up = creation.options.bottom_up;

        let mut guard = self.access.lock();
        guard.ensure_mode(Mode::Define)?;
        let mut dims: Vec<usize> = extra
            .iter()
            .map(|d| {
                guard
                    .store
                    .dim_id(&d.name)
                    .ok_or_else(|| NetCdfError::VariableNotFound(d.name.clone()))
            })
            .collect::<NetCdfResult<_>>()?;
        dims.extend([grid.y_dim, grid.x_dim]);

        let (storage, sign_attrs) = byte_storage(data_type, guard.store.format());
        let var = guard.store.def_var(name, storage, &dims)?;
        for (attr, value) in sign_attrs {
            guard.store.put_attr(AttrOwner::Var(var), attr, value)?;
        }
        if chunking {
            let mut chunks = vec![1; dims.len()];
            chunks[dims.len() - 1] = grid.width;
            guard.store.set_chunking(var, &chunks)?;
        }
        guard.attach_references(var)?;

        let shape = Arc::new(RasterShape {
            var_id: var,
            var_name: name.to_string(),
            var_type: storage,
            ndims: dims.len(),
            x_axis: dims.len() - 1,
            y_axis: dims.len() - 2,
            width: grid.width,
            height: grid.height,
            indexer: DimensionIndexer::new(extra)?,
            bottom_up,
        });
        let first = self.bands.len() + 1;
        for level in 0..shape.indexer.band_count() {
            let band = RasterBand::discover(&mut guard, self.access.clone(), shape.clone(), level)?;
            self.bands.push(band);
        }
        debug!(variable = name, first_band = first, "Added raster variable");
        Ok(first)
    }

    /// Add a band stored in its own variable `Band<n>`.
    pub fn add_band(&mut self, data_type: NcType) -> NetCdfResult<usize> {
        let name = format!("Band{}", self.bands.len() + 1);
        self.add_variable(&name, data_type)
    }

    pub fn set_spatial_ref(&mut self, srs: SpatialRef) -> NetCdfResult<()> {
        srs.validate()?;
        let creation = self.creation_mut()?;
        if creation.emitted {
            return Err(NetCdfError::Precondition(
                "georeferencing already written".to_string(),
            ));
        }
        creation.srs = Some(srs.clone());
        self.srs = Some(srs);
        self.emit_if_ready(None)
    }

    pub fn set_geo_transform(&mut self, transform: GeoTransform) -> NetCdfResult<()> {
        let creation = self.creation_mut()?;
        if creation.emitted {
            return Err(NetCdfError::Precondition(
                "georeferencing already written".to_string(),
            ));
        }
        if transform.is_rotated() {
            return Err(NetCdfError::Unsupported(
                "rotated geotransforms cannot be written".to_string(),
            ));
        }
        creation.transform = Some(transform);
        self.transform = Some(transform);
        self.emit_if_ready(None)
    }

    /// Emit georeferencing once both the CRS and the transform are known.
    pub(crate) fn emit_if_ready(
        &mut self,
        geolocation: Option<&dyn GeolocationArrays>,
    ) -> NetCdfResult<()> {
        let Some(creation) = self.creation.as_mut() else {
            return Ok(());
        };
        let (Some(srs), Some(transform)) = (&creation.srs, &creation.transform) else {
            return Ok(());
        };
        if creation.emitted {
            return Ok(());
        }

        let mut guard = self.access.lock();
        let attachment = georef::emit(
            &mut guard,
            srs,
            transform,
            &creation.grid,
            &creation.options,
            geolocation,
        )?;
        creation.emitted = true;

        let band_vars: Vec<usize> = {
            let mut vars: Vec<usize> = self.bands.iter().map(RasterBand::var_id).collect();
            vars.dedup();
            vars
        };
        for var in band_vars {
            guard.attach_references(var)?;
        }
        debug!(grid_mapping = ?attachment.grid_mapping, "Georeferencing attached");
        Ok(())
    }

    /// Store-level access to the pending georeferencing, for copies that
    /// carry geolocation arrays.
    pub(crate) fn set_georeferencing(
        &mut self,
        srs: SpatialRef,
        transform: GeoTransform,
        geolocation: Option<&dyn GeolocationArrays>,
    ) -> NetCdfResult<()> {
        let creation = self.creation_mut()?;
        creation.srs = Some(srs.clone());
        creation.transform = Some(transform);
        self.srs = Some(srs);
        self.transform = Some(transform);
        self.emit_if_ready(geolocation)
    }

    /// Set a dataset metadata item. `NC_GLOBAL#` keys are written as global
    /// attributes on created datasets.
    pub fn set_metadata_item(&mut self, key: &str, value: &str) -> NetCdfResult<()> {
        if let Some(name) = strip_global_prefix(key) {
            if self.creation.is_some() {
                let mut guard = self.access.lock();
                if name == HISTORY {
                    let history = append_history(&mut guard, value)?;
                    drop(guard);
                    self.metadata.set(key, history);
                    return Ok(());
                }
                if !is_managed_global(name) {
                    guard.ensure_mode(Mode::Define)?;
                    write_item(guard.store.as_mut(), AttrOwner::Global, name, value)?;
                }
            }
        }
        self.metadata.set(key, value);
        Ok(())
    }

    /// Append a timestamped line to the `history` attribute.
    pub fn add_history(&mut self, entry: &str) -> NetCdfResult<()> {
        self.creation()?;
        let mut guard = self.access.lock();
        let history = append_history(&mut guard, entry)?;
        drop(guard);
        self.metadata
            .set(format!("{}#{}", GLOBAL_OWNER, HISTORY), history);
        Ok(())
    }

    /// Switch the container to data mode ahead of bulk pixel writes.
    pub fn enter_data_mode(&mut self) -> NetCdfResult<()> {
        self.access.lock().ensure_mode(Mode::Data)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band `number`, 1-based.
    pub fn band(&self, number: usize) -> NetCdfResult<&RasterBand> {
        number
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or_else(|| band_out_of_range(number, self.bands.len()))
    }

    pub fn band_mut(&mut self, number: usize) -> NetCdfResult<&mut RasterBand> {
        let count = self.bands.len();
        number
            .checked_sub(1)
            .and_then(|i| self.bands.get_mut(i))
            .ok_or_else(|| band_out_of_range(number, count))
    }

    pub fn bands(&self) -> &[RasterBand] {
        &self.bands
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.srs.as_ref()
    }

    pub fn geo_transform(&self) -> Option<GeoTransform> {
        self.transform
    }

    /// Georeference inference outcome of an opened raster.
    pub fn georeference(&self) -> Option<&Georeference> {
        self.georeference.as_ref()
    }

    /// Metadata of `domain`: the default domain, `SUBDATASETS` or
    /// `GEOLOCATION`.
    pub fn metadata(&self, domain: &str) -> Option<&MetadataMap> {
        match domain {
            DEFAULT_DOMAIN => Some(&self.metadata),
            SUBDATASETS_DOMAIN => Some(&self.subdatasets),
            GEOLOCATION_DOMAIN if !self.geolocation.is_empty() => Some(&self.geolocation),
            _ => None,
        }
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> Diagnostics {
        self.access.lock().diagnostics.clone()
    }

    /// Flush pending georeferencing and leave the container in data mode.
    fn finish(&mut self) -> NetCdfResult<()> {
        let pending = self
            .creation
            .as_ref()
            .filter(|c| !c.emitted)
            .map(|c| (c.srs.is_some(), c.transform.is_some()));
        match pending {
            Some((true, false)) => {
                self.creation_mut()?.transform = Some(GeoTransform::default());
                self.transform = Some(GeoTransform::default());
                self.emit_if_ready(None)?;
            }
            Some((false, true)) => self.access.lock().diagnostics.warn(
                DiagnosticDomain::Emission,
                "Geotransform without spatial reference not written",
            ),
            _ => {}
        }
        let mut guard = self.access.lock();
        guard.ensure_mode(Mode::Data)?;
        guard.store.sync()?;
        Ok(())
    }

    /// Finish writing and return the collected diagnostics.
    pub fn close(mut self) -> NetCdfResult<Diagnostics> {
        self.finish()?;
        Ok(self.diagnostics())
    }

    /// Finish writing and hand back the store.
    pub fn into_store(mut self) -> NetCdfResult<Box<dyn ArrayStore>> {
        self.finish()?;
        self.bands.clear();
        let access = Arc::try_unwrap(self.access).map_err(|_| {
            NetCdfError::Precondition("container still referenced".to_string())
        })?;
        Ok(access.into_state().store)
    }
}

fn band_out_of_range(number: usize, count: usize) -> NetCdfError {
    NetCdfError::OutOfRange(format!("band {} of {}", number, count))
}

/// Reorder extra dimensions to the requested enumeration order.
fn reorder_extra(extra: Vec<ExtraDim>, order: &[String]) -> NetCdfResult<Vec<ExtraDim>> {
    if order.len() != extra.len() {
        return Err(NetCdfError::Precondition(format!(
            "band dimension order names {} of {} extra dimensions",
            order.len(),
            extra.len()
        )));
    }
    order
        .iter()
        .map(|name| {
            extra
                .iter()
                .find(|d| &d.name == name)
                .cloned()
                .ok_or_else(|| {
                    NetCdfError::Precondition(format!("{} is not an extra dimension", name))
                })
        })
        .collect()
}

/// Dataset-level description of the extra dimensions.
///
/// Requires data mode when coordinate variables exist.
fn describe_extra_dims(
    store: &dyn ArrayStore,
    extra: &[ExtraDim],
    metadata: &mut MetadataMap,
) -> NetCdfResult<()> {
    if extra.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = extra.iter().map(|d| d.name.as_str()).collect();
    metadata.set("NETCDF_DIM_EXTRA", format!("{{{}}}", names.join(",")));

    for dim in extra {
        let coordinate = store.dim_id(&dim.name).and_then(|dim_id| {
            let var = store.var_id(&dim.name)?;
            let info = store.variable(var).ok()?;
            (info.dims == [dim_id] && info.nc_type.is_numeric()).then_some(info)
        });
        let nc_type = coordinate.as_ref().map_or(NcType::Int, |c| c.nc_type);
        metadata.set(
            format!("NETCDF_DIM_{}_DEF", dim.name),
            format!("{{{},{}}}", dim.len, nc_type.code()),
        );

        let values = match coordinate {
            Some(info) => {
                let data = store.read(info.id, &[0], &[dim.len], info.nc_type)?;
                decode(&AttrValue::Values(data)).text
            }
            None => (1..=dim.len)
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(","),
        };
        metadata.set(format!("NETCDF_DIM_{}_VALUES", dim.name), braced(values));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subdataset_name() {
        assert_eq!(
            parse_subdataset_name("NETCDF:\"/data/a b.nc\":temp"),
            Some(("/data/a b.nc".to_string(), "temp".to_string()))
        );
        assert_eq!(
            parse_subdataset_name("NETCDF:file.nc:temp"),
            Some(("file.nc".to_string(), "temp".to_string()))
        );
        assert_eq!(parse_subdataset_name("GTIFF:file.tif"), None);
        assert_eq!(parse_subdataset_name("NETCDF:\"file.nc\""), None);
    }

    #[test]
    fn test_reorder_extra() {
        let extra = vec![
            ExtraDim { name: "time".into(), len: 2, axis: 0 },
            ExtraDim { name: "level".into(), len: 3, axis: 1 },
        ];
        let reordered = reorder_extra(extra.clone(), &["level".into(), "time".into()]).unwrap();
        assert_eq!(reordered[0].axis, 1);
        assert!(reorder_extra(extra.clone(), &["depth".into(), "time".into()]).is_err());
        assert!(reorder_extra(extra, &["time".into()]).is_err());
    }

    #[test]
    fn test_history_line_format() {
        let line = history_line("Created");
        let (stamp, entry) = line.split_once(": ").unwrap();
        assert_eq!(entry, "Created");
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%SZ").is_ok());
    }
}
