//! Block windows, partial-block repacking and pixel validity rules.

use num_traits::{NumCast, ToPrimitive};

use crate::error::{NetCdfError, NetCdfResult};
use crate::store::{map_array, with_numeric, ArrayData};

/// Raster and block geometry of one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub raster_width: usize,
    pub raster_height: usize,
    pub block_width: usize,
    pub block_height: usize,
    /// Row 0 of the stored array is the southernmost row
    pub bottom_up: bool,
}

/// Stored region covered by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x_start: usize,
    pub y_start: usize,
    /// Actual width, clipped to the raster
    pub width: usize,
    /// Actual height, clipped to the raster
    pub height: usize,
}

impl BlockLayout {
    pub fn blocks_per_row(&self) -> usize {
        self.raster_width.div_ceil(self.block_width)
    }

    pub fn blocks_per_column(&self) -> usize {
        self.raster_height.div_ceil(self.block_height)
    }

    /// Nominal number of elements in a block buffer.
    pub fn block_len(&self) -> usize {
        self.block_width * self.block_height
    }

    /// Stored window of block `(col, row)`.
    pub fn plan_window(&self, col: usize, row: usize) -> NetCdfResult<Window> {
        if self.bottom_up && self.block_height != 1 {
            return Err(NetCdfError::Unsupported(format!(
                "bottom-up storage with block height {}",
                self.block_height
            )));
        }

        let x_start = col * self.block_width;
        let y_start = row * self.block_height;
        if x_start >= self.raster_width || y_start >= self.raster_height {
            return Err(NetCdfError::OutOfRange(format!(
                "block ({}, {}) outside {}x{} raster",
                col, row, self.raster_width, self.raster_height
            )));
        }

        let width = self.block_width.min(self.raster_width - x_start);
        let height = self.block_height.min(self.raster_height - y_start);
        let y_start = if self.bottom_up {
            self.raster_height - 1 - row
        } else {
            y_start
        };

        Ok(Window {
            x_start,
            y_start,
            width,
            height,
        })
    }
}

/// Element types a band can hold.
pub trait Sample: Copy + PartialOrd + NumCast + 'static {
    fn is_nan_sample(self) -> bool {
        false
    }
}

macro_rules! impl_integer_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {})*
    };
}

impl_integer_sample!(i8, u8, i16, u16, i32, u32, i64, u64);

impl Sample for f32 {
    fn is_nan_sample(self) -> bool {
        self.is_nan()
    }
}

impl Sample for f64 {
    fn is_nan_sample(self) -> bool {
        self.is_nan()
    }
}

/// Pixel validity policy of a band.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Validity {
    pub nodata: Option<f64>,
    /// Replace NaN with no-data (floating types only)
    pub nan_check: bool,
    pub valid_range: Option<(f64, f64)>,
}

fn cast<T: Sample>(v: f64) -> Option<T> {
    <T as NumCast>::from(v)
}

/// Spread `width * height` contiguous samples at the front of `buf` to a
/// `block_width` row pitch, filling every unused element with `fill`.
pub fn repack_partial<T: Copy>(
    buf: &mut Vec<T>,
    width: usize,
    height: usize,
    block_width: usize,
    block_height: usize,
    fill: T,
) {
    buf.resize(block_width * block_height, fill);
    if width < block_width {
        for row in (0..height).rev() {
            let src = row * width;
            let dst = row * block_width;
            buf.copy_within(src..src + width, dst);
            buf[dst + width..dst + block_width].fill(fill);
        }
    }
    buf[height * block_width..].fill(fill);
}

/// Keep the first `width` samples of each of `height` rows at `block_width`
/// pitch.
pub fn compact_rows<T: Clone>(
    buf: &[T],
    width: usize,
    height: usize,
    block_width: usize,
) -> Vec<T> {
    if width == block_width {
        return buf[..width * height].to_vec();
    }
    (0..height)
        .flat_map(|row| buf[row * block_width..row * block_width + width].iter().cloned())
        .collect()
}

/// Apply no-data passthrough, NaN replacement and the valid range.
pub fn apply_validity<T: Sample>(buf: &mut [T], validity: &Validity) {
    let Some(nodata) = validity.nodata.and_then(cast::<T>) else {
        return;
    };
    let range = validity
        .valid_range
        .and_then(|(lo, hi)| Some((cast::<T>(lo)?, cast::<T>(hi)?)));

    for v in buf.iter_mut() {
        if *v == nodata {
            continue;
        }
        if validity.nan_check && v.is_nan_sample() {
            *v = nodata;
            continue;
        }
        if let Some((lo, hi)) = range {
            if *v < lo || *v > hi {
                *v = nodata;
            }
        }
    }
}

/// Subtract 360 from every non-no-data sample.
pub fn shift_longitudes<T: Sample>(buf: &mut [T], nodata: Option<f64>) {
    let nodata = nodata.and_then(cast::<T>);
    for v in buf.iter_mut() {
        if Some(*v) == nodata {
            continue;
        }
        if let Some(shifted) = v.to_f64().and_then(|x| cast::<T>(x - 360.0)) {
            *v = shifted;
        }
    }
}

/// Whether the raw first and last samples call for a longitude shift.
pub fn needs_longitude_shift(data: &ArrayData) -> bool {
    let (Some(first), Some(last)) = (data.get_f64(0), data.get_f64(data.len().saturating_sub(1)))
    else {
        return false;
    };
    first.min(last) > 180.0
}

/// Repack a block read from the store to the nominal block shape.
pub fn repack_block(data: &mut ArrayData, window: &Window, layout: &BlockLayout, fill: f64) {
    let (bw, bh) = (layout.block_width, layout.block_height);
    if window.width == bw && window.height == bh {
        return;
    }
    with_numeric!(data, v => {
        if let Some(fill) = cast(fill).or_else(|| NumCast::from(0u8)) {
            repack_partial(v, window.width, window.height, bw, bh, fill);
        }
    }, _ => {})
}

/// Apply validity rules to typed block data.
pub fn apply_validity_data(data: &mut ArrayData, validity: &Validity) {
    with_numeric!(data, v => apply_validity(v, validity), _ => {})
}

/// Shift longitudes of typed block data.
pub fn shift_longitudes_data(data: &mut ArrayData, nodata: Option<f64>) {
    with_numeric!(data, v => shift_longitudes(v, nodata), _ => {})
}

/// Clip a nominal block buffer to the stored window before writing.
pub fn compact_block(data: &ArrayData, window: &Window, layout: &BlockLayout) -> ArrayData {
    let bw = layout.block_width;
    map_array!(data, v => compact_rows(v, window.width, window.height, bw))
}
