//! Affine pixel-to-world transform.

use crate::attributes::format_g;

/// Six affine coefficients in the conventional order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the first pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

impl GeoTransform {
    /// North-up transform without rotation.
    pub fn north_up(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }

    /// World coordinates of a fractional pixel position.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let g = &self.0;
        (
            g[0] + col * g[1] + row * g[2],
            g[3] + col * g[4] + row * g[5],
        )
    }

    /// World coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Parse six whitespace-separated numbers.
    pub fn parse(text: &str) -> Option<Self> {
        let values: Vec<f64> = text
            .split_whitespace()
            .map(|t| t.parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        let coeffs: [f64; 6] = values.try_into().ok()?;
        Some(GeoTransform(coeffs))
    }

    /// Space-separated form written to the `GeoTransform` attribute.
    pub fn to_vendor_string(&self) -> String {
        self.0
            .iter()
            .map(|&v| format_g(v, 16))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Transform from the outer edges of a raster whose pixel centres span
    /// `[west, east]` and `[south, north]`.
    pub fn from_center_extent(
        west: f64,
        east: f64,
        south: f64,
        north: f64,
        width: usize,
        height: usize,
    ) -> Self {
        let dx = if width > 1 {
            (east - west) / (width - 1) as f64
        } else {
            0.0
        };
        let dy = if height > 1 {
            (north - south) / (height - 1) as f64
        } else {
            0.0
        };
        GeoTransform::north_up(west - dx / 2.0, dx, north + dy / 2.0, -dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let gt = GeoTransform::parse("-180 0.5 0 90 0 -0.5").unwrap();
        assert_eq!(gt, GeoTransform::north_up(-180.0, 0.5, 90.0, -0.5));
        assert_eq!(gt.to_vendor_string(), "-180 0.5 0 90 0 -0.5");
        assert!(GeoTransform::parse("1 2 3").is_none());
        assert!(GeoTransform::parse("1 2 3 4 5 x").is_none());
    }

    #[test]
    fn test_pixel_center() {
        let gt = GeoTransform::north_up(100.0, 10.0, 500.0, -10.0);
        assert_eq!(gt.pixel_center(0, 0), (105.0, 495.0));
        assert_eq!(gt.pixel_center(2, 1), (125.0, 485.0));
    }

    #[test]
    fn test_from_center_extent() {
        let gt = GeoTransform::from_center_extent(0.5, 9.5, 0.5, 4.5, 10, 5);
        assert_eq!(gt, GeoTransform::north_up(0.0, 1.0, 5.0, -1.0));
    }
}
