//! Regular spacing test for coordinate arrays.

/// Spacing tolerance in thousandths of a coordinate unit.
const TOLERANCE: i64 = 1;

/// Looser tolerance for geographic latitude axes, which are often Gaussian.
const GAUSSIAN_LATITUDE_TOLERANCE: i64 = 100;

fn spacing(values: &[f64], i: usize) -> i64 {
    ((values[i + 1] - values[i]) * 1000.0).round() as i64
}

/// Whether `values` are evenly spaced.
///
/// Compares the first, middle and last spacings, integerized to three
/// decimal digits. Arrays shorter than three elements are regular.
pub fn is_regular(values: &[f64], latitude_axis: bool, projected: bool) -> bool {
    let n = values.len();
    if n < 3 {
        return true;
    }
    let tolerance = if latitude_axis && !projected {
        GAUSSIAN_LATITUDE_TOLERANCE
    } else {
        TOLERANCE
    };

    let mid = (n / 2).min(n - 2);
    let first = spacing(values, 0);
    let middle = spacing(values, mid);
    let last = spacing(values, n - 2);

    (first - middle).abs() <= tolerance
        && (middle - last).abs() <= tolerance
        && (first - last).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_axis() {
        assert!(is_regular(&[0.0, 1.0, 2.0, 3.0, 4.0], false, true));
    }

    #[test]
    fn test_irregular_axis() {
        assert!(!is_regular(&[0.0, 1.0, 2.0, 3.0, 100.0], false, true));
    }

    #[test]
    fn test_gaussian_latitude_tolerance() {
        let values = [0.0, 1.05, 2.0, 2.95, 4.0];
        assert!(is_regular(&values, true, false));
        assert!(!is_regular(&values, true, true));
        assert!(!is_regular(&values, false, false));
    }

    #[test]
    fn test_short_axes_are_regular() {
        assert!(is_regular(&[], false, false));
        assert!(is_regular(&[5.0, 7.0], false, false));
    }

    #[test]
    fn test_descending_axis() {
        assert!(is_regular(&[90.0, 89.5, 89.0, 88.5], true, false));
    }
}
