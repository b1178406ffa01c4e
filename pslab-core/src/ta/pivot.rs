//! Pivot high / pivot low.
//!
//! A pivot at index `c` is a value strictly above (or below) each of the
//! `left` samples before it and the `right` samples after it. Output is
//! center-aligned: the pivot value is placed at `c` itself. Confirmation needs
//! `right` later bars, so the bar loop reads this array delayed by `right`
//! (see [`delay`]), which places the value at `c + right`.

use crate::value::NA;

pub fn pivot_high(src: &[f64], left: usize, right: usize) -> Vec<f64> {
    pivot(src, left, right, |neighbour, center| neighbour < center)
}

pub fn pivot_low(src: &[f64], left: usize, right: usize) -> Vec<f64> {
    pivot(src, left, right, |neighbour, center| neighbour > center)
}

fn pivot(
    src: &[f64],
    left: usize,
    right: usize,
    beaten_by_center: impl Fn(f64, f64) -> bool,
) -> Vec<f64> {
    let n = src.len();
    let mut out = vec![NA; n];
    if n <= left.saturating_add(right) {
        return out;
    }
    for c in left..n - right {
        let center = src[c];
        if center.is_nan() {
            continue;
        }
        // NaN neighbours fail the comparison and reject the pivot.
        let is_pivot = src[c - left..c]
            .iter()
            .chain(&src[c + 1..=c + right])
            .all(|&v| beaten_by_center(v, center));
        if is_pivot {
            out[c] = center;
        }
    }
    out
}

/// Shift a series `by` bars later, filling the head with NA.
pub fn delay(src: &[f64], by: usize) -> Vec<f64> {
    (0..src.len())
        .map(|i| if i >= by { src[i - by] } else { NA })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ta::{assert_series, DEFAULT_EPSILON};

    #[test]
    fn pivot_high_center_aligned() {
        let src = [1.0, 2.0, 5.0, 3.0, 2.0, 1.0, 2.0, 4.0, 3.0, 2.0];
        let out = pivot_high(&src, 2, 2);
        assert_series(
            &out,
            &[NA, NA, 5.0, NA, NA, NA, NA, 4.0, NA, NA],
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn pivot_low_center_aligned() {
        let src = [5.0, 4.0, 1.0, 3.0, 4.0, 3.0, 2.0, 3.0];
        let out = pivot_low(&src, 2, 2);
        assert_series(&out, &[NA, NA, 1.0, NA, NA, NA, NA, NA], DEFAULT_EPSILON);
    }

    #[test]
    fn pivot_requires_strict_extremum() {
        let src = [1.0, 5.0, 5.0, 1.0, 0.0];
        let out = pivot_high(&src, 1, 1);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn pivot_rejects_na_neighbours() {
        let src = [1.0, NA, 5.0, 2.0, 1.0];
        let out = pivot_high(&src, 2, 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn pivot_short_input() {
        assert_eq!(pivot_high(&[1.0, 2.0], 1, 1).len(), 2);
        assert!(pivot_high(&[1.0, 2.0], 1, 1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn huge_window_yields_all_na() {
        let src = [1.0, 2.0, 5.0, 3.0, 2.0];
        let out = pivot_high(&src, usize::MAX, 1);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|v| v.is_nan()));
        assert!(pivot_low(&src, 1, usize::MAX).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn delay_emits_after_confirmation() {
        let src = [1.0, 2.0, 5.0, 3.0, 2.0, 1.0];
        let delayed = delay(&pivot_high(&src, 2, 2), 2);
        assert_series(&delayed, &[NA, NA, NA, NA, 5.0, NA], DEFAULT_EPSILON);
    }
}
