//! Bollinger Bands: SMA middle band ± mult · population stdev.

use super::{sma, stdev};

/// Returns `(middle, upper, lower)`.
pub fn bb(src: &[f64], period: usize, mult: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma(src, period);
    let dev = stdev(src, period);
    let upper = middle.iter().zip(&dev).map(|(m, d)| m + mult * d).collect();
    let lower = middle.iter().zip(&dev).map(|(m, d)| m - mult * d).collect();
    (middle, upper, lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ta::{assert_series, DEFAULT_EPSILON};
    use crate::value::NA;

    #[test]
    fn bands_around_mean() {
        // Window [1, 3]: mean 2, stdev 1.
        let (m, u, l) = bb(&[1.0, 3.0], 2, 2.0);
        assert_series(&m, &[NA, 2.0], DEFAULT_EPSILON);
        assert_series(&u, &[NA, 4.0], DEFAULT_EPSILON);
        assert_series(&l, &[NA, 0.0], DEFAULT_EPSILON);
    }
}
