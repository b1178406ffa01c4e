//! Crossover / crossunder events between two aligned series.

use crate::value::from_bool;

/// 1.0 where `a` moves from at-or-below `b` to above it, else 0.0.
pub fn crossover(a: &[f64], b: &[f64]) -> Vec<f64> {
    cross(a, b, |x, y| x > y, |x, y| x <= y)
}

/// 1.0 where `a` moves from at-or-above `b` to below it, else 0.0.
pub fn crossunder(a: &[f64], b: &[f64]) -> Vec<f64> {
    cross(a, b, |x, y| x < y, |x, y| x >= y)
}

fn cross(
    a: &[f64],
    b: &[f64],
    now: impl Fn(f64, f64) -> bool,
    before: impl Fn(f64, f64) -> bool,
) -> Vec<f64> {
    let n = a.len().min(b.len());
    (0..a.len())
        .map(|i| {
            from_bool(i >= 1 && i < n && now(a[i], b[i]) && before(a[i - 1], b[i - 1]))
        })
        .collect()
}
