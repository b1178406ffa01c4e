//! Rolling highest / lowest, with the SMA warm-up and NA rule.

use super::full_window;
use crate::value::NA;

pub fn highest(src: &[f64], period: usize) -> Vec<f64> {
    rolling(src, period, f64::max, f64::NEG_INFINITY)
}

pub fn lowest(src: &[f64], period: usize) -> Vec<f64> {
    rolling(src, period, f64::min, f64::INFINITY)
}

fn rolling(src: &[f64], period: usize, pick: fn(f64, f64) -> f64, init: f64) -> Vec<f64> {
    (0..src.len())
        .map(|i| match full_window(src, i, period) {
            Some(w) => w.iter().copied().fold(init, pick),
            None => NA,
        })
        .collect()
}
