//! Population standard deviation over a rolling window (divisor `period`).

use super::full_window;
use crate::value::NA;

pub fn stdev(src: &[f64], period: usize) -> Vec<f64> {
    (0..src.len())
        .map(|i| match full_window(src, i, period) {
            Some(w) => {
                let n = period as f64;
                let mean = w.iter().sum::<f64>() / n;
                let variance = w.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
                variance.sqrt()
            }
            None => NA,
        })
        .collect()
}
