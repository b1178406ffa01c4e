//! Simple Moving Average.
//!
//! SMA[i] = mean(src[i-p+1..=i]). NA while `i < p-1` or when the window holds NA.

use super::full_window;
use crate::value::NA;

pub fn sma(src: &[f64], period: usize) -> Vec<f64> {
    (0..src.len())
        .map(|i| match full_window(src, i, period) {
            Some(w) => w.iter().sum::<f64>() / period as f64,
            None => NA,
        })
        .collect()
}
