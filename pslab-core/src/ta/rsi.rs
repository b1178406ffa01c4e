//! Relative Strength Index.
//!
//! Wilder smoothing (RMA) of gains and losses of `change(src)`.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → 100, unless avg_gain == 0 too → 50.

use super::{change, rma};
use crate::value::NA;

pub fn rsi(src: &[f64], period: usize) -> Vec<f64> {
    let diff = change(src, 1);
    let gains: Vec<f64> = diff.iter().map(|&d| if d.is_nan() { NA } else { d.max(0.0) }).collect();
    let losses: Vec<f64> = diff.iter().map(|&d| if d.is_nan() { NA } else { (-d).max(0.0) }).collect();
    let avg_gain = rma(&gains, period);
    let avg_loss = rma(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() {
                NA
            } else if l == 0.0 {
                if g == 0.0 {
                    50.0
                } else {
                    100.0
                }
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}
