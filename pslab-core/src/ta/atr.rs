//! True range and Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high-low, |high-close[i-1]|, |low-close[i-1]|)
//! ATR = RMA(TR, period).

use super::rma;
use crate::value::NA;

pub fn tr(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..high.len())
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                return range;
            }
            let prev = close[i - 1];
            let parts = [range, (high[i] - prev).abs(), (low[i] - prev).abs()];
            // f64::max drops NaN operands, so check explicitly.
            if parts.iter().any(|v| v.is_nan()) {
                NA
            } else {
                parts.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        })
        .collect()
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    rma(&tr(high, low, close), period)
}
