//! Exponential and Wilder moving averages.
//!
//! Recursive: out[i] = alpha * src[i] + (1 - alpha) * out[i-1]
//! Seed: SMA of the first `period` consecutive valid values.
//! A NA input resets the recursion; the next full window of valid values
//! seeds it again.

use crate::value::NA;

/// EMA with alpha = 2 / (period + 1).
pub fn ema(src: &[f64], period: usize) -> Vec<f64> {
    smoothed(src, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder's RMA with alpha = 1 / period.
pub fn rma(src: &[f64], period: usize) -> Vec<f64> {
    smoothed(src, period, 1.0 / period as f64)
}

fn smoothed(src: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let mut out = vec![NA; src.len()];
    if period == 0 {
        return out;
    }

    let mut prev: Option<f64> = None;
    let mut run = 0usize;
    let mut sum = 0.0;
    for (i, &x) in src.iter().enumerate() {
        if x.is_nan() {
            prev = None;
            run = 0;
            sum = 0.0;
            continue;
        }
        let value = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => {
                run += 1;
                sum += x;
                if run < period {
                    continue;
                }
                sum / period as f64
            }
        };
        out[i] = value;
        prev = Some(value);
    }
    out
}
