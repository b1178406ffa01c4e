//! MACD: fast EMA − slow EMA, its EMA signal line and the histogram.

use super::ema;

/// Returns `(macd, signal, histogram)`.
pub fn macd(
    src: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(src, fast);
    let slow_ema = ema(src, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let hist = line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    (line, signal_line, hist)
}
