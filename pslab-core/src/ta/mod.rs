//! Technical-analysis library.
//!
//! Every function is pure and batch: it takes aligned series of length N and
//! returns series of length N, NA over its warm-up and wherever a window holds
//! NA. The bar loop never calls these per bar; calls are hoisted and computed
//! once over the whole bar array, then fed into forward series one cell at a
//! time.
//!
//! [`TaFunction`] describes one hoisted call: its name, its inputs and outputs,
//! its warm-up and how to compute it.

pub mod atr;
pub mod bollinger;
pub mod change;
pub mod cross;
pub mod ema;
pub mod extremes;
pub mod macd;
pub mod pivot;
pub mod rsi;
pub mod sma;
pub mod stdev;

pub use atr::{atr, tr};
pub use bollinger::bb;
pub use change::change;
pub use cross::{crossover, crossunder};
pub use ema::{ema, rma};
pub use extremes::{highest, lowest};
pub use macd::macd;
pub use pivot::{delay, pivot_high, pivot_low};
pub use rsi::rsi;
pub use sma::sma;
pub use stdev::stdev;

use serde::Serialize;

use crate::value::{fix_na, value_when, FixNanMode};

/// The full window `src[i+1-period..=i]`, or `None` if it is not complete or
/// contains NA.
pub(crate) fn full_window(src: &[f64], i: usize, period: usize) -> Option<&[f64]> {
    if period == 0 || i + 1 < period {
        return None;
    }
    let window = &src[i + 1 - period..=i];
    if window.iter().any(|v| v.is_nan()) {
        None
    } else {
        Some(window)
    }
}

/// A batch series function with its constant parameters bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum TaFunction {
    Sma { period: usize },
    Ema { period: usize },
    Rma { period: usize },
    Stdev { period: usize },
    Change { length: usize },
    Highest { period: usize },
    Lowest { period: usize },
    Rsi { period: usize },
    Bb { period: usize, mult: f64 },
    Macd { fast: usize, slow: usize, signal: usize },
    PivotHigh { left: usize, right: usize },
    PivotLow { left: usize, right: usize },
    Crossover,
    Crossunder,
    Tr,
    Atr { period: usize },
    FixNan { mode: FixNanMode },
    ValueWhen { occurrence: usize },
}

impl TaFunction {
    /// Script-visible name.
    pub fn name(&self) -> &'static str {
        match self {
            TaFunction::Sma { .. } => "ta.sma",
            TaFunction::Ema { .. } => "ta.ema",
            TaFunction::Rma { .. } => "ta.rma",
            TaFunction::Stdev { .. } => "ta.stdev",
            TaFunction::Change { .. } => "ta.change",
            TaFunction::Highest { .. } => "ta.highest",
            TaFunction::Lowest { .. } => "ta.lowest",
            TaFunction::Rsi { .. } => "ta.rsi",
            TaFunction::Bb { .. } => "ta.bb",
            TaFunction::Macd { .. } => "ta.macd",
            TaFunction::PivotHigh { .. } => "ta.pivothigh",
            TaFunction::PivotLow { .. } => "ta.pivotlow",
            TaFunction::Crossover => "ta.crossover",
            TaFunction::Crossunder => "ta.crossunder",
            TaFunction::Tr => "ta.tr",
            TaFunction::Atr { .. } => "ta.atr",
            TaFunction::FixNan { .. } => "fixnan",
            TaFunction::ValueWhen { .. } => "valuewhen",
        }
    }

    /// Number of input series.
    pub fn arity(&self) -> usize {
        match self {
            TaFunction::Crossover | TaFunction::Crossunder | TaFunction::ValueWhen { .. } => 2,
            TaFunction::Tr | TaFunction::Atr { .. } => 3,
            _ => 1,
        }
    }

    /// Number of output series.
    pub fn outputs(&self) -> usize {
        match self {
            TaFunction::Bb { .. } | TaFunction::Macd { .. } => 3,
            _ => 1,
        }
    }

    /// Bars the bar loop must wait before the batch value at an index is
    /// confirmed. Non-zero only for center-aligned outputs.
    pub fn emit_delay(&self) -> usize {
        match self {
            TaFunction::PivotHigh { right, .. } | TaFunction::PivotLow { right, .. } => *right,
            _ => 0,
        }
    }

    /// Leading bars of NA produced over fully valid input, as observed by the
    /// bar loop (emission delay included).
    pub fn lookback(&self) -> usize {
        match self {
            TaFunction::Sma { period }
            | TaFunction::Ema { period }
            | TaFunction::Rma { period }
            | TaFunction::Stdev { period }
            | TaFunction::Highest { period }
            | TaFunction::Lowest { period }
            | TaFunction::Bb { period, .. }
            | TaFunction::Atr { period } => period.saturating_sub(1),
            TaFunction::Rsi { period } => *period,
            TaFunction::Change { length } => *length,
            TaFunction::Macd { fast, slow, signal } => {
                fast.max(slow).saturating_sub(1).saturating_add(signal.saturating_sub(1))
            }
            TaFunction::PivotHigh { left, right } | TaFunction::PivotLow { left, right } => {
                left.saturating_add(*right)
            }
            TaFunction::Crossover | TaFunction::Crossunder => 1,
            TaFunction::Tr | TaFunction::FixNan { .. } | TaFunction::ValueWhen { .. } => 0,
        }
    }

    /// Constant parameters in call order, formatted for labels.
    pub fn params(&self) -> Vec<String> {
        match self {
            TaFunction::Sma { period }
            | TaFunction::Ema { period }
            | TaFunction::Rma { period }
            | TaFunction::Stdev { period }
            | TaFunction::Highest { period }
            | TaFunction::Lowest { period }
            | TaFunction::Rsi { period }
            | TaFunction::Atr { period } => vec![period.to_string()],
            TaFunction::Change { length } => vec![length.to_string()],
            TaFunction::Bb { period, mult } => vec![period.to_string(), mult.to_string()],
            TaFunction::Macd { fast, slow, signal } => {
                vec![fast.to_string(), slow.to_string(), signal.to_string()]
            }
            TaFunction::PivotHigh { left, right } | TaFunction::PivotLow { left, right } => {
                vec![left.to_string(), right.to_string()]
            }
            TaFunction::ValueWhen { occurrence } => vec![occurrence.to_string()],
            TaFunction::Crossover
            | TaFunction::Crossunder
            | TaFunction::Tr
            | TaFunction::FixNan { .. } => Vec::new(),
        }
    }

    /// Suffixes naming each output of a tuple-valued function.
    pub fn output_names(&self) -> &'static [&'static str] {
        match self {
            TaFunction::Bb { .. } => &["middle", "upper", "lower"],
            TaFunction::Macd { .. } => &["macd", "signal", "hist"],
            _ => &[""],
        }
    }

    /// Call-like label such as `ta.sma(close, 20)`. The bar inputs of `tr` and
    /// `atr` are implied and left out.
    pub fn label(&self, inputs: &[&str]) -> String {
        let mut args: Vec<String> = match self {
            TaFunction::Tr | TaFunction::Atr { .. } => Vec::new(),
            _ => inputs.iter().map(|s| s.to_string()).collect(),
        };
        args.extend(self.params());
        format!("{}({})", self.name(), args.join(", "))
    }

    /// Run the function over `inputs` (exactly [`arity`](Self::arity) aligned
    /// series). Returns [`outputs`](Self::outputs) series of the input length.
    pub fn compute(&self, inputs: &[&[f64]]) -> Vec<Vec<f64>> {
        debug_assert_eq!(inputs.len(), self.arity(), "{}: wrong input count", self.name());
        let src = inputs[0];
        match self {
            TaFunction::Sma { period } => vec![sma(src, *period)],
            TaFunction::Ema { period } => vec![ema(src, *period)],
            TaFunction::Rma { period } => vec![rma(src, *period)],
            TaFunction::Stdev { period } => vec![stdev(src, *period)],
            TaFunction::Change { length } => vec![change(src, *length)],
            TaFunction::Highest { period } => vec![highest(src, *period)],
            TaFunction::Lowest { period } => vec![lowest(src, *period)],
            TaFunction::Rsi { period } => vec![rsi(src, *period)],
            TaFunction::Bb { period, mult } => {
                let (middle, upper, lower) = bb(src, *period, *mult);
                vec![middle, upper, lower]
            }
            TaFunction::Macd { fast, slow, signal } => {
                let (line, signal_line, hist) = macd(src, *fast, *slow, *signal);
                vec![line, signal_line, hist]
            }
            TaFunction::PivotHigh { left, right } => vec![pivot_high(src, *left, *right)],
            TaFunction::PivotLow { left, right } => vec![pivot_low(src, *left, *right)],
            TaFunction::Crossover => vec![crossover(src, inputs[1])],
            TaFunction::Crossunder => vec![crossunder(src, inputs[1])],
            TaFunction::Tr => vec![tr(src, inputs[1], inputs[2])],
            TaFunction::Atr { period } => vec![atr(src, inputs[1], inputs[2], *period)],
            TaFunction::FixNan { mode } => vec![fix_na(src, *mode)],
            TaFunction::ValueWhen { occurrence } => vec![value_when(src, inputs[1], *occurrence)],
        }
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Element-wise [`assert_approx`] where NA must match NA.
#[cfg(test)]
pub fn assert_series(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch: {actual:?} vs {expected:?}");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        if e.is_nan() {
            assert!(a.is_nan(), "index {i}: expected NA, got {a} in {actual:?}");
        } else {
            assert!(!a.is_nan(), "index {i}: expected {e}, got NA in {actual:?}");
            assert_approx(a, e, epsilon);
        }
    }
}

/// Default epsilon for TA tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NA;

    #[test]
    fn compute_matches_direct_calls() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = TaFunction::Sma { period: 3 }.compute(&[&src]);
        assert_eq!(out.len(), 1);
        assert_series(&out[0], &[NA, NA, 2.0, 3.0, 4.0], DEFAULT_EPSILON);
    }

    #[test]
    fn tuple_functions_have_three_outputs() {
        let src: Vec<f64> = (0..40).map(|i| (i as f64).sin() + 10.0).collect();
        let f = TaFunction::Bb { period: 5, mult: 2.0 };
        assert_eq!(f.outputs(), 3);
        let out = f.compute(&[&src]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s.len() == 40));

        let f = TaFunction::Macd { fast: 3, slow: 6, signal: 4 };
        assert_eq!(f.compute(&[&src]).len(), 3);
    }

    #[test]
    fn lookback_values() {
        assert_eq!(TaFunction::Sma { period: 20 }.lookback(), 19);
        assert_eq!(TaFunction::Rsi { period: 14 }.lookback(), 14);
        assert_eq!(TaFunction::Macd { fast: 12, slow: 26, signal: 9 }.lookback(), 33);
        assert_eq!(TaFunction::PivotHigh { left: 2, right: 3 }.lookback(), 5);
        assert_eq!(TaFunction::Crossover.lookback(), 1);
    }

    #[test]
    fn lookback_saturates_on_huge_windows() {
        let f = TaFunction::PivotHigh { left: usize::MAX, right: 1 };
        assert_eq!(f.lookback(), usize::MAX);
        let f = TaFunction::Macd { fast: 1, slow: usize::MAX, signal: 3 };
        assert_eq!(f.lookback(), usize::MAX);
    }

    #[test]
    fn only_pivots_are_delayed() {
        assert_eq!(TaFunction::PivotLow { left: 4, right: 2 }.emit_delay(), 2);
        assert_eq!(TaFunction::Sma { period: 4 }.emit_delay(), 0);
    }

    #[test]
    fn multi_input_functions() {
        let high = [10.0, 12.0, 11.0];
        let low = [8.0, 11.0, 7.0];
        let close = [9.0, 11.5, 8.0];
        let out = TaFunction::Tr.compute(&[&high, &low, &close]);
        assert_series(&out[0], &[2.0, 3.0, 4.5], DEFAULT_EPSILON);

        let cond = [0.0, 1.0, 0.0];
        let src = [5.0, 6.0, 7.0];
        let out = TaFunction::ValueWhen { occurrence: 0 }.compute(&[&cond, &src]);
        assert_series(&out[0], &[NA, 6.0, 6.0], DEFAULT_EPSILON);
    }
}
