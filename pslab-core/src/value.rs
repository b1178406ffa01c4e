//! Value algebra: the NA sentinel and NA-aware helpers over scalars.
//!
//! Every scalar is an `f64`. NA is NaN. Booleans are `{0.0, 1.0, NA}`, and any
//! arithmetic involving NA yields NA by IEEE-754 propagation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// The "no value" sentinel.
pub const NA: f64 = f64::NAN;

#[inline]
pub fn is_na(x: f64) -> bool {
    x.is_nan()
}

/// Replace NA with `replacement`.
#[inline]
pub fn nz(x: f64, replacement: f64) -> f64 {
    if x.is_nan() {
        replacement
    } else {
        x
    }
}

/// Boolean interpretation of a scalar: NA and zero are false.
#[inline]
pub fn truthy(x: f64) -> bool {
    !x.is_nan() && x != 0.0
}

#[inline]
pub fn from_bool(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Fill direction for [`fix_na`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixNanMode {
    /// Each NA takes the next later valid value; trailing NAs stay NA.
    #[default]
    Backward,
    /// Each NA takes the last earlier valid value; leading NAs stay NA.
    Forward,
}

/// Fill NA cells from neighbouring valid cells.
///
/// `Backward` scans from the end so a NA at `i` receives `s[j]` for the
/// smallest `j > i` holding a value. That reads values later than `i`, so a
/// series built this way is not causal; `Forward` is.
pub fn fix_na(values: &[f64], mode: FixNanMode) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut fill = NA;
    match mode {
        FixNanMode::Backward => {
            for v in out.iter_mut().rev() {
                if v.is_nan() {
                    *v = fill;
                } else {
                    fill = *v;
                }
            }
        }
        FixNanMode::Forward => {
            for v in out.iter_mut() {
                if v.is_nan() {
                    *v = fill;
                } else {
                    fill = *v;
                }
            }
        }
    }
    out
}

/// At each index, the value of `src` at the `occurrence`-th most recent index
/// where `cond` was truthy (0 = latest), or NA if there were not enough.
pub fn value_when(cond: &[f64], src: &[f64], occurrence: usize) -> Vec<f64> {
    // Only the last `occurrence + 1` hits are ever read; the front is the
    // `occurrence`-th most recent.
    let mut hits: VecDeque<usize> = VecDeque::new();
    let mut out = vec![NA; cond.len()];
    for (i, slot) in out.iter_mut().enumerate() {
        if truthy(cond[i]) {
            if hits.len() > occurrence {
                hits.pop_front();
            }
            hits.push_back(i);
        }
        if hits.len() > occurrence {
            if let Some(&j) = hits.front() {
                *slot = src.get(j).copied().unwrap_or(NA);
            }
        }
    }
    out
}
