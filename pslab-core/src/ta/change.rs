//! Difference from `length` bars ago.

use crate::value::NA;

pub fn change(src: &[f64], length: usize) -> Vec<f64> {
    (0..src.len())
        .map(|i| if i >= length { src[i] - src[i - length] } else { NA })
        .collect()
}
