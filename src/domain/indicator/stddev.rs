//! Rolling variance and standard deviation.
//!
//! `sample` selects the n-1 denominator; otherwise population (n). A sample statistic over
//! a single-value window is undefined.

use crate::domain::series::{Series, devsq, rolling};

pub fn variance(window: &[f64], sample: bool) -> f64 {
    let n = window.len() as f64;
    let denom = if sample { n - 1.0 } else { n };
    if denom <= 0.0 {
        return f64::NAN;
    }
    devsq(window) / denom
}

pub fn rolling_var(values: &[f64], period: usize, sample: bool) -> Series {
    rolling(values, period, |w| variance(w, sample))
}

pub fn rolling_std(values: &[f64], period: usize, sample: bool) -> Series {
    rolling(values, period, |w| variance(w, sample).sqrt())
}
