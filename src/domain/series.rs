//! Index-aligned numeric series and the elementwise / windowed helpers built on them.
//!
//! `f64::NAN` marks an undefined position. Every helper preserves length.

pub type Series = Vec<f64>;

/// Tolerance used for equality comparisons between series values.
pub const EPSILON: f64 = 1e-9;

/// C-style truthiness: nonzero and defined.
pub fn truthy(value: f64) -> bool {
    !value.is_nan() && value != 0.0
}

pub fn bool_value(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

pub fn broadcast(value: f64, len: usize) -> Series {
    vec![value; len]
}

/// Maps every value through truthiness to 1/0.
pub fn to_flags(values: &[f64]) -> Series {
    values.iter().map(|&v| bool_value(truthy(v))).collect()
}

/// Value at i becomes the value that was at i - k; the first k positions are undefined.
pub fn shift(values: &[f64], k: usize) -> Series {
    let len = values.len();
    let mut out = vec![f64::NAN; len];
    if k < len {
        out[k..].copy_from_slice(&values[..len - k]);
    }
    out
}

pub fn map(values: &[f64], f: impl Fn(f64) -> f64) -> Series {
    values.iter().map(|&v| f(v)).collect()
}

pub fn zip_map(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Series {
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

pub fn zip3_map(a: &[f64], b: &[f64], c: &[f64], f: impl Fn(f64, f64, f64) -> f64) -> Series {
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((&x, &y), &z)| f(x, y, z))
        .collect()
}

/// Division where a zero or non-finite quotient is undefined.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return f64::NAN;
    }
    finite_or_nan(a / b)
}

pub fn finite_or_nan(value: f64) -> f64 {
    if value.is_finite() { value } else { f64::NAN }
}

/// Applies `f` to each full window `[i-n+1, i]`.
///
/// Positions with `i < n - 1` and windows containing an undefined value yield NaN.
pub fn rolling(values: &[f64], n: usize, f: impl Fn(&[f64]) -> f64) -> Series {
    let mut out = vec![f64::NAN; values.len()];
    if n == 0 {
        return out;
    }
    for i in (n - 1)..values.len() {
        let window = &values[i + 1 - n..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(window);
    }
    out
}

/// Two-series variant of [`rolling`] over aligned windows.
pub fn rolling_pair(a: &[f64], b: &[f64], n: usize, f: impl Fn(&[f64], &[f64]) -> f64) -> Series {
    let len = a.len().min(b.len());
    let mut out = vec![f64::NAN; len];
    if n == 0 {
        return out;
    }
    for i in (n - 1)..len {
        let wa = &a[i + 1 - n..=i];
        let wb = &b[i + 1 - n..=i];
        if wa.iter().chain(wb).any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(wa, wb);
    }
    out
}

pub fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

/// Sum of squared deviations from the window mean.
pub fn devsq(window: &[f64]) -> f64 {
    let m = mean(window);
    window.iter().map(|v| (v - m) * (v - m)).sum()
}
