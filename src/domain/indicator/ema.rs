//! Exponential smoothing: EMA and the TDX-style SMA.
//!
//! S[i] = alpha * X[i] + (1 - alpha) * S[i-1], seeded with the first defined input.
//! EMA uses alpha = 2/(n+1); SMA(X, N, M) uses alpha = M/N.
//! Before the seed the output is undefined; undefined inputs after it repeat the last state.

use crate::domain::series::Series;

pub fn exp_smooth(values: &[f64], alpha: f64) -> Series {
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;

    for &x in values {
        state = match (state, x.is_nan()) {
            (None, true) => None,
            (None, false) => Some(x),
            (Some(prev), true) => Some(prev),
            (Some(prev), false) => Some(alpha * x + (1.0 - alpha) * prev),
        };
        out.push(state.unwrap_or(f64::NAN));
    }

    out
}

pub fn ema(values: &[f64], period: usize) -> Series {
    exp_smooth(values, 2.0 / (period as f64 + 1.0))
}

pub fn sma(values: &[f64], period: usize, weight: f64) -> Series {
    exp_smooth(values, weight / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeds_with_first_value() {
        let out = ema(&[10.0, 20.0, 30.0], 3);
        let k = 0.5;
        assert!((out[0] - 10.0).abs() < f64::EPSILON);
        let e1 = 20.0 * k + 10.0 * (1.0 - k);
        assert!((out[1] - e1).abs() < f64::EPSILON);
        let e2 = 30.0 * k + e1 * (1.0 - k);
        assert!((out[2] - e2).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_period_1_tracks_input() {
        let out = ema(&[10.0, 20.0, 30.0], 1);
        assert_eq!(out, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn ema_equal_prices() {
        for v in ema(&[100.0; 5], 3) {
            assert!((v - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn leading_nan_delays_seed() {
        let out = ema(&[f64::NAN, f64::NAN, 4.0, 8.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 4.0).abs() < f64::EPSILON);
        assert!((out[3] - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nan_after_seed_holds_state() {
        let out = ema(&[4.0, f64::NAN, 8.0], 3);
        assert!((out[1] - 4.0).abs() < f64::EPSILON);
        assert!((out[2] - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_uses_weight_over_period() {
        // alpha = 1/3
        let out = sma(&[3.0, 6.0], 3, 1.0);
        assert!((out[1] - (6.0 / 3.0 + 3.0 * 2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_input() {
        assert!(ema(&[], 5).is_empty());
    }
}
