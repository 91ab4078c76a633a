//! KDJ stochastic oscillator.
//!
//! RSV = (C - LLV(L, n)) / (HHV(H, n) - LLV(L, n)) * 100
//! K = EMA(RSV, m1), D = EMA(K, m2), J = 3K - 2D
//!
//! A flat window (HHV == LLV) has no RSV; K and D hold their previous state there.

use crate::domain::indicator::ema::ema;
use crate::domain::series::{Series, rolling, safe_div, zip_map, zip3_map};

pub struct Kdj {
    pub k: Series,
    pub d: Series,
    pub j: Series,
}

fn window_max(w: &[f64]) -> f64 {
    w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn window_min(w: &[f64]) -> f64 {
    w.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn kdj(high: &[f64], low: &[f64], close: &[f64], n: usize, m1: usize, m2: usize) -> Kdj {
    let highest = rolling(high, n, window_max);
    let lowest = rolling(low, n, window_min);
    let rsv = zip3_map(close, &highest, &lowest, |c, h, l| safe_div(c - l, h - l) * 100.0);
    let k = ema(&rsv, m1);
    let d = ema(&k, m2);
    let j = zip_map(&k, &d, |k, d| 3.0 * k - 2.0 * d);
    Kdj { k, d, j }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_at_high_gives_full_rsv() {
        let high = [10.0, 11.0, 12.0];
        let low = [8.0, 9.0, 10.0];
        let close = [10.0, 11.0, 12.0];
        let out = kdj(&high, &low, &close, 2, 1, 1);
        assert!(out.k[0].is_nan());
        // RSV at 1: (11 - 8) / (11 - 8) = 100
        assert!((out.k[1] - 100.0).abs() < 1e-12);
        assert!((out.d[1] - 100.0).abs() < 1e-12);
        assert!((out.j[1] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn j_line_relation() {
        let high = [10.0, 12.0, 11.0, 13.0, 14.0];
        let low = [9.0, 10.0, 9.5, 11.0, 12.0];
        let close = [9.5, 11.0, 10.0, 12.5, 13.0];
        let out = kdj(&high, &low, &close, 3, 3, 3);
        for i in 2..5 {
            assert!((out.j[i] - (3.0 * out.k[i] - 2.0 * out.d[i])).abs() < 1e-9);
        }
    }
}
