//! Weighted Moving Average.
//!
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Warmup: first (n-1) bars are undefined.

use crate::domain::series::{Series, rolling};

pub fn wma(values: &[f64], period: usize) -> Series {
    let n = period as f64;
    let divisor = n * (n + 1.0) / 2.0;
    rolling(values, period, |window| {
        window
            .iter()
            .enumerate()
            .map(|(j, v)| (j + 1) as f64 * v)
            .sum::<f64>()
            / divisor
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wma_warmup() {
        let out = wma(&[10.0, 20.0, 30.0, 40.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!(!out[2].is_nan());
    }

    #[test]
    fn wma_known_values() {
        let out = wma(&[10.0, 20.0, 30.0, 40.0], 3);
        // (1*10 + 2*20 + 3*30) / 6
        assert!((out[2] - 140.0 / 6.0).abs() < 1e-12);
        // (1*20 + 2*30 + 3*40) / 6
        assert!((out[3] - 200.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn wma_period_1_is_identity() {
        assert_eq!(wma(&[5.0, 7.0], 1), vec![5.0, 7.0]);
    }

    #[test]
    fn wma_huge_period_is_undefined() {
        let out = wma(&[1.0, 2.0, 3.0], usize::MAX);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
