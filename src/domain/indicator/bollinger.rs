//! Bollinger Bands.
//!
//! - Middle: simple moving average over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation (divides by n-1).
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::stddev::rolling_std;
use crate::domain::series::{Series, mean, rolling, zip_map};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

pub struct Bollinger {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> Bollinger {
    let middle = rolling(values, period, mean);
    let std = rolling_std(values, period, true);
    let upper = zip_map(&middle, &std, |m, s| m + multiplier * s);
    let lower = zip_map(&middle, &std, |m, s| m - multiplier * s);
    Bollinger {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bands_around_mean() {
        let out = bollinger(&[1.0, 2.0, 3.0], 3, 2.0);
        assert!(out.middle[1].is_nan());
        assert_relative_eq!(out.middle[2], 2.0);
        assert_relative_eq!(out.upper[2], 4.0);
        assert_relative_eq!(out.lower[2], 0.0);
    }

    #[test]
    fn constant_prices_collapse() {
        let out = bollinger(&[50.0; 5], 3, DEFAULT_MULTIPLIER);
        assert_relative_eq!(out.upper[4], 50.0);
        assert_relative_eq!(out.lower[4], 50.0);
    }
}
