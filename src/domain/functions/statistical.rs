//! Windowed dispersion, regression and moment statistics.

use super::define;
use crate::domain::indicator::stddev::variance;
use crate::domain::indicator::{rolling_std, rolling_var};
use crate::domain::registry::{Family, FunctionRegistry, Param};
use crate::domain::series::{devsq, mean, rolling, rolling_pair};

/// Least-squares fit of the window against x = 0..n, as (slope, intercept).
fn linear_fit(window: &[f64]) -> Option<(f64, f64)> {
    let n = window.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in window.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    Some((slope, (sy - slope * sx) / n))
}

pub fn slope(window: &[f64]) -> f64 {
    linear_fit(window).map_or(f64::NAN, |(slope, _)| slope)
}

/// Regression estimate for the bar after the window.
pub fn forecast(window: &[f64]) -> f64 {
    linear_fit(window).map_or(f64::NAN, |(slope, intercept)| {
        slope * window.len() as f64 + intercept
    })
}

pub fn avedev(window: &[f64]) -> f64 {
    let m = mean(window);
    window.iter().map(|v| (v - m).abs()).sum::<f64>() / window.len() as f64
}

/// Sample covariance.
pub fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return f64::NAN;
    }
    let (ma, mb) = (mean(a), mean(b));
    a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1.0)
}

pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let denom = (variance(a, true) * variance(b, true)).sqrt();
    if denom == 0.0 || denom.is_nan() {
        return f64::NAN;
    }
    covariance(a, b) / denom
}

/// Adjusted Fisher-Pearson skewness (G1).
pub fn skewness(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let s = variance(window, true).sqrt();
    if n < 3.0 || s == 0.0 || s.is_nan() {
        return f64::NAN;
    }
    let m = mean(window);
    let m3: f64 = window.iter().map(|v| ((v - m) / s).powi(3)).sum();
    n / ((n - 1.0) * (n - 2.0)) * m3
}

/// Excess kurtosis (G2), zero for a normal distribution.
pub fn kurtosis(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let s = variance(window, true).sqrt();
    if n < 4.0 || s == 0.0 || s.is_nan() {
        return f64::NAN;
    }
    let m = mean(window);
    let m4: f64 = window.iter().map(|v| ((v - m) / s).powi(4)).sum();
    let scale = n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0));
    let correction = 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
    scale * m4 - correction
}

pub fn register(registry: &mut FunctionRegistry) {
    let family = Family::Statistical;
    let x_n = |min: f64| vec![Param::series("X"), Param::period("N").at_least(min)];
    let pair_n = || {
        vec![
            Param::series("A"),
            Param::series("B"),
            Param::period("N").at_least(2.0),
        ]
    };

    define(registry, "STD", family, x_n(1.0), "Sample standard deviation", |args| {
        Ok(rolling_std(&args.series(0)?, args.period(1)?, true))
    });
    define(registry, "VAR", family, x_n(1.0), "Sample variance", |args| {
        Ok(rolling_var(&args.series(0)?, args.period(1)?, true))
    });
    define(registry, "STDP", family, x_n(1.0), "Population standard deviation", |args| {
        Ok(rolling_std(&args.series(0)?, args.period(1)?, false))
    });
    define(registry, "VARP", family, x_n(1.0), "Population variance", |args| {
        Ok(rolling_var(&args.series(0)?, args.period(1)?, false))
    });
    define(registry, "AVEDEV", family, x_n(1.0), "Mean absolute deviation", |args| {
        Ok(rolling(&args.series(0)?, args.period(1)?, avedev))
    });
    define(registry, "DEVSQ", family, x_n(1.0), "Sum of squared deviations", |args| {
        Ok(rolling(&args.series(0)?, args.period(1)?, devsq))
    });
    define(registry, "SLOPE", family, x_n(2.0), "Linear regression slope", |args| {
        Ok(rolling(&args.series(0)?, args.period(1)?, slope))
    });
    define(
        registry,
        "FORCAST",
        family,
        x_n(2.0),
        "Linear regression estimate for the next bar",
        |args| Ok(rolling(&args.series(0)?, args.period(1)?, forecast)),
    );
    define(registry, "CORR", family, pair_n(), "Pearson correlation", |args| {
        Ok(rolling_pair(
            &args.series(0)?,
            &args.series(1)?,
            args.period(2)?,
            correlation,
        ))
    });
    define(registry, "COVAR", family, pair_n(), "Sample covariance", |args| {
        Ok(rolling_pair(
            &args.series(0)?,
            &args.series(1)?,
            args.period(2)?,
            covariance,
        ))
    });
    define(registry, "SKEW", family, x_n(3.0), "Sample skewness", |args| {
        Ok(rolling(&args.series(0)?, args.period(1)?, skewness))
    });
    define(registry, "KURT", family, x_n(4.0), "Sample excess kurtosis", |args| {
        Ok(rolling(&args.series(0)?, args.period(1)?, kurtosis))
    });
}
