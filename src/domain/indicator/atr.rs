//! Average True Range.
//!
//! TR[0] = H[0] - L[0]
//! TR[i] = max(H[i] - L[i], |H[i] - C[i-1]|, |L[i] - C[i-1]|)
//! ATR = EMA(TR, n)

use crate::domain::indicator::ema::ema;
use crate::domain::series::Series;

pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Series {
    let len = high.len().min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                return range;
            }
            let prev = close[i - 1];
            range
                .max((high[i] - prev).abs())
                .max((low[i] - prev).abs())
        })
        .collect()
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    ema(&true_range(high, low, close), period)
}
