//! MACD (Moving Average Convergence Divergence).
//!
//! DIF  = EMA(short) - EMA(long)
//! DEA  = EMA(mid) of DIF
//! HIST = DIF - DEA
//!
//! Default parameters: short=12, long=26, mid=9. The smoothers seed at the first defined
//! input, so every line is defined from the first defined price.

use crate::domain::indicator::ema::ema;
use crate::domain::series::{Series, zip_map};

pub const DEFAULT_SHORT: usize = 12;
pub const DEFAULT_LONG: usize = 26;
pub const DEFAULT_MID: usize = 9;

pub struct Macd {
    pub dif: Series,
    pub dea: Series,
    pub hist: Series,
}

pub fn macd(values: &[f64], short: usize, long: usize, mid: usize) -> Macd {
    let fast = ema(values, short);
    let slow = ema(values, long);
    let dif = zip_map(&fast, &slow, |f, s| f - s);
    let dea = ema(&dif, mid);
    let hist = zip_map(&dif, &dea, |d, e| d - e);
    Macd { dif, dea, hist }
}
