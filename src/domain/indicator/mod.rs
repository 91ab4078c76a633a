//! Indicator kernels over plain `f64` slices.
//!
//! Each kernel returns series of the input length with `NaN` wherever history is
//! insufficient. The formula functions in [`crate::domain::functions`] bind arguments and
//! call into these.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod rsi;
pub mod stddev;
pub mod wma;

pub use atr::{atr, true_range};
pub use bollinger::bollinger;
pub use ema::{ema, exp_smooth, sma};
pub use kdj::kdj;
pub use macd::macd;
pub use rsi::rsi;
pub use stddev::{rolling_std, rolling_var};
pub use wma::wma;
