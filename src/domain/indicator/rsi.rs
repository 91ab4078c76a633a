//! RSI (Relative Strength Index).
//!
//! Average gain and loss are simple means of the last n price changes.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (n changes are needed).

use crate::domain::series::{Series, mean, rolling};

pub fn rsi(values: &[f64], period: usize) -> Series {
    let mut changes = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        changes[i] = values[i] - values[i - 1];
    }

    let gains = rolling(&changes, period, |w| {
        mean(&w.iter().map(|c| c.max(0.0)).collect::<Vec<_>>())
    });
    let losses = rolling(&changes, period, |w| {
        mean(&w.iter().map(|c| (-c).max(0.0)).collect::<Vec<_>>())
    });

    gains
        .iter()
        .zip(&losses)
        .map(|(&gain, &loss)| {
            if gain.is_nan() || loss.is_nan() {
                f64::NAN
            } else if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect()
}
