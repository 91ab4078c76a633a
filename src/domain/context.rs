//! Evaluation context: the read-only input series for one evaluate call.

use crate::domain::error::RuntimeError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::series::Series;
use std::collections::HashMap;

pub const OPEN: &str = "OPEN";
pub const HIGH: &str = "HIGH";
pub const LOW: &str = "LOW";
pub const CLOSE: &str = "CLOSE";
pub const VOLUME: &str = "VOLUME";
pub const AMOUNT: &str = "AMOUNT";

/// Maps the short spellings of the standard fields to their canonical names.
pub fn canonical_field(name: &str) -> &str {
    match name {
        "O" => OPEN,
        "H" => HIGH,
        "L" => LOW,
        "C" => CLOSE,
        "V" | "VOL" => VOLUME,
        "AMO" => AMOUNT,
        other => other,
    }
}

/// Named input series of one shared length. Field names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Context {
    len: usize,
    fields: HashMap<String, Series>,
}

impl Context {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            fields: HashMap::new(),
        }
    }

    /// Adds (or replaces) a field; its length must match the context length.
    pub fn with_field(mut self, name: &str, values: Series) -> Result<Self, RuntimeError> {
        let name = name.to_uppercase();
        if values.len() != self.len {
            return Err(RuntimeError::LengthMismatch {
                name,
                expected: self.len,
                found: values.len(),
            });
        }
        self.fields.insert(name, values);
        Ok(self)
    }

    /// Builds OPEN/HIGH/LOW/CLOSE/VOLUME, plus AMOUNT when every bar carries one.
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        let mut fields = HashMap::new();
        fields.insert(OPEN.to_string(), bars.iter().map(|b| b.open).collect());
        fields.insert(HIGH.to_string(), bars.iter().map(|b| b.high).collect());
        fields.insert(LOW.to_string(), bars.iter().map(|b| b.low).collect());
        fields.insert(CLOSE.to_string(), bars.iter().map(|b| b.close).collect());
        fields.insert(VOLUME.to_string(), bars.iter().map(|b| b.volume).collect());
        let amounts: Option<Series> = bars.iter().map(|b| b.amount).collect();
        if let Some(amounts) = amounts {
            fields.insert(AMOUNT.to_string(), amounts);
        }
        Self {
            len: bars.len(),
            fields,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Looks a field up by name or standard alias, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Series> {
        let upper = name.to_uppercase();
        self.fields.get(canonical_field(&upper))
    }

    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
