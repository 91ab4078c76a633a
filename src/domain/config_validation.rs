//! Configuration validation.
//!
//! Validates all config fields before any data is loaded or formula evaluated.

use crate::domain::error::TdxError;
use crate::domain::parser;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MAX_PRECISION: i64 = 12;
pub const DEFAULT_PRECISION: i64 = 4;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TdxError> {
    validate_dates(config)?;
    validate_precision(config)?;
    validate_tail(config)?;
    validate_formulas(config)?;
    Ok(())
}

/// Reads an optional `[data]` date.
pub fn config_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, TdxError> {
    match config.get_string("data", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(&s, "data", key).map(Some),
    }
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, TdxError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| TdxError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("invalid {key} format, expected YYYY-MM-DD"),
    })
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TdxError> {
    let start_date = config_date(config, "start_date")?;
    let end_date = config_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(TdxError::ConfigInvalid {
                section: "data".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_precision(config: &dyn ConfigPort) -> Result<(), TdxError> {
    let value = config.get_int("output", "precision", DEFAULT_PRECISION);
    if !(0..=MAX_PRECISION).contains(&value) {
        return Err(TdxError::ConfigInvalid {
            section: "output".to_string(),
            key: "precision".to_string(),
            reason: format!("precision must be between 0 and {MAX_PRECISION}"),
        });
    }
    Ok(())
}

fn validate_tail(config: &dyn ConfigPort) -> Result<(), TdxError> {
    if config.get_int("output", "tail", 0) < 0 {
        return Err(TdxError::ConfigInvalid {
            section: "output".to_string(),
            key: "tail".to_string(),
            reason: "tail must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_formulas(config: &dyn ConfigPort) -> Result<(), TdxError> {
    for (name, text) in config.get_section("formulas") {
        if text.trim().is_empty() {
            return Err(TdxError::ConfigInvalid {
                section: "formulas".to_string(),
                key: name,
                reason: "formula is empty".to_string(),
            });
        }
        if let Err(e) = parser::parse(&text) {
            return Err(TdxError::ConfigInvalid {
                section: "formulas".to_string(),
                key: name,
                reason: e.display_with_context(&text),
            });
        }
    }
    Ok(())
}
