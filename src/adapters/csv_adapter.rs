//! CSV file data adapter.
//!
//! One file per code, `<dir>/<CODE>.csv`, with header `date,open,high,low,close,volume`
//! and an optional trailing `amount` column.

use crate::domain::error::TdxError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{code}.csv"))
    }
}

fn parse_field(record: &StringRecord, index: usize, name: &str) -> Result<f64, TdxError> {
    record
        .get(index)
        .ok_or_else(|| TdxError::Data {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| TdxError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

fn parse_bar(record: &StringRecord) -> Result<OhlcvBar, TdxError> {
    let date_str = record.get(0).ok_or_else(|| TdxError::Data {
        reason: "missing date column".into(),
    })?;
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
        TdxError::Data {
            reason: format!("invalid date format: {e}"),
        }
    })?;

    let amount = match record.get(6).map(str::trim) {
        None | Some("") => None,
        Some(_) => Some(parse_field(record, 6, "amount")?),
    };

    Ok(OhlcvBar {
        date,
        open: parse_field(record, 1, "open")?,
        high: parse_field(record, 2, "high")?,
        low: parse_field(record, 3, "low")?,
        close: parse_field(record, 4, "close")?,
        volume: parse_field(record, 5, "volume")?,
        amount,
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, TdxError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| TdxError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TdxError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let bar = parse_bar(&record)?;

            if start_date.is_some_and(|start| bar.date < start)
                || end_date.is_some_and(|end| bar.date > end)
            {
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_codes(&self) -> Result<Vec<String>, TdxError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TdxError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TdxError::Data {
                reason: format!("directory entry error: {e}"),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(code) = name_str.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}
