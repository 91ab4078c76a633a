//! Market data access port trait.

use crate::domain::error::TdxError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` within the inclusive date range, sorted by date. An open bound is
    /// unrestricted.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, TdxError>;

    fn list_codes(&self) -> Result<Vec<String>, TdxError>;
}
