//! Price oracle port trait.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::ReportError;
use crate::domain::instrument::InstrumentType;

/// One day of quotes as delivered by the oracle: the date in `dd-MM-yyyy`
/// form and one amount string per currency code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPrice {
    pub day: String,
    pub quotes: BTreeMap<String, String>,
}

/// External price oracle. One call is expensive, so callers request whole
/// windows and cache the result.
pub trait PriceSource: Send + Sync {
    fn price_window(
        &self,
        instrument_type: InstrumentType,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyPrice>, ReportError>;
}
