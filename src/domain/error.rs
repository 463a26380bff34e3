//! Domain error types.

use chrono::NaiveDate;

use super::instrument::InstrumentType;

/// Top-level error type for pnlreport.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid transaction at row {row}: {reason}")]
    InvalidTransaction { row: usize, reason: String },

    #[error("price unavailable for {instrument_type} {symbol} between {start} and {end}")]
    PriceUnavailable {
        instrument_type: InstrumentType,
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("invalid report parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("failed to write report: {reason}")]
    ReportWrite { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ReportError> for std::process::ExitCode {
    fn from(err: &ReportError) -> Self {
        let code: u8 = match err {
            ReportError::Io(_) => 1,
            ReportError::ConfigParse { .. } | ReportError::InvalidParameters { .. } => 2,
            ReportError::InvalidTransaction { .. } => 3,
            ReportError::PriceUnavailable { .. } => 4,
            ReportError::ReportWrite { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_identify_the_offending_input() {
        let err = ReportError::InvalidTransaction {
            row: 7,
            reason: "bad amount".into(),
        };
        assert_eq!(err.to_string(), "invalid transaction at row 7: bad amount");

        let err = ReportError::PriceUnavailable {
            instrument_type: InstrumentType::Bist,
            symbol: "XYZ".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "price unavailable for BIST XYZ between 2024-01-01 and 2024-05-01"
        );
    }
}
