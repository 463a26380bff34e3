//! CSV/TSV transaction ledger adapter.

use std::fs::File;
use std::path::PathBuf;

use crate::domain::error::ReportError;
use crate::domain::transaction::TransactionDefinition;
use crate::ports::transaction_source::TransactionSource;

const COLUMN_COUNT: usize = 8;

pub struct CsvAdapter {
    path: PathBuf,
    delimiter: u8,
}

impl CsvAdapter {
    /// Tab-separated ledger, the original input format.
    pub fn tsv(path: PathBuf) -> Self {
        Self {
            path,
            delimiter: b'\t',
        }
    }

    pub fn csv(path: PathBuf) -> Self {
        Self {
            path,
            delimiter: b',',
        }
    }
}

impl TransactionSource for CsvAdapter {
    fn read(&self) -> Result<Vec<TransactionDefinition>, ReportError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut definitions = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ReportError::InvalidTransaction {
                row,
                reason: format!("unreadable record: {e}"),
            })?;
            if record.len() != COLUMN_COUNT {
                return Err(ReportError::InvalidTransaction {
                    row,
                    reason: format!("expected {COLUMN_COUNT} columns, found {}", record.len()),
                });
            }
            definitions.push(TransactionDefinition {
                row,
                date: record[0].to_string(),
                instrument_type: record[1].to_string(),
                transaction_type: record[2].to_string(),
                symbol: record[3].to_string(),
                amount: record[4].to_string(),
                purchase_price: record[5].to_string(),
                commission: record[6].to_string(),
                currency: record[7].to_string(),
            });
        }
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_ledger(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn reads_tab_separated_rows_in_order() {
        let file = write_ledger(
            "05-03-2023 14:30:00\tbist\tBUY\tXYZ\t1,000\t12.5\t0\ttry\n\
             06-03-2023 10:00:00\tfund\tSELL\tF1\t5\t210\t1.2\tusd\n",
        );
        let adapter = CsvAdapter::tsv(file.path().to_path_buf());

        let definitions = adapter.read().unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].row, 0);
        assert_eq!(definitions[0].symbol, "XYZ");
        assert_eq!(definitions[0].amount, "1,000");
        assert_eq!(definitions[1].row, 1);
        assert_eq!(definitions[1].currency, "usd");
    }

    #[test]
    fn reads_comma_separated_rows() {
        let file = write_ledger("05-03-2023 14:30:00,bist,BUY,XYZ,10,12.5,0,try\n");
        let adapter = CsvAdapter::csv(file.path().to_path_buf());

        let definitions = adapter.read().unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].instrument_type, "bist");
    }

    #[test]
    fn short_row_names_the_offending_line() {
        let file = write_ledger(
            "05-03-2023 14:30:00\tbist\tBUY\tXYZ\t10\t12.5\t0\ttry\n\
             06-03-2023 10:00:00\tbist\tBUY\n",
        );
        let adapter = CsvAdapter::tsv(file.path().to_path_buf());

        match adapter.read().unwrap_err() {
            ReportError::InvalidTransaction { row, reason } => {
                assert_eq!(row, 1);
                assert!(reason.contains("columns"));
            }
            other => panic!("expected InvalidTransaction, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let adapter = CsvAdapter::tsv(PathBuf::from("/nonexistent/ledger.tsv"));
        assert!(matches!(adapter.read().unwrap_err(), ReportError::Io(_)));
    }
}
