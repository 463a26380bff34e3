//! CLI definition and dispatch.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::rest_price_adapter::{RestPriceAdapter, DEFAULT_API_HOST};
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::error::ReportError;
use crate::domain::instrument::InstrumentType;
use crate::domain::money::Currency;
use crate::domain::price_cache::{PriceCache, ORACLE_DATE_FORMAT};
use crate::domain::report::{
    validate_request, PnlHistoryUnit, ReportRequest, ReportService,
};
use crate::domain::transaction::{
    parse_ledger_datetime, parse_ledger_decimal, today, TransactionDefinition,
};
use crate::domain::windowing::Period;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_sink::ReportSink;
use crate::ports::transaction_source::TransactionSource;

#[derive(Parser, Debug)]
#[command(name = "pnlreport", about = "Portfolio PNL/ROI report generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a report from a transaction ledger
    Report {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Report date, dd-MM-yyyy; defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated list: 1d,1w,1m,all
        #[arg(long)]
        periods: Option<String>,
        /// Comma-separated list: usd,eur,try
        #[arg(long)]
        currencies: Option<String>,
        /// Only include these instrument types (bist,currency,fund)
        #[arg(long)]
        filter_type: Option<String>,
        /// Only include these symbols
        #[arg(long)]
        filter_symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Price cache snapshot location
        #[arg(long)]
        cache_file: Option<PathBuf>,
        #[arg(long)]
        api_host: Option<String>,
        /// Ledger delimiter: tab or comma
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Parse a transaction ledger without generating a report
    Validate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        delimiter: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Report {
            input,
            config,
            date,
            periods,
            currencies,
            filter_type,
            filter_symbol,
            output,
            cache_file,
            api_host,
            delimiter,
        } => run_report(ReportArgs {
            input,
            config,
            date,
            periods,
            currencies,
            filter_type,
            filter_symbol,
            output,
            cache_file,
            api_host,
            delimiter,
        }),
        Command::Validate { input, delimiter } => run_validate(&input, delimiter.as_deref()),
    }
}

struct ReportArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    date: Option<String>,
    periods: Option<String>,
    currencies: Option<String>,
    filter_type: Option<String>,
    filter_symbol: Option<String>,
    output: Option<PathBuf>,
    cache_file: Option<PathBuf>,
    api_host: Option<String>,
    delimiter: Option<String>,
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ReportError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_report(args: ReportArgs) -> ExitCode {
    // Stage 1: Load config
    let config: Option<FileConfigAdapter> = match &args.config {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            match load_config(path) {
                Ok(adapter) => Some(adapter),
                Err(code) => return code,
            }
        }
        None => None,
    };
    let setting = |flag: &Option<String>, section: &str, key: &str| -> Option<String> {
        flag.clone()
            .or_else(|| config.as_ref().and_then(|c| c.get_string(section, key)))
    };

    // Stage 2: Resolve options, flags over config
    let options = || -> Result<ResolvedOptions, ReportError> {
        let report_date = match setting(&args.date, "report", "date") {
            Some(raw) => parse_report_date(&raw)?,
            None => today(),
        };
        let periods = match setting(&args.periods, "report", "periods") {
            Some(raw) => parse_periods(&raw)?,
            None => Period::ALL_PERIODS.into_iter().collect(),
        };
        let currencies = match setting(&args.currencies, "report", "currencies") {
            Some(raw) => parse_currencies(&raw)?,
            None => [Currency::Usd, Currency::Try].into_iter().collect(),
        };
        let history_units = match config
            .as_ref()
            .and_then(|c| c.get_string("report", "history_units"))
        {
            Some(raw) => parse_history_units(&raw)?,
            None => PnlHistoryUnit::ALL_UNITS.into_iter().collect(),
        };
        let filtered_instrument_types =
            match setting(&args.filter_type, "report", "filter_type") {
                Some(raw) => parse_instrument_types(&raw)?,
                None => BTreeSet::new(),
            };
        let filtered_symbols = setting(&args.filter_symbol, "report", "filter_symbol")
            .map(|raw| split_list(&raw).map(str::to_string).collect())
            .unwrap_or_default();
        let delimiter = parse_delimiter(
            setting(&args.delimiter, "report", "delimiter").as_deref(),
        )?;
        Ok(ResolvedOptions {
            report_date,
            periods,
            currencies,
            history_units,
            filtered_instrument_types,
            filtered_symbols,
            delimiter,
            output: args.output.clone().or_else(|| {
                config
                    .as_ref()
                    .and_then(|c| c.get_string("report", "output"))
                    .map(PathBuf::from)
            }),
            cache_file: args.cache_file.clone().or_else(|| {
                config
                    .as_ref()
                    .and_then(|c| c.get_string("report", "cache_file"))
                    .map(PathBuf::from)
            }),
            api_host: setting(&args.api_host, "price_api", "host")
                .unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
        })
    };
    let options = match options() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Read the ledger
    eprintln!("Reading transactions from {}", args.input.display());
    let source = match options.delimiter {
        Delimiter::Tab => CsvAdapter::tsv(args.input.clone()),
        Delimiter::Comma => CsvAdapter::csv(args.input.clone()),
    };
    let definitions = match source.read() {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Read {} transactions", definitions.len());

    // Stage 4: Price cache, optionally backed by a snapshot
    let oracle = Box::new(RestPriceAdapter::new(options.api_host.clone()));
    let mut cache = match &options.cache_file {
        Some(path) => PriceCache::with_snapshot(oracle, path.clone()),
        None => PriceCache::new(oracle),
    };

    // Stage 5: Validate parameters and generate
    let request = ReportRequest {
        transactions: definitions,
        report_date: options.report_date,
        periods: options.periods,
        history_units: options.history_units,
        currencies: options.currencies,
        filtered_instrument_types: options.filtered_instrument_types,
        filtered_symbols: options.filtered_symbols,
        output_file: options.output.clone(),
    };
    let parameters = match validate_request(request) {
        Ok(parameters) => parameters,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Generating report for {}", options.report_date.format(ORACLE_DATE_FORMAT));
    let report = match ReportService::new(&cache).generate(&parameters) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 6: Render
    let sink = TextReportAdapter;
    let rendered = match options.output {
        Some(path) => {
            let mut buffer = Vec::new();
            sink.write(&report, &parameters, &mut buffer)
                .and_then(|_| fs::write(&path, &buffer).map_err(ReportError::from))
                .map(|_| eprintln!("Report written to {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout();
            sink.write(&report, &parameters, &mut stdout)
        }
    };
    if let Err(e) = rendered {
        eprintln!("error: {e}");
        return (&e).into();
    }

    cache.shutdown();
    ExitCode::SUCCESS
}

fn run_validate(input: &PathBuf, delimiter: Option<&str>) -> ExitCode {
    let delimiter = match parse_delimiter(delimiter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Reading transactions from {}", input.display());
    let source = match delimiter {
        Delimiter::Tab => CsvAdapter::tsv(input.clone()),
        Delimiter::Comma => CsvAdapter::csv(input.clone()),
    };
    let definitions = match source.read() {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for definition in &definitions {
        if let Err(e) = check_definition(definition) {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }
    println!("Validated {} transactions", definitions.len());
    ExitCode::SUCCESS
}

/// Field-level checks that need no price lookups.
fn check_definition(definition: &TransactionDefinition) -> Result<(), ReportError> {
    let fail = |reason: String| ReportError::InvalidTransaction {
        row: definition.row,
        reason,
    };

    parse_ledger_datetime(&definition.date)
        .map_err(|e| fail(format!("bad date {:?}: {}", definition.date, e)))?;
    InstrumentType::parse(&definition.instrument_type)
        .ok_or_else(|| fail(format!("unknown instrument type {:?}", definition.instrument_type)))?;
    crate::domain::transaction::TransactionSide::parse(&definition.transaction_type)
        .ok_or_else(|| fail(format!("unknown transaction type {:?}", definition.transaction_type)))?;
    Currency::parse(&definition.currency)
        .ok_or_else(|| fail(format!("unknown currency {:?}", definition.currency)))?;
    parse_ledger_decimal(&definition.amount)
        .map_err(|e| fail(format!("bad amount {:?}: {}", definition.amount, e)))?;
    parse_ledger_decimal(&definition.purchase_price)
        .map_err(|e| fail(format!("bad purchase price {:?}: {}", definition.purchase_price, e)))?;
    parse_ledger_decimal(&definition.commission)
        .map_err(|e| fail(format!("bad commission {:?}: {}", definition.commission, e)))?;
    Ok(())
}

struct ResolvedOptions {
    report_date: NaiveDate,
    periods: BTreeSet<Period>,
    currencies: BTreeSet<Currency>,
    history_units: BTreeSet<PnlHistoryUnit>,
    filtered_instrument_types: BTreeSet<InstrumentType>,
    filtered_symbols: BTreeSet<String>,
    delimiter: Delimiter,
    output: Option<PathBuf>,
    cache_file: Option<PathBuf>,
    api_host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Tab,
    Comma,
}

fn invalid(reason: String) -> ReportError {
    ReportError::InvalidParameters { reason }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_report_date(raw: &str) -> Result<NaiveDate, ReportError> {
    NaiveDate::parse_from_str(raw, ORACLE_DATE_FORMAT)
        .map_err(|e| invalid(format!("bad report date {raw:?}: {e}")))
}

fn parse_periods(raw: &str) -> Result<BTreeSet<Period>, ReportError> {
    split_list(raw)
        .map(|s| Period::parse(s).ok_or_else(|| invalid(format!("unknown period {s:?}"))))
        .collect()
}

fn parse_currencies(raw: &str) -> Result<BTreeSet<Currency>, ReportError> {
    split_list(raw)
        .map(|s| Currency::parse(s).ok_or_else(|| invalid(format!("unknown currency {s:?}"))))
        .collect()
}

fn parse_history_units(raw: &str) -> Result<BTreeSet<PnlHistoryUnit>, ReportError> {
    split_list(raw)
        .map(|s| {
            PnlHistoryUnit::parse(s).ok_or_else(|| invalid(format!("unknown history unit {s:?}")))
        })
        .collect()
}

fn parse_instrument_types(raw: &str) -> Result<BTreeSet<InstrumentType>, ReportError> {
    split_list(raw)
        .map(|s| {
            InstrumentType::parse(s).ok_or_else(|| invalid(format!("unknown instrument type {s:?}")))
        })
        .collect()
}

fn parse_delimiter(raw: Option<&str>) -> Result<Delimiter, ReportError> {
    match raw {
        None | Some("tab") => Ok(Delimiter::Tab),
        Some("comma") => Ok(Delimiter::Comma),
        Some(other) => Err(invalid(format!(
            "unknown delimiter {other:?}, expected tab or comma"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_period_and_currency_lists() {
        let periods = parse_periods("1d, 1w,all").unwrap();
        assert!(periods.contains(&Period::D1));
        assert!(periods.contains(&Period::All));
        assert_eq!(periods.len(), 3);

        let currencies = parse_currencies("usd,try").unwrap();
        assert_eq!(currencies.len(), 2);

        assert!(parse_periods("1d,2y").is_err());
        assert!(parse_currencies("usd,gbp").is_err());
    }

    #[test]
    fn parses_report_date() {
        assert_eq!(
            parse_report_date("05-03-2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 5).unwrap()
        );
        assert!(parse_report_date("2023-03-05").is_err());
    }

    #[test]
    fn delimiter_defaults_to_tab() {
        assert_eq!(parse_delimiter(None).unwrap(), Delimiter::Tab);
        assert_eq!(parse_delimiter(Some("comma")).unwrap(), Delimiter::Comma);
        assert!(parse_delimiter(Some("pipe")).is_err());
    }

    #[test]
    fn definition_checks_catch_bad_fields() {
        let mut definition = TransactionDefinition {
            row: 7,
            date: "05-03-2023 14:30:00".into(),
            instrument_type: "bist".into(),
            transaction_type: "BUY".into(),
            symbol: "XYZ".into(),
            amount: "1,000".into(),
            purchase_price: "12.5".into(),
            commission: "0".into(),
            currency: "try".into(),
        };
        assert!(check_definition(&definition).is_ok());

        definition.currency = "gbp".into();
        assert!(matches!(
            check_definition(&definition).unwrap_err(),
            ReportError::InvalidTransaction { row: 7, .. }
        ));
    }
}
