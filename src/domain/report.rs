//! Report assembly: parameter validation, open-position rows, the
//! aggregation rollup and trailing PNL history series.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use super::aggregation::{aggregate, AggregatedAnalyzeResult};
use super::analyzer::Analyzer;
use super::builder::TransactionBuilder;
use super::error::ReportError;
use super::instrument::{Instrument, InstrumentType};
use super::money::{Currency, Quotes};
use super::open_positions::resolve_open_positions;
use super::price_cache::PriceCache;
use super::transaction::{today, LedgerEntry, TransactionDefinition, TransactionEvent};
use super::windowing::{windowize, windowize_range, Period};

/// Trailing PNL series granularity. `window_count` windows of
/// `window_days` each, ending at the report date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PnlHistoryUnit {
    Day,
    Week,
    Month,
    Year,
}

impl PnlHistoryUnit {
    pub const ALL_UNITS: [PnlHistoryUnit; 4] = [
        PnlHistoryUnit::Day,
        PnlHistoryUnit::Week,
        PnlHistoryUnit::Month,
        PnlHistoryUnit::Year,
    ];

    pub fn window_count(&self) -> usize {
        match self {
            PnlHistoryUnit::Day => 30,
            PnlHistoryUnit::Week => 8,
            PnlHistoryUnit::Month => 24,
            PnlHistoryUnit::Year => 2,
        }
    }

    pub fn window_days(&self) -> i64 {
        match self {
            PnlHistoryUnit::Day => 1,
            PnlHistoryUnit::Week => 7,
            PnlHistoryUnit::Month => 30,
            PnlHistoryUnit::Year => 365,
        }
    }

    pub fn parse(s: &str) -> Option<PnlHistoryUnit> {
        match s.to_lowercase().as_str() {
            "day" => Some(PnlHistoryUnit::Day),
            "week" => Some(PnlHistoryUnit::Week),
            "month" => Some(PnlHistoryUnit::Month),
            "year" => Some(PnlHistoryUnit::Year),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PnlHistoryUnit::Day => "Daily",
            PnlHistoryUnit::Week => "Weekly",
            PnlHistoryUnit::Month => "Monthly",
            PnlHistoryUnit::Year => "Yearly",
        }
    }
}

/// Everything a caller may ask for, unchecked.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub transactions: Vec<TransactionDefinition>,
    pub report_date: NaiveDate,
    pub periods: BTreeSet<Period>,
    pub history_units: BTreeSet<PnlHistoryUnit>,
    pub currencies: BTreeSet<Currency>,
    pub filtered_instrument_types: BTreeSet<InstrumentType>,
    pub filtered_symbols: BTreeSet<String>,
    pub output_file: Option<PathBuf>,
}

/// A validated request. Construction only via [`validate_request`].
#[derive(Debug, Clone)]
pub struct ReportParameters {
    pub transactions: Vec<TransactionDefinition>,
    pub report_date: NaiveDate,
    pub periods: BTreeSet<Period>,
    pub history_units: BTreeSet<PnlHistoryUnit>,
    pub currencies: BTreeSet<Currency>,
    pub filtered_instrument_types: BTreeSet<InstrumentType>,
    pub filtered_symbols: BTreeSet<String>,
    pub output_file: Option<PathBuf>,
}

/// Check a request before any computation or price lookup happens.
pub fn validate_request(request: ReportRequest) -> Result<ReportParameters, ReportError> {
    let invalid = |reason: &str| ReportError::InvalidParameters {
        reason: reason.to_string(),
    };

    if request.transactions.is_empty() {
        return Err(invalid("transactions must not be empty"));
    }
    if request.report_date > today() {
        return Err(invalid("report date must not be in the future"));
    }
    if request.periods.is_empty() {
        return Err(invalid("periods must not be empty"));
    }
    if request.currencies.is_empty() {
        return Err(invalid("currencies must not be empty"));
    }

    Ok(ReportParameters {
        transactions: request.transactions,
        report_date: request.report_date,
        periods: request.periods,
        history_units: request.history_units,
        currencies: request.currencies,
        filtered_instrument_types: request.filtered_instrument_types,
        filtered_symbols: request.filtered_symbols,
        output_file: request.output_file,
    })
}

/// One open-position row of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentAnalyzeResult {
    pub instrument: Instrument,
    pub transactions: Vec<TransactionEvent>,
    pub total_amount: Decimal,
    pub price: Option<Quotes>,
    pub unit_cost: Quotes,
    pub total_value: Quotes,
    pub total_commission: Quotes,
    pub pnl: BTreeMap<Period, Quotes>,
    pub roi: BTreeMap<Period, Quotes>,
}

/// One window of a trailing PNL series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalAnalyzeResult {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub pnl: Quotes,
}

/// The full generated report, handed to a sink for rendering.
#[derive(Debug, Clone)]
pub struct Report {
    pub transactions: Vec<TransactionEvent>,
    pub aggregated: AggregatedAnalyzeResult,
    pub open_positions: Vec<InstrumentAnalyzeResult>,
    pub pnl_history: BTreeMap<PnlHistoryUnit, Vec<HistoricalAnalyzeResult>>,
}

pub struct ReportService<'a> {
    cache: &'a PriceCache,
}

impl<'a> ReportService<'a> {
    pub fn new(cache: &'a PriceCache) -> ReportService<'a> {
        ReportService { cache }
    }

    /// Run the whole pipeline. The first error aborts generation; no
    /// partial report is ever produced.
    pub fn generate(&self, parameters: &ReportParameters) -> Result<Report, ReportError> {
        let builder = TransactionBuilder::new(self.cache);
        let mut events = parameters
            .transactions
            .iter()
            .map(|d| builder.build(d))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(|e| e.date);

        events.retain(|e| {
            (parameters.filtered_instrument_types.is_empty()
                || parameters
                    .filtered_instrument_types
                    .contains(&e.instrument.instrument_type))
                && (parameters.filtered_symbols.is_empty()
                    || parameters.filtered_symbols.contains(&e.instrument.symbol))
        });

        let open_positions = self.analyze_open_positions(&events, parameters)?;
        let aggregated = aggregate(
            &events,
            &parameters.periods,
            parameters.report_date,
            self.cache,
        )?;
        let pnl_history = self.build_pnl_history(&events, parameters)?;

        Ok(Report {
            transactions: events,
            aggregated,
            open_positions,
            pnl_history,
        })
    }

    fn analyze_open_positions(
        &self,
        events: &[TransactionEvent],
        parameters: &ReportParameters,
    ) -> Result<Vec<InstrumentAnalyzeResult>, ReportError> {
        let mut rows = Vec::new();
        for (instrument, episode) in resolve_open_positions(events) {
            let entries: Vec<LedgerEntry> =
                episode.iter().cloned().map(LedgerEntry::Real).collect();
            let analyzer = Analyzer::analyze(&entries, parameters.report_date, self.cache)?;
            let total_commission = entries
                .iter()
                .fold(Quotes::zero(), |acc, e| acc.add(e.commission()));

            let price = if analyzer.total_amount.is_zero() {
                None
            } else {
                Some(self.cache.price(&instrument, parameters.report_date)?)
            };
            let unit_cost = if analyzer.total_amount.is_zero() {
                Quotes::zero()
            } else {
                analyzer.unit_cost()
            };

            let mut pnl = BTreeMap::new();
            let mut roi = BTreeMap::new();
            for &period in &parameters.periods {
                let Some(window) =
                    windowize(&episode, period, parameters.report_date, self.cache)?
                else {
                    continue;
                };
                let period_analyzer =
                    Analyzer::analyze(&window, parameters.report_date, self.cache)?;
                pnl.insert(period, period_analyzer.pnl());
                if !period_analyzer.total_cost.is_zero() {
                    roi.insert(period, period_analyzer.roi());
                }
            }

            rows.push(InstrumentAnalyzeResult {
                instrument,
                total_amount: analyzer.total_amount,
                price,
                unit_cost,
                total_value: analyzer.total_value.clone(),
                total_commission,
                pnl,
                roi,
                transactions: episode,
            });
        }
        Ok(rows)
    }

    /// For each unit, the trailing `window_count` consecutive windows
    /// ending at the report date, oldest first. Each window's PNL is the
    /// sum over instruments of the windowed analyzer's PNL valued at the
    /// window end.
    fn build_pnl_history(
        &self,
        events: &[TransactionEvent],
        parameters: &ReportParameters,
    ) -> Result<BTreeMap<PnlHistoryUnit, Vec<HistoricalAnalyzeResult>>, ReportError> {
        let mut by_instrument: BTreeMap<Instrument, Vec<TransactionEvent>> = BTreeMap::new();
        for event in events {
            by_instrument
                .entry(event.instrument.clone())
                .or_default()
                .push(event.clone());
        }

        let mut history = BTreeMap::new();
        for &unit in &parameters.history_units {
            let mut series = Vec::with_capacity(unit.window_count());
            for offset in (0..unit.window_count()).rev() {
                let end =
                    parameters.report_date - Duration::days(offset as i64 * unit.window_days());
                let start = end - Duration::days(unit.window_days());

                let mut pnl = Quotes::zero();
                for instrument_events in by_instrument.values() {
                    let Some(window) =
                        windowize_range(instrument_events, start, end, self.cache)?
                    else {
                        continue;
                    };
                    let analyzer = Analyzer::analyze(&window, end, self.cache)?;
                    pnl = pnl.add(&analyzer.pnl());
                }
                series.push(HistoricalAnalyzeResult { start, end, pnl });
            }
            history.insert(unit, series);
        }
        Ok(history)
    }
}
