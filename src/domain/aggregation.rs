//! Three-level portfolio rollup: root, instrument type, symbol.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::analyzer::Analyzer;
use super::error::ReportError;
use super::instrument::{Instrument, InstrumentType};
use super::money::Quotes;
use super::price_cache::PriceCache;
use super::transaction::TransactionEvent;
use super::windowing::{windowize, Period};

/// Running totals for one node of the rollup tree.
///
/// PNL accumulates additively per period. Total value accumulates only
/// from the all-time window of instruments still holding a position, so
/// it reads as the node's current mark-to-market, not a sum of period
/// deltas. ROI is recomputed from the node's own totals every time a
/// period's PNL lands, never rolled up from children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationNode {
    pub total_value: Quotes,
    pub pnl: BTreeMap<Period, Quotes>,
    pub roi: BTreeMap<Period, Quotes>,
}

impl AggregationNode {
    fn fold(&mut self, period: Period, analyzer: &Analyzer) {
        let pnl = self.pnl.entry(period).or_insert_with(Quotes::zero);
        *pnl = pnl.add(&analyzer.pnl());

        if period == Period::All && !analyzer.total_amount.is_zero() {
            self.total_value = self.total_value.add(&analyzer.total_value);
        }

        self.recompute_roi(period);
    }

    fn recompute_roi(&mut self, period: Period) {
        let pnl = match self.pnl.get(&period) {
            Some(p) => p.clone(),
            None => return,
        };
        let base = self.total_value.subtract(&pnl);
        if base.is_zero() {
            self.roi.remove(&period);
            return;
        }
        self.roi.insert(
            period,
            pnl.divide(&base).multiply_scalar(Decimal::ONE_HUNDRED),
        );
    }
}

/// Per-type subtree: the type's own totals plus one node per symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeNode {
    pub totals: AggregationNode,
    pub symbols: BTreeMap<String, AggregationNode>,
}

/// The full rollup returned by [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedAnalyzeResult {
    pub totals: AggregationNode,
    pub types: BTreeMap<InstrumentType, TypeNode>,
}

/// Group the ledger by instrument, analyze each (instrument, period)
/// window and fold every result into the root, its type node and its
/// symbol node at once.
pub fn aggregate(
    transactions: &[TransactionEvent],
    periods: &BTreeSet<Period>,
    as_of: NaiveDate,
    cache: &PriceCache,
) -> Result<AggregatedAnalyzeResult, ReportError> {
    let mut by_instrument: BTreeMap<Instrument, Vec<TransactionEvent>> = BTreeMap::new();
    for transaction in transactions {
        by_instrument
            .entry(transaction.instrument.clone())
            .or_default()
            .push(transaction.clone());
    }

    let mut result = AggregatedAnalyzeResult::default();
    for (instrument, history) in &by_instrument {
        for &period in periods {
            let Some(entries) = windowize(history, period, as_of, cache)? else {
                continue;
            };
            let analyzer = Analyzer::analyze(&entries, as_of, cache)?;

            result.totals.fold(period, &analyzer);
            let type_node = result
                .types
                .entry(instrument.instrument_type)
                .or_default();
            type_node.totals.fold(period, &analyzer);
            type_node
                .symbols
                .entry(instrument.symbol.clone())
                .or_default()
                .fold(period, &analyzer);
        }
    }
    Ok(result)
}
