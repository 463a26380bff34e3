//! Period windowing: bounded transaction sets with a synthetic opening
//! position.
//!
//! Everything at-or-before the window start is folded into one
//! [`UnifiedTransaction`] priced at market as of the boundary, so the
//! analyzer only ever sees the opening position plus in-window activity.

use chrono::{Duration, NaiveDate};

use super::error::ReportError;
use super::price_cache::PriceCache;
use super::transaction::{LedgerEntry, TransactionEvent, UnifiedTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    D1,
    W1,
    M1,
    All,
}

impl Period {
    pub const ALL_PERIODS: [Period; 4] = [Period::D1, Period::W1, Period::M1, Period::All];

    /// Window length in days; `All` has none.
    pub fn day_count(&self) -> Option<i64> {
        match self {
            Period::D1 => Some(1),
            Period::W1 => Some(7),
            Period::M1 => Some(30),
            Period::All => None,
        }
    }

    pub fn parse(s: &str) -> Option<Period> {
        match s.to_lowercase().as_str() {
            "1d" => Some(Period::D1),
            "1w" => Some(Period::W1),
            "1m" => Some(Period::M1),
            "all" => Some(Period::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::D1 => "1D",
            Period::W1 => "1W",
            Period::M1 => "1M",
            Period::All => "ALL",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Window start for one instrument's history. `All` starts one day
/// before the first transaction so every transaction ever made lands
/// inside the window; fixed periods count back from the as-of date.
fn period_start(period: Period, as_of: NaiveDate, first: &TransactionEvent) -> NaiveDate {
    match period.day_count() {
        Some(days) => as_of - Duration::days(days),
        None => first.date.date() - Duration::days(1),
    }
}

/// Build the transaction set of one instrument for one period.
///
/// Returns `Ok(None)` when the instrument had no relevant activity: an
/// empty history, or a fully-closed opening position with nothing
/// happening inside the window.
pub fn windowize(
    transactions: &[TransactionEvent],
    period: Period,
    as_of: NaiveDate,
    cache: &PriceCache,
) -> Result<Option<Vec<LedgerEntry>>, ReportError> {
    if transactions.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&TransactionEvent> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    let start = period_start(period, as_of, sorted[0]);
    windowize_sorted(&sorted, start, as_of, cache)
}

/// Same fold with explicit bounds; backs the PNL history series.
pub fn windowize_range(
    transactions: &[TransactionEvent],
    start: NaiveDate,
    end: NaiveDate,
    cache: &PriceCache,
) -> Result<Option<Vec<LedgerEntry>>, ReportError> {
    if transactions.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&TransactionEvent> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);
    windowize_sorted(&sorted, start, end, cache)
}

fn windowize_sorted(
    sorted: &[&TransactionEvent],
    start: NaiveDate,
    end: NaiveDate,
    cache: &PriceCache,
) -> Result<Option<Vec<LedgerEntry>>, ReportError> {
    let instrument = sorted[0].instrument.clone();

    let before_start = sorted.iter().filter(|t| t.date.date() <= start).copied();
    let opening = UnifiedTransaction::fold(
        start.and_hms_opt(0, 0, 0).unwrap_or_default(),
        instrument.clone(),
        before_start,
    );

    let in_window: Vec<LedgerEntry> = sorted
        .iter()
        .filter(|t| t.date.date() > start && t.date.date() <= end)
        .map(|t| LedgerEntry::Real((*t).clone()))
        .collect();

    if opening.amount.is_zero() && in_window.is_empty() {
        return Ok(None);
    }

    // A fully-closed opening position contributes nothing priced, so the
    // boundary lookup is skipped entirely.
    let opening = if opening.amount.is_zero() {
        opening
    } else {
        let price = cache.price(&instrument, start)?;
        opening.with_price(price)
    };

    let mut entries = Vec::with_capacity(in_window.len() + 1);
    entries.push(LedgerEntry::Opening(opening));
    entries.extend(in_window);
    Ok(Some(entries))
}
