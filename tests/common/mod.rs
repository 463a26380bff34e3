#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use pnlreport::domain::error::ReportError;
use pnlreport::domain::instrument::InstrumentType;
use pnlreport::domain::money::Currency;
use pnlreport::domain::price_cache::ORACLE_DATE_FORMAT;
use pnlreport::domain::transaction::TransactionDefinition;
use pnlreport::ports::price_source::{DailyPrice, PriceSource};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory price oracle with per-symbol default prices, per-day
/// overrides and a call counter for cache-amortization assertions.
pub struct FakePriceSource {
    defaults: HashMap<String, Decimal>,
    overrides: HashMap<(String, NaiveDate), Decimal>,
    calls: Arc<AtomicUsize>,
}

impl FakePriceSource {
    pub fn new() -> Self {
        Self {
            defaults: HashMap::new(),
            overrides: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Unit exchange rates for every tracked currency, so stated prices
    /// pass through conversion unchanged.
    pub fn with_unit_rates(mut self) -> Self {
        for currency in Currency::ALL {
            self.defaults
                .insert(currency.code().to_string(), Decimal::ONE);
        }
        self
    }

    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.defaults.insert(symbol.to_string(), price);
        self
    }

    pub fn with_price_on(mut self, symbol: &str, date: NaiveDate, price: Decimal) -> Self {
        self.overrides.insert((symbol.to_string(), date), price);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl PriceSource for FakePriceSource {
    fn price_window(
        &self,
        instrument_type: InstrumentType,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyPrice>, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            let price = self
                .overrides
                .get(&(symbol.to_string(), day))
                .or_else(|| self.defaults.get(symbol))
                .copied()
                .ok_or(ReportError::PriceUnavailable {
                    instrument_type,
                    symbol: symbol.to_string(),
                    start,
                    end,
                })?;
            days.push(DailyPrice {
                day: day.format(ORACLE_DATE_FORMAT).to_string(),
                quotes: Currency::ALL
                    .iter()
                    .map(|c| (c.code().to_string(), price.to_string()))
                    .collect(),
            });
            day += Duration::days(1);
        }
        Ok(days)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A raw ledger row the way the TSV adapter would produce it.
pub fn definition(
    row: usize,
    date: NaiveDate,
    side: &str,
    symbol: &str,
    amount: &str,
    price: &str,
) -> TransactionDefinition {
    TransactionDefinition {
        row,
        date: format!("{} 10:00:00", date.format("%d-%m-%Y")),
        instrument_type: "bist".into(),
        transaction_type: side.into(),
        symbol: symbol.into(),
        amount: amount.into(),
        purchase_price: price.into(),
        commission: "0".into(),
        currency: "usd".into(),
    }
}
