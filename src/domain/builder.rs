//! Turns raw ledger rows into currency-normalized transaction events.

use super::error::ReportError;
use super::instrument::{Instrument, InstrumentType};
use super::money::Currency;
use super::price_cache::PriceCache;
use super::transaction::{
    parse_ledger_datetime, parse_ledger_decimal, TransactionDefinition, TransactionEvent,
    TransactionSide,
};

pub struct TransactionBuilder<'a> {
    cache: &'a PriceCache,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(cache: &'a PriceCache) -> TransactionBuilder<'a> {
        TransactionBuilder { cache }
    }

    /// Parse and normalize one row. Any parse or lookup failure is wrapped
    /// with the row index so batch ingestion can name the bad line.
    pub fn build(
        &self,
        definition: &TransactionDefinition,
    ) -> Result<TransactionEvent, ReportError> {
        let fail = |reason: String| ReportError::InvalidTransaction {
            row: definition.row,
            reason,
        };

        let date = parse_ledger_datetime(&definition.date)
            .map_err(|e| fail(format!("bad date {:?}: {}", definition.date, e)))?;

        let instrument_type = InstrumentType::parse(&definition.instrument_type)
            .ok_or_else(|| fail(format!("unknown instrument type {:?}", definition.instrument_type)))?;

        let side = TransactionSide::parse(&definition.transaction_type)
            .ok_or_else(|| fail(format!("unknown transaction type {:?}", definition.transaction_type)))?;

        let currency = Currency::parse(&definition.currency)
            .ok_or_else(|| fail(format!("unknown currency {:?}", definition.currency)))?;

        let amount = parse_ledger_decimal(&definition.amount)
            .map_err(|e| fail(format!("bad amount {:?}: {}", definition.amount, e)))?;

        let stated_price = parse_ledger_decimal(&definition.purchase_price)
            .map_err(|e| fail(format!("bad purchase price {:?}: {}", definition.purchase_price, e)))?;

        let stated_commission = parse_ledger_decimal(&definition.commission)
            .map_err(|e| fail(format!("bad commission {:?}: {}", definition.commission, e)))?;

        let purchase_price = self
            .cache
            .exchange_rates(date.date(), stated_price, currency)
            .map_err(|e| fail(e.to_string()))?;
        let commission = self
            .cache
            .exchange_rates(date.date(), stated_commission, currency)
            .map_err(|e| fail(e.to_string()))?;

        Ok(TransactionEvent {
            date,
            instrument: Instrument::new(instrument_type, definition.symbol.trim()),
            side,
            amount,
            purchase_price,
            commission,
            currency,
        })
    }
}
