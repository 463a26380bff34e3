//! Position analysis: cost basis, income, mark-to-market value, PNL and
//! ROI for one instrument's transaction set.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::ReportError;
use super::money::Quotes;
use super::price_cache::PriceCache;
use super::transaction::{LedgerEntry, TransactionSide};

/// Accumulated totals for one transaction set, valued at a fixed date.
///
/// Buys accumulate into cost and increase the net amount, sells into
/// income and decrease it. `total_value` is the net amount marked to
/// market at the valuation date, or zero for a flat position (no price
/// lookup happens in that case).
#[derive(Debug, Clone, PartialEq)]
pub struct Analyzer {
    pub total_cost: Quotes,
    pub total_income: Quotes,
    pub total_amount: Decimal,
    pub total_value: Quotes,
    initial_value: Quotes,
}

impl Analyzer {
    pub fn analyze(
        entries: &[LedgerEntry],
        valuation_date: NaiveDate,
        cache: &PriceCache,
    ) -> Result<Analyzer, ReportError> {
        let mut total_cost = Quotes::zero();
        let mut total_income = Quotes::zero();
        let mut total_amount = Decimal::ZERO;

        for entry in entries {
            let traded = entry.purchase_price().multiply_scalar(entry.amount());
            match entry.side() {
                TransactionSide::Buy => {
                    total_cost = total_cost.add(&traded);
                    total_amount += entry.amount();
                }
                TransactionSide::Sell => {
                    total_income = total_income.add(&traded);
                    total_amount -= entry.amount();
                }
            }
        }

        let total_value = if total_amount.is_zero() {
            Quotes::zero()
        } else {
            let instrument = entries
                .first()
                .map(|e| e.instrument().clone())
                .ok_or_else(|| ReportError::InvalidParameters {
                    reason: "cannot analyze an empty transaction set".into(),
                })?;
            cache
                .price(&instrument, valuation_date)?
                .multiply_scalar(total_amount)
        };

        let initial_value = entries
            .iter()
            .find(|e| e.is_opening())
            .map(|e| e.purchase_price().multiply_scalar(e.amount()))
            .unwrap_or_else(Quotes::zero);

        Ok(Analyzer {
            total_cost,
            total_income,
            total_amount,
            total_value,
            initial_value,
        })
    }

    pub fn pnl(&self) -> Quotes {
        self.total_income.add(&self.total_value).subtract(&self.total_cost)
    }

    /// Percentage return on the accumulated cost. The caller guards
    /// against a zero cost vector before asking.
    pub fn roi(&self) -> Quotes {
        self.pnl()
            .divide(&self.total_cost)
            .multiply_scalar(Decimal::ONE_HUNDRED)
    }

    /// Cost per unit held. The caller guards against a zero net amount.
    pub fn unit_cost(&self) -> Quotes {
        self.total_value
            .subtract(&self.pnl())
            .divide_scalar(self.total_amount)
    }

    /// Value of the opening position at the window boundary, zero when
    /// the set has no opening entry.
    pub fn initial_value(&self) -> Quotes {
        self.initial_value.clone()
    }
}
