//! Transaction events, raw definitions and the synthetic opening position.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::instrument::Instrument;
use super::money::{Currency, Quotes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionSide {
    Buy,
    Sell,
}

impl TransactionSide {
    pub fn parse(s: &str) -> Option<TransactionSide> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(TransactionSide::Buy),
            "SELL" => Some(TransactionSide::Sell),
            _ => None,
        }
    }

    /// Signed contribution of `amount` to a running position.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionSide::Buy => amount,
            TransactionSide::Sell => -amount,
        }
    }
}

/// One raw ledger row as read from the transaction source, untyped.
///
/// `row` is the zero-based position in the input so failures can name the
/// offending line.
#[derive(Debug, Clone)]
pub struct TransactionDefinition {
    pub row: usize,
    pub date: String,
    pub instrument_type: String,
    pub transaction_type: String,
    pub symbol: String,
    pub amount: String,
    pub purchase_price: String,
    pub commission: String,
    pub currency: String,
}

/// An immutable, currency-normalized transaction fact.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEvent {
    pub date: NaiveDateTime,
    pub instrument: Instrument,
    pub side: TransactionSide,
    pub amount: Decimal,
    pub purchase_price: Quotes,
    pub commission: Quotes,
    pub currency: Currency,
}

/// All activity up to a period boundary, collapsed into one position.
///
/// Built by folding every transaction at-or-before the boundary, then
/// priced once (at market as of the boundary date, not at historical
/// cost) and frozen. Always reads as a buy.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedTransaction {
    pub date: NaiveDateTime,
    pub instrument: Instrument,
    pub purchase_price: Quotes,
    pub amount: Decimal,
    pub commission: Quotes,
}

impl UnifiedTransaction {
    /// Fold a chronological sequence of events into one opening position.
    pub fn fold<'a>(
        date: NaiveDateTime,
        instrument: Instrument,
        events: impl IntoIterator<Item = &'a TransactionEvent>,
    ) -> UnifiedTransaction {
        let mut amount = Decimal::ZERO;
        let mut commission = Quotes::zero();
        for event in events {
            amount += event.side.signed(event.amount);
            commission = commission.add(&event.commission);
        }
        UnifiedTransaction {
            date,
            instrument,
            purchase_price: Quotes::zero(),
            amount,
            commission,
        }
    }

    pub fn with_price(mut self, price: Quotes) -> UnifiedTransaction {
        self.purchase_price = price;
        self
    }
}

/// Uniform view over real and synthetic transactions.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntry {
    Real(TransactionEvent),
    Opening(UnifiedTransaction),
}

impl LedgerEntry {
    pub fn instrument(&self) -> &Instrument {
        match self {
            LedgerEntry::Real(t) => &t.instrument,
            LedgerEntry::Opening(u) => &u.instrument,
        }
    }

    pub fn side(&self) -> TransactionSide {
        match self {
            LedgerEntry::Real(t) => t.side,
            LedgerEntry::Opening(_) => TransactionSide::Buy,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            LedgerEntry::Real(t) => t.amount,
            LedgerEntry::Opening(u) => u.amount,
        }
    }

    pub fn purchase_price(&self) -> &Quotes {
        match self {
            LedgerEntry::Real(t) => &t.purchase_price,
            LedgerEntry::Opening(u) => &u.purchase_price,
        }
    }

    pub fn commission(&self) -> &Quotes {
        match self {
            LedgerEntry::Real(t) => &t.commission,
            LedgerEntry::Opening(u) => &u.commission,
        }
    }

    pub fn is_opening(&self) -> bool {
        matches!(self, LedgerEntry::Opening(_))
    }
}

/// Input timestamp format of the ledger (`31-01-2024 14:30:00`).
pub const LEDGER_DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

pub fn parse_ledger_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, LEDGER_DATETIME_FORMAT)
}

/// Strip thousands separators before parsing a decimal field.
pub fn parse_ledger_decimal(s: &str) -> Result<Decimal, rust_decimal::Error> {
    s.replace(',', "").trim().parse()
}

/// The calendar date considered "today" for snapshot and validation
/// purposes.
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn event(side: TransactionSide, amount: Decimal, commission: Decimal) -> TransactionEvent {
        TransactionEvent {
            date: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            instrument: Instrument::new(InstrumentType::Bist, "XYZ"),
            side,
            amount,
            purchase_price: Quotes::uniform(dec!(100)),
            commission: Quotes::uniform(commission),
            currency: Currency::Try,
        }
    }

    #[test]
    fn side_parse() {
        assert_eq!(TransactionSide::parse("BUY"), Some(TransactionSide::Buy));
        assert_eq!(TransactionSide::parse("sell"), Some(TransactionSide::Sell));
        assert_eq!(TransactionSide::parse("hold"), None);
    }

    #[test]
    fn fold_accumulates_signed_amount_and_commission() {
        let events = vec![
            event(TransactionSide::Buy, dec!(10), dec!(1)),
            event(TransactionSide::Sell, dec!(4), dec!(2)),
        ];
        let boundary = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let unified = UnifiedTransaction::fold(
            boundary,
            Instrument::new(InstrumentType::Bist, "XYZ"),
            &events,
        );

        assert_eq!(unified.amount, dec!(6));
        assert_eq!(unified.commission.get(Currency::Usd), dec!(3));
        assert_eq!(unified.purchase_price, Quotes::zero());
    }

    #[test]
    fn opening_entry_reads_as_buy() {
        let unified = UnifiedTransaction::fold(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Instrument::new(InstrumentType::Fund, "F1"),
            [],
        );
        let entry = LedgerEntry::Opening(unified);
        assert_eq!(entry.side(), TransactionSide::Buy);
        assert!(entry.is_opening());
    }

    #[test]
    fn ledger_field_parsers() {
        let dt = parse_ledger_datetime("05-03-2023 14:30:00").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2023, 3, 5).unwrap());

        assert_eq!(parse_ledger_decimal("1,234.50").unwrap(), dec!(1234.50));
        assert!(parse_ledger_decimal("abc").is_err());
    }
}
