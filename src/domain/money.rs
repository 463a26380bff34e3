//! Multi-currency monetary vectors ("quotes") and their arithmetic.
//!
//! Every amount the engine produces is expressed simultaneously in all
//! tracked currencies. A [`Quotes`] vector always carries an entry for
//! every [`Currency`]; sparse vectors never leave this module.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fractional digits kept after a division.
pub const QUOTE_SCALE: u32 = 5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Currency {
    Usd,
    Eur,
    Try,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Try];

    pub fn parse(s: &str) -> Option<Currency> {
        match s.to_lowercase().as_str() {
            "usd" => Some(Currency::Usd),
            "eur" => Some(Currency::Eur),
            "try" => Some(Currency::Try),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Try => "TRY",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Try => "₺",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount expressed in every tracked currency at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotes {
    values: BTreeMap<Currency, Decimal>,
}

impl Quotes {
    /// The distinguished zero vector.
    pub fn zero() -> Quotes {
        Quotes::from_fn(|_| Decimal::ZERO)
    }

    /// Build a vector with one entry per tracked currency.
    pub fn from_fn(f: impl Fn(Currency) -> Decimal) -> Quotes {
        Quotes {
            values: Currency::ALL.iter().map(|&c| (c, f(c))).collect(),
        }
    }

    /// Same amount in every currency. Test and fixture helper.
    pub fn uniform(amount: Decimal) -> Quotes {
        Quotes::from_fn(|_| amount)
    }

    pub fn get(&self, currency: Currency) -> Decimal {
        self.values[&currency]
    }

    /// Whether the vector carries an entry for every tracked currency.
    ///
    /// Constructors always produce complete vectors, but deserialized
    /// ones may not; arithmetic requires the full key set.
    pub fn is_complete(&self) -> bool {
        Currency::ALL.iter().all(|c| self.values.contains_key(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        self.values.iter().map(|(&c, &v)| (c, v))
    }

    /// Whether this vector counts as zero.
    ///
    /// Matches the historical behaviour exactly: the vector is "zero" as
    /// soon as *any* currency component is zero, not when all of them are.
    /// Downstream open-position checks rely on this, so it is kept as-is.
    pub fn is_zero(&self) -> bool {
        self.values.values().any(|v| v.is_zero())
    }

    pub fn add(&self, other: &Quotes) -> Quotes {
        self.zip(other, |a, b| a + b)
    }

    pub fn subtract(&self, other: &Quotes) -> Quotes {
        self.zip(other, |a, b| a - b)
    }

    pub fn multiply(&self, other: &Quotes) -> Quotes {
        self.zip(other, |a, b| a * b)
    }

    /// Element-wise division at scale 5, rounding half-up.
    ///
    /// A zero component in `other` is a caller bug; callers guard before
    /// dividing.
    pub fn divide(&self, other: &Quotes) -> Quotes {
        self.zip(other, |a, b| round_div(a, b))
    }

    pub fn add_scalar(&self, constant: Decimal) -> Quotes {
        self.map(|v| v + constant)
    }

    pub fn subtract_scalar(&self, constant: Decimal) -> Quotes {
        self.map(|v| v - constant)
    }

    pub fn multiply_scalar(&self, constant: Decimal) -> Quotes {
        self.map(|v| v * constant)
    }

    pub fn divide_scalar(&self, constant: Decimal) -> Quotes {
        self.map(|v| round_div(v, constant))
    }

    fn map(&self, f: impl Fn(Decimal) -> Decimal) -> Quotes {
        Quotes {
            values: self.values.iter().map(|(&c, &v)| (c, f(v))).collect(),
        }
    }

    fn zip(&self, other: &Quotes, f: impl Fn(Decimal, Decimal) -> Decimal) -> Quotes {
        assert_eq!(
            self.values.len(),
            other.values.len(),
            "quotes vectors must cover the same currency set"
        );
        Quotes {
            values: self
                .values
                .iter()
                .map(|(&c, &v)| (c, f(v, other.values[&c])))
                .collect(),
        }
    }
}

impl Default for Quotes {
    fn default() -> Quotes {
        Quotes::zero()
    }
}

fn round_div(a: Decimal, b: Decimal) -> Decimal {
    (a / b).round_dp_with_strategy(QUOTE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Quotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (currency, value) in &self.values {
            if !first {
                write!(f, " / ")?;
            }
            write!(f, "{}{}", currency.prefix(), value.round_dp(2))?;
            first = false;
        }
        Ok(())
    }
}
