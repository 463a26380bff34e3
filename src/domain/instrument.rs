//! Instruments: a (type, symbol) pair used as a map key throughout.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum InstrumentType {
    Bist,
    Currency,
    Fund,
}

impl InstrumentType {
    pub fn parse(s: &str) -> Option<InstrumentType> {
        match s.to_lowercase().as_str() {
            "bist" => Some(InstrumentType::Bist),
            "currency" => Some(InstrumentType::Currency),
            "fund" => Some(InstrumentType::Fund),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstrumentType::Bist => "BIST",
            InstrumentType::Currency => "CURRENCY",
            InstrumentType::Fund => "FUND",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Instrument {
    pub instrument_type: InstrumentType,
    pub symbol: String,
}

impl Instrument {
    pub fn new(instrument_type: InstrumentType, symbol: impl Into<String>) -> Instrument {
        Instrument {
            instrument_type,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.instrument_type, self.symbol)
    }
}
