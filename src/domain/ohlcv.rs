//! OHLCV bar representation and price-field selection.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::error::LeadLagError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Hl2 => self.median_price(),
            PriceField::Hlc3 => self.typical_price(),
        }
    }
}

/// Which price of a bar feeds the normalized series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceField {
    High,
    Low,
    Close,
    #[default]
    Hl2,
    Hlc3,
}

impl FromStr for PriceField {
    type Err = LeadLagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(PriceField::High),
            "LOW" => Ok(PriceField::Low),
            "CLOSE" => Ok(PriceField::Close),
            "HL2" => Ok(PriceField::Hl2),
            "HLC3" => Ok(PriceField::Hlc3),
            _ => Err(LeadLagError::UnknownPriceField(s.trim().to_string())),
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Hl2 => "HL2",
            PriceField::Hlc3 => "HLC3",
        };
        f.write_str(name)
    }
}
