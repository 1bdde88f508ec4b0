//! Aligned price table and the normalized per-instrument price series.
//!
//! The price provider hands over one bar list per symbol. [`PriceTable`]
//! aligns them on a single date axis, and [`NormalizedSeries::from_prices`]
//! turns the chosen price field into a series rebased so every instrument
//! starts at 100.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::error::LeadLagError;
use super::ohlcv::{OhlcvBar, PriceField};

/// Value every normalized series starts from.
pub const REBASE_LEVEL: f64 = 100.0;

/// Gap-free OHLCV table: every symbol has exactly one bar per date.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    bars: Vec<Vec<OhlcvBar>>,
}

impl PriceTable {
    /// Align per-symbol bars on the dates held by at least half of the
    /// symbols.
    ///
    /// Bars outside that axis are trimmed. Symbols missing any axis date are
    /// dropped with a warning; the core never fabricates missing observations.
    pub fn from_bars(series: Vec<(String, Vec<OhlcvBar>)>) -> Self {
        let mut inputs: Vec<(String, Vec<OhlcvBar>)> = Vec::with_capacity(series.len());
        for (symbol, mut bars) in series {
            if inputs.iter().any(|(s, _)| *s == symbol) {
                warn!(symbol = %symbol, "duplicate symbol in price input, keeping the first");
                continue;
            }
            bars.sort_by_key(|b| b.date);
            bars.dedup_by_key(|b| b.date);
            inputs.push((symbol, bars));
        }

        let mut coverage: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for (_, bars) in &inputs {
            for b in bars {
                *coverage.entry(b.date).or_default() += 1;
            }
        }
        let n = inputs.len();
        let timeline: Vec<NaiveDate> = coverage
            .into_iter()
            .filter(|(_, count)| 2 * count >= n)
            .map(|(d, _)| d)
            .collect();

        let mut symbols = Vec::new();
        let mut columns = Vec::new();
        for (symbol, bars) in inputs {
            let total = bars.len();
            let kept: Vec<OhlcvBar> = bars
                .into_iter()
                .filter(|b| timeline.binary_search(&b.date).is_ok())
                .collect();
            if kept.len() != timeline.len() {
                warn!(
                    symbol = %symbol,
                    bars = kept.len(),
                    dates = timeline.len(),
                    "dropping symbol with gaps against the common date axis"
                );
                continue;
            }
            if kept.len() < total {
                warn!(
                    symbol = %symbol,
                    trimmed = total - kept.len(),
                    "trimming bars outside the common date axis"
                );
            }
            symbols.push(symbol);
            columns.push(kept);
        }

        let dates = if symbols.is_empty() { Vec::new() } else { timeline };
        Self {
            dates,
            symbols,
            bars: columns,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    pub fn bars(&self, symbol: &str) -> Option<&[OhlcvBar]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.bars[i].as_slice())
    }

    /// Keep only observations dated on or before `last`.
    pub fn truncate_to(&self, last: NaiveDate) -> PriceTable {
        let keep = self.dates.partition_point(|d| *d <= last);
        PriceTable {
            dates: self.dates[..keep].to_vec(),
            symbols: self.symbols.clone(),
            bars: self.bars.iter().map(|b| b[..keep].to_vec()).collect(),
        }
    }
}

/// Ordered-by-date table of rebased prices, one column per instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
    date_index: HashMap<NaiveDate, usize>,
}

impl NormalizedSeries {
    /// Build from already-normalized columns.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, LeadLagError> {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LeadLagError::PriceData {
                reason: "dates must be strictly increasing".into(),
            });
        }
        let mut tickers = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (ticker, column) in columns {
            if column.len() != dates.len() {
                return Err(LeadLagError::PriceData {
                    reason: format!(
                        "{ticker}: {} values for {} dates",
                        column.len(),
                        dates.len()
                    ),
                });
            }
            if tickers.contains(&ticker) {
                return Err(LeadLagError::PriceData {
                    reason: format!("duplicate column {ticker}"),
                });
            }
            tickers.push(ticker);
            values.push(column);
        }
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        Ok(Self {
            dates,
            tickers,
            columns: values,
            date_index,
        })
    }

    /// Rebase `field` of every symbol so its first observation equals 100.
    ///
    /// A symbol whose first price is not strictly positive cannot be rebased
    /// and is dropped.
    pub fn from_prices(table: &PriceTable, field: PriceField) -> Self {
        let mut columns = Vec::with_capacity(table.symbols.len());
        for (symbol, bars) in table.symbols.iter().zip(&table.bars) {
            let raw: Vec<f64> = bars.iter().map(|b| b.price(field)).collect();
            match raw.first() {
                Some(&base) if base > 0.0 && base.is_finite() => {
                    let rebased = raw.iter().map(|p| p / base * REBASE_LEVEL).collect();
                    columns.push((symbol.clone(), rebased));
                }
                _ => warn!(symbol = %symbol, "cannot rebase symbol with non-positive first price"),
            }
        }
        let date_index = table
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();
        let (tickers, columns): (Vec<String>, Vec<Vec<f64>>) = columns.into_iter().unzip();
        Self {
            dates: table.dates.clone(),
            tickers,
            columns,
            date_index,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Sub-table for a group, keeping the group's ticker order and silently
    /// dropping tickers absent from the series.
    pub fn select<'a>(&'a self, tickers: &'a [String]) -> GroupSeries<'a> {
        let mut selected_tickers = Vec::new();
        let mut selected_columns = Vec::new();
        for ticker in tickers {
            if selected_tickers.contains(&ticker.as_str()) {
                continue;
            }
            if let Some(column) = self.column(ticker) {
                selected_tickers.push(ticker.as_str());
                selected_columns.push(column);
            }
        }
        GroupSeries {
            dates: &self.dates,
            tickers: selected_tickers,
            columns: selected_columns,
        }
    }
}

/// Borrowed view of the columns belonging to one group.
#[derive(Debug, Clone)]
pub struct GroupSeries<'a> {
    pub dates: &'a [NaiveDate],
    pub tickers: Vec<&'a str>,
    pub columns: Vec<&'a [f64]>,
}

impl GroupSeries<'_> {
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty() || self.dates.is_empty()
    }

    /// Simple returns per ticker; entry `t` is the change from `t` to `t + 1`.
    /// Undefined or infinite changes are `None`.
    pub fn simple_returns(&self) -> Vec<Vec<Option<f64>>> {
        self.columns
            .iter()
            .map(|col| {
                col.windows(2)
                    .map(|w| {
                        let r = w[1] / w[0] - 1.0;
                        r.is_finite().then_some(r)
                    })
                    .collect()
            })
            .collect()
    }
}
