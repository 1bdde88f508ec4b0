#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use leadlag::domain::config_validation::{EngineSettings, RunSettings, SelectionSettings};
use leadlag::domain::error::LeadLagError;
pub use leadlag::domain::ohlcv::OhlcvBar;
use leadlag::domain::ohlcv::PriceField;
use leadlag::domain::portfolio::{PortfolioResult, MAX_CONCURRENT_TRADES};
use leadlag::domain::scoring::RuleScore;
use leadlag::domain::sector::{SectorMetrics, StrictModeThresholds};
use leadlag::domain::stability::RuleStability;
use leadlag::domain::trade::Trade;
use leadlag::domain::universe::Universe;
use leadlag::ports::price_port::PricePort;
use leadlag::ports::research_port::{ResearchPort, TradeTable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::PathBuf;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, LeadLagError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(LeadLagError::PriceData {
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| LeadLagError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, LeadLagError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Records which tables a pipeline run handed over, in order.
#[derive(Default)]
pub struct RecordingResearchPort {
    pub writes: RefCell<Vec<String>>,
    pub initial_trades: RefCell<Vec<Trade>>,
    pub scored_trades: RefCell<Vec<Trade>>,
    pub scores: RefCell<Vec<RuleScore>>,
    pub stability: RefCell<Vec<RuleStability>>,
    pub sectors: RefCell<Vec<SectorMetrics>>,
    pub portfolio: RefCell<Option<PortfolioResult>>,
}

impl ResearchPort for RecordingResearchPort {
    fn write_trades(&self, table: TradeTable, trades: &[Trade]) -> Result<(), LeadLagError> {
        let (name, slot) = match table {
            TradeTable::Initial => ("trades_initial", &self.initial_trades),
            TradeTable::WithRuleId => ("trades_with_rule_id", &self.scored_trades),
        };
        self.writes.borrow_mut().push(name.to_string());
        *slot.borrow_mut() = trades.to_vec();
        Ok(())
    }

    fn write_rule_scores(&self, scores: &[RuleScore]) -> Result<(), LeadLagError> {
        self.writes.borrow_mut().push("rule_scores".into());
        *self.scores.borrow_mut() = scores.to_vec();
        Ok(())
    }

    fn write_rule_stability(&self, rows: &[RuleStability]) -> Result<(), LeadLagError> {
        self.writes.borrow_mut().push("rule_stability".into());
        *self.stability.borrow_mut() = rows.to_vec();
        Ok(())
    }

    fn write_sector_investability(&self, rows: &[SectorMetrics]) -> Result<(), LeadLagError> {
        self.writes.borrow_mut().push("sector_investability".into());
        *self.sectors.borrow_mut() = rows.to_vec();
        Ok(())
    }

    fn write_portfolio(&self, result: &PortfolioResult) -> Result<(), LeadLagError> {
        self.writes.borrow_mut().push("portfolio".into());
        *self.portfolio.borrow_mut() = Some(result.clone());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The first `count` weekdays on or after `start`.
pub fn weekdays(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

/// Bars whose HL2 equals `closes[i]`.
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    weekdays(start, closes.len())
        .into_iter()
        .zip(closes)
        .map(|(date, &close)| OhlcvBar {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000.0,
        })
        .collect()
}

pub const CYCLE_DAYS: f64 = 20.0;

/// A sine wave around 100 with the given amplitude, shifted `delay` days.
pub fn cycle_closes(count: usize, amplitude: f64, delay: f64) -> Vec<f64> {
    (0..count)
        .map(|i| 100.0 * (1.0 + amplitude * (2.0 * PI * (i as f64 - delay) / CYCLE_DAYS).sin()))
        .collect()
}

pub const START: (i32, u32, u32) = (2024, 1, 1);

pub fn start_date() -> NaiveDate {
    date(START.0, START.1, START.2)
}

/// Three leaders in phase and one lagger a quarter cycle behind: whenever
/// the leaders have just moved hard, the lagger sits at a turning point.
pub fn cycle_group(tickers: [&str; 4], count: usize) -> Vec<(String, Vec<OhlcvBar>)> {
    let amplitudes = [0.05, 0.055, 0.06];
    let mut out: Vec<(String, Vec<OhlcvBar>)> = tickers[..3]
        .iter()
        .zip(amplitudes)
        .map(|(t, a)| (t.to_string(), bars_from_closes(t, start_date(), &cycle_closes(count, a, 0.0))))
        .collect();
    let lagger = tickers[3];
    out.push((
        lagger.to_string(),
        bars_from_closes(lagger, start_date(), &cycle_closes(count, 0.05, CYCLE_DAYS / 4.0)),
    ));
    out
}

pub fn cycle_price_port(count: usize) -> MockPricePort {
    let mut port = MockPricePort::new();
    for (symbol, bars) in cycle_group(["AAA", "BBB", "CCC", "DDD"], count)
        .into_iter()
        .chain(cycle_group(["EEE", "FFF", "GGG", "HHH"], count))
    {
        port = port.with_bars(&symbol, bars);
    }
    port
}

pub fn cycle_universe() -> Universe {
    Universe::new(vec![
        (
            "CHEMICALS".to_string(),
            vec!["AAA".into(), "BBB".into(), "CCC".into(), "DDD".into()],
        ),
        (
            "METALS".to_string(),
            vec!["EEE".into(), "FFF".into(), "GGG".into(), "HHH".into()],
        ),
    ])
    .unwrap()
}

pub fn run_settings(universe: Universe, parallel: bool) -> RunSettings {
    RunSettings {
        engine: EngineSettings {
            price_field: PriceField::Hl2,
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("research"),
            analysis_date: None,
            parallel,
        },
        universe,
        strict_mode: StrictModeThresholds::default(),
        selection: SelectionSettings::default(),
        max_concurrent_trades: MAX_CONCURRENT_TRADES,
    }
}

/// Write the bars as `SYMBOL.csv` files into `dir`.
pub fn write_price_csvs(dir: &std::path::Path, port: &MockPricePort) {
    for (symbol, bars) in &port.data {
        let mut content = String::from("date,open,high,low,close,volume\n");
        for b in bars {
            content.push_str(&format!(
                "{},{},{},{},{},{}\n",
                b.date, b.open, b.high, b.low, b.close, b.volume
            ));
        }
        std::fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
    }
}
