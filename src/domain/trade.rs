//! Trade generation from signals.
//!
//! Each signal is expanded across a fixed entry-lag by holding-period grid.
//! Trades whose exit lies beyond the price history stay open with no
//! return. Rule metadata is attached afterwards by key lookup.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use super::rule::{DetectionParams, ParameterSet, RuleId, RuleKey};
use super::scoring::RuleScore;
use super::series::NormalizedSeries;
use super::signal::{Direction, Signal};

/// Entry lags explored for every detected signal.
pub const TRADE_ENTRY_LAGS: [usize; 4] = [0, 1, 2, 3];
/// Holding periods explored for every detected signal.
pub const TRADE_HOLD_DAYS: [usize; 4] = [3, 5, 7, 10];

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub group: String,
    pub ticker: String,
    pub direction: Direction,
    pub signal_date: NaiveDate,
    pub entry_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,
    /// Detection fields come from the signal, timing from the trade grid.
    pub params: ParameterSet,
    pub ret: Option<f64>,
    pub leaders: Vec<String>,
    pub is_open: bool,
    pub rule_id: Option<RuleId>,
    pub rule_quality_score: Option<f64>,
}

impl Trade {
    pub fn rule_key(&self) -> RuleKey {
        RuleKey::new(self.group.clone(), self.params)
    }

    pub fn is_closed(&self) -> bool {
        self.exit_date.is_some() && self.ret.is_some()
    }

    /// `(exit_date, ret)` for a closed trade.
    pub fn closed(&self) -> Option<(NaiveDate, f64)> {
        Some((self.exit_date?, self.ret?))
    }
}

/// Entry-lag/hold combinations keyed by the detection tuples present in a
/// signal set.
#[derive(Debug, Clone, Default)]
pub struct TradeGrid {
    combos: BTreeMap<DetectionParams, Vec<(usize, usize)>>,
}

impl TradeGrid {
    pub fn from_signals(signals: &[Signal]) -> Self {
        let mut combos = BTreeMap::new();
        for signal in signals {
            combos
                .entry(signal.params.detection())
                .or_insert_with(|| {
                    TRADE_ENTRY_LAGS
                        .iter()
                        .flat_map(|&lag| TRADE_HOLD_DAYS.iter().map(move |&hold| (lag, hold)))
                        .collect()
                });
        }
        Self { combos }
    }

    pub fn len(&self) -> usize {
        self.combos.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    pub fn combos_for(&self, params: &DetectionParams) -> &[(usize, usize)] {
        self.combos.get(params).map_or(&[], Vec::as_slice)
    }
}

/// Expand signals into trades; attach rule metadata when scores are given.
pub fn backtest_signals(
    series: &NormalizedSeries,
    signals: &[Signal],
    scored_rules: Option<&[RuleScore]>,
) -> Vec<Trade> {
    let trades = generate_trades(series, signals);
    match scored_rules {
        Some(scores) if !scores.is_empty() => attach_rule_scores(trades, scores),
        _ => trades,
    }
}

pub fn generate_trades(series: &NormalizedSeries, signals: &[Signal]) -> Vec<Trade> {
    if signals.is_empty() {
        return Vec::new();
    }
    let grid = TradeGrid::from_signals(signals);
    let mut trades = Vec::new();

    for signal in signals {
        let Some(prices) = series.column(&signal.ticker) else {
            continue;
        };
        let Some(signal_idx) = series.index_of(signal.signal_date) else {
            continue;
        };
        let detection = signal.params.detection();

        for &(entry_lag, hold_days) in grid.combos_for(&detection) {
            let entry_idx = signal_idx + entry_lag;
            if entry_idx >= prices.len() {
                continue;
            }
            let exit_idx = entry_idx + hold_days;
            let (exit_date, ret) = if exit_idx < prices.len() {
                let gross = prices[exit_idx] / prices[entry_idx] - 1.0;
                (
                    Some(series.dates()[exit_idx]),
                    Some(gross * f64::from(signal.direction.sign())),
                )
            } else {
                (None, None)
            };

            trades.push(Trade {
                group: signal.group.clone(),
                ticker: signal.ticker.clone(),
                direction: signal.direction,
                signal_date: signal.signal_date,
                entry_date: series.dates()[entry_idx],
                exit_date,
                params: detection.with_timing(entry_lag, hold_days),
                ret,
                leaders: signal.leaders.clone(),
                is_open: exit_date.is_none(),
                rule_id: None,
                rule_quality_score: None,
            });
        }
    }

    info!(
        signals = signals.len(),
        trades = trades.len(),
        open = trades.iter().filter(|t| t.is_open).count(),
        "generated trades"
    );
    trades
}

/// Left-join scored rules onto trades by rule key. Trades whose rule has no
/// score keep empty metadata.
pub fn attach_rule_scores(trades: Vec<Trade>, scores: &[RuleScore]) -> Vec<Trade> {
    let lookup: HashMap<&RuleKey, (&RuleId, f64)> = scores
        .iter()
        .map(|s| (&s.key, (&s.rule_id, s.rule_quality_score)))
        .collect();

    trades
        .into_iter()
        .map(|mut trade| {
            let (rule_id, quality) = match lookup.get(&trade.rule_key()) {
                Some((id, q)) => (Some((*id).clone()), Some(*q)),
                None => (None, None),
            };
            trade.rule_id = rule_id;
            trade.rule_quality_score = quality;
            trade
        })
        .collect()
}
