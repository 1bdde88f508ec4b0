//! Trade-level summaries for console reporting.

use std::collections::BTreeMap;

use super::metrics::{compound, max_drawdown, mean, median, ratio_or_zero, sample_std, win_rate};
use super::rule::RuleKey;
use super::trade::Trade;

/// System summary over closed trades. Returns are summed, not compounded,
/// since trades overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSummary {
    pub n_trades: usize,
    pub win_rate: f64,
    pub avg_ret: f64,
    pub median_ret: f64,
    /// Gross wins over gross losses; absent without a losing trade.
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    pub total_ret: f64,
}

impl TradeSummary {
    pub fn from_trades(trades: &[Trade]) -> Option<Self> {
        let rets: Vec<f64> = trades.iter().filter_map(|t| t.ret).collect();
        let avg_ret = mean(&rets)?;
        let gains: f64 = rets.iter().filter(|r| **r > 0.0).sum();
        let losses: f64 = rets.iter().filter(|r| **r < 0.0).sum();
        let has_loss = rets.iter().any(|r| *r < 0.0);

        Some(TradeSummary {
            n_trades: rets.len(),
            win_rate: win_rate(&rets),
            avg_ret,
            median_ret: median(&rets).unwrap_or(0.0),
            profit_factor: has_loss.then(|| gains / losses.abs()),
            expectancy: avg_ret,
            total_ret: rets.iter().sum(),
        })
    }
}

/// Per-sector performance of every closed trade, rule-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorPerformance {
    pub group: String,
    pub count: usize,
    /// Mean trade return in percent.
    pub mean_pct: f64,
    pub win_rate: f64,
    /// Drawdown of the returns compounded in entry-date order.
    pub max_drawdown: f64,
    /// Trade-level mean over deviation; absent when the deviation is 0 or
    /// undefined.
    pub sharpe: Option<f64>,
}

/// Sector leaderboard sorted by mean return, best first.
pub fn summarize_sector_performance(trades: &[Trade]) -> Vec<SectorPerformance> {
    let mut by_group: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for trade in trades.iter().filter(|t| t.ret.is_some()) {
        by_group.entry(trade.group.as_str()).or_default().push(trade);
    }

    let mut rows: Vec<SectorPerformance> = by_group
        .into_iter()
        .filter_map(|(group, mut group_trades)| {
            group_trades.sort_by_key(|t| t.entry_date);
            let rets: Vec<f64> = group_trades.iter().filter_map(|t| t.ret).collect();
            let avg = mean(&rets)?;
            let sigma = sample_std(&rets).filter(|s| *s > 0.0);
            Some(SectorPerformance {
                group: group.to_string(),
                count: rets.len(),
                mean_pct: avg * 100.0,
                win_rate: win_rate(&rets),
                max_drawdown: max_drawdown(&compound(&rets)),
                sharpe: sigma.map(|s| ratio_or_zero(avg, Some(s))),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.mean_pct.total_cmp(&a.mean_pct));
    rows
}

/// Plain-language description of a rule.
pub fn rule_narrative(key: &RuleKey) -> String {
    let p = &key.params;
    format!(
        "If at least {:.0}% of tickers in {} show a strong move over a {}-day lookback, \
         while the lagging ticker moves less than {:.2}%, then enter after {} day(s) \
         and hold for {} day(s).",
        p.participation * 100.0,
        key.group,
        p.lookback,
        p.lagger_max_move * 100.0,
        p.entry_lag,
        p.hold_days
    )
}
