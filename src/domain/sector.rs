//! Sector investability: synthetic daily sector returns rebuilt from
//! overlapping closed trades, risk metrics over them, and a strict gate
//! that requires every threshold to pass.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use super::attribution::{exit_day_returns, holding_calendar, Holding};
use super::metrics::{
    compound, downside_std, max_drawdown, mean, ratio_or_zero, sample_std, win_rate,
};
use super::trade::Trade;

/// Floors for the six sector criteria. A sector is investable only when it
/// meets all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrictModeThresholds {
    pub min_mean: f64,
    pub min_win_rate: f64,
    pub min_sharpe: f64,
    pub min_sortino: f64,
    pub min_stability: f64,
    /// Drawdowns are negative; this is the deepest one tolerated.
    pub min_max_dd: f64,
}

impl Default for StrictModeThresholds {
    fn default() -> Self {
        Self {
            min_mean: 0.0,
            min_win_rate: 0.5,
            min_sharpe: 0.0,
            min_sortino: 0.0,
            min_stability: 0.0,
            min_max_dd: -0.2,
        }
    }
}

/// Daily return per sector over a shared business-day calendar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorDailyReturns {
    pub days: Vec<NaiveDate>,
    /// Sectors in order of first appearance among the closed trades.
    pub sectors: Vec<(String, Vec<f64>)>,
}

impl SectorDailyReturns {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() || self.sectors.is_empty()
    }

    pub fn get(&self, group: &str) -> Option<&[f64]> {
        self.sectors
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, r)| r.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorMetrics {
    pub group: String,
    pub mean: f64,
    pub win_rate: f64,
    /// Sample deviation of daily returns; 0 with fewer than two days.
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_dd: f64,
    pub stability: f64,
    pub is_investable: bool,
    /// One entry per failed criterion, empty when investable.
    pub rejection_reasons: Vec<String>,
}

/// Rebuild per-sector daily returns from closed trades.
pub fn compute_sector_daily_returns(trades: &[Trade]) -> SectorDailyReturns {
    let mut by_sector: Vec<(String, Vec<Holding>)> = Vec::new();
    for trade in trades {
        let Some((exit, ret)) = trade.closed() else {
            continue;
        };
        let holding = Holding {
            entry: trade.entry_date,
            exit,
            ret,
        };
        match by_sector.iter_mut().find(|(g, _)| *g == trade.group) {
            Some((_, holdings)) => holdings.push(holding),
            None => by_sector.push((trade.group.clone(), vec![holding])),
        }
    }

    let all: Vec<Holding> = by_sector.iter().flat_map(|(_, h)| h.iter().copied()).collect();
    let days = holding_calendar(&all);
    if days.is_empty() {
        return SectorDailyReturns::default();
    }

    let sectors = by_sector
        .into_iter()
        .map(|(group, holdings)| {
            let daily = exit_day_returns(&holdings, &days);
            (group, daily)
        })
        .collect();
    SectorDailyReturns { days, sectors }
}

/// Mean over `(start, end]`, or 0 when no day falls inside.
fn average_between(days: &[NaiveDate], returns: &[f64], start: NaiveDate, end: NaiveDate) -> f64 {
    let window: Vec<f64> = days
        .iter()
        .zip(returns)
        .filter(|(d, _)| **d > start && **d <= end)
        .map(|(_, r)| *r)
        .collect();
    mean(&window).unwrap_or(0.0)
}

/// Recency-weighted mean of the last 30 days, the 30 before those and the
/// 90 before that, anchored at the last day of the series.
pub fn stability_score(days: &[NaiveDate], returns: &[f64]) -> f64 {
    let Some(&last) = days.last() else {
        return 0.0;
    };
    let last_30 = last - Duration::days(30);
    let prev_30 = last - Duration::days(60);
    let prev_90 = last - Duration::days(150);

    0.5 * average_between(days, returns, last_30, last)
        + 0.3 * average_between(days, returns, prev_30, last_30)
        + 0.2 * average_between(days, returns, prev_90, prev_30)
}

/// Metrics for one sector's daily series; `None` for an empty series.
pub fn sector_metrics(group: &str, days: &[NaiveDate], returns: &[f64]) -> Option<SectorMetrics> {
    let mean_ret = mean(returns)?;
    let vol = sample_std(returns);
    let equity = compound(returns);

    Some(SectorMetrics {
        group: group.to_string(),
        mean: mean_ret,
        win_rate: win_rate(returns),
        volatility: vol.unwrap_or(0.0),
        sharpe: ratio_or_zero(mean_ret, vol),
        sortino: ratio_or_zero(mean_ret, downside_std(returns)),
        max_dd: max_drawdown(&equity),
        stability: stability_score(days, returns),
        is_investable: false,
        rejection_reasons: Vec::new(),
    })
}

/// Apply every threshold; returns the failed criteria as readable lines.
pub fn evaluate_sector(metrics: &SectorMetrics, t: &StrictModeThresholds) -> Vec<String> {
    let mut reasons = Vec::new();
    if metrics.mean < t.min_mean {
        reasons.push(format!(
            "Sector mean return {:.4}% is below {:.4}%.",
            metrics.mean * 100.0,
            t.min_mean * 100.0
        ));
    }
    if metrics.win_rate < t.min_win_rate {
        reasons.push(format!(
            "Sector win rate {:.2}% is below {:.2}%.",
            metrics.win_rate * 100.0,
            t.min_win_rate * 100.0
        ));
    }
    if metrics.sharpe < t.min_sharpe {
        reasons.push(format!("Sector Sharpe {:.4} is too weak.", metrics.sharpe));
    }
    if metrics.sortino < t.min_sortino {
        reasons.push(format!("Sector Sortino {:.4} is too weak.", metrics.sortino));
    }
    if metrics.stability < t.min_stability {
        reasons.push(format!(
            "Sector stability score {:.4} is too weak.",
            metrics.stability
        ));
    }
    if metrics.max_dd < t.min_max_dd {
        reasons.push(format!(
            "Sector max drawdown {:.2}% is too deep.",
            metrics.max_dd * 100.0
        ));
    }
    reasons
}

/// Gate a set of sector metrics in place.
pub fn apply_thresholds(metrics: &mut [SectorMetrics], thresholds: &StrictModeThresholds) {
    for m in metrics.iter_mut() {
        m.rejection_reasons = evaluate_sector(m, thresholds);
        m.is_investable = m.rejection_reasons.is_empty();
    }
}

/// Metrics and investability for every sector with closed trades.
pub fn compute_investable_sectors(
    trades: &[Trade],
    thresholds: &StrictModeThresholds,
) -> Vec<SectorMetrics> {
    let daily = compute_sector_daily_returns(trades);
    if daily.is_empty() {
        return Vec::new();
    }

    let mut metrics: Vec<SectorMetrics> = daily
        .sectors
        .iter()
        .filter_map(|(group, returns)| sector_metrics(group, &daily.days, returns))
        .collect();
    apply_thresholds(&mut metrics, thresholds);

    for m in metrics.iter().filter(|m| !m.is_investable) {
        debug!(group = %m.group, reasons = ?m.rejection_reasons, "sector rejected");
    }
    info!(
        sectors = metrics.len(),
        investable = metrics.iter().filter(|m| m.is_investable).count(),
        days = daily.days.len(),
        "evaluated sector investability"
    );
    metrics
}
