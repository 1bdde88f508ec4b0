//! Return statistics shared by the rule, sector and portfolio stages.
//!
//! Standard deviations are sample deviations (n - 1). Any statistic over
//! too few observations is `None`, and ratios over a missing or zero
//! denominator fall back to 0 so no NaN/inf reaches a reported metric.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fraction of observations strictly above zero.
pub fn win_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| v > 0.0).count() as f64 / values.len() as f64
}

/// Sample deviation of the strictly negative observations.
pub fn downside_std(values: &[f64]) -> Option<f64> {
    let negatives: Vec<f64> = values.iter().copied().filter(|&v| v < 0.0).collect();
    sample_std(&negatives)
}

/// `numerator / denominator`, or 0 when the denominator is missing or not
/// strictly positive.
pub fn ratio_or_zero(numerator: f64, denominator: Option<f64>) -> f64 {
    match denominator {
        Some(d) if d > 0.0 => numerator / d,
        _ => 0.0,
    }
}

/// Running product of `1 + r`, starting from 1.0 before the first return.
pub fn compound(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

/// Deepest relative decline from a running peak; 0 or negative.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday-to-Friday dates in `[start, end]`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        if is_business_day(day) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

/// Portfolio-level summary of a daily return series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub n_trades: usize,
    pub avg_concurrent_trades: f64,
}

impl PortfolioMetrics {
    /// Annualised metrics from daily returns and the equity they compound to.
    /// Returns `None` for an empty curve.
    pub fn compute(
        daily_returns: &[f64],
        equity: &[f64],
        n_trades: usize,
        avg_concurrent_trades: f64,
    ) -> Option<Self> {
        let &last = equity.last()?;
        let total_return = last - 1.0;
        let ann_factor = TRADING_DAYS_PER_YEAR / equity.len() as f64;
        let cagr = (1.0 + total_return).powf(ann_factor) - 1.0;
        let cagr = if cagr.is_finite() { cagr } else { 0.0 };

        let annualize = TRADING_DAYS_PER_YEAR.sqrt();
        let volatility = sample_std(daily_returns).map_or(0.0, |s| s * annualize);
        let downside = downside_std(daily_returns).map(|s| s * annualize);

        Some(Self {
            total_return,
            max_drawdown: max_drawdown(equity),
            cagr,
            volatility,
            sharpe: ratio_or_zero(cagr, Some(volatility)),
            sortino: ratio_or_zero(cagr, downside),
            n_trades,
            avg_concurrent_trades,
        })
    }
}
